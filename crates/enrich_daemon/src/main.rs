//! Entry point of the reservation enrichment daemon.
//! Runs one pass that attaches campsite availability to every recreation area in Redis.

use std::sync::Arc;

use anyhow::Context;
use campground_scan::{Enricher, HttpSessionFactory};
use redis_store::RedisStore;

mod settings;
use settings::{Settings, enrichment_window};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("🚀 Starting reservation enrichment pass...");

    let settings = Settings::from_env().context("Failed to read settings")?;

    let store = RedisStore::from_env()
        .await
        .context("Failed to open Redis store")?;
    log::info!("🗃️ Redis store connected");

    if let Err(e) = store.test_connection().await {
        log::error!("❌ Redis connection test failed: {}", e);
    }

    let site = settings.session.site();
    let sessions = HttpSessionFactory::new(Some(settings.session))
        .context("Failed to create session factory")?;

    let (start, finish) = enrichment_window(chrono::Local::now().date_naive());
    log::info!(
        "📅 Enriching availability from {} to {} with {} workers",
        start,
        finish,
        settings.enrichment.pool_size
    );

    let enricher = Enricher::new(
        Arc::new(store),
        Arc::new(sessions),
        site,
        Some(settings.enrichment),
    );

    let summary = enricher
        .run(start, finish)
        .await
        .context("Enrichment pass aborted")?;

    log::info!(
        "✅ Enrichment pass complete: {}",
        serde_json::to_string(&summary)?
    );

    Ok(())
}
