use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use campground_scan::{EnrichmentConfig, FailureIsolation, SessionConfig};
use chrono::{Datelike, NaiveDate};

/// Everything the daemon reads from its environment, apart from `REDIS_URL`
#[derive(Debug, Clone)]
pub struct Settings {
    /// Browsing session settings
    pub session: SessionConfig,
    /// Enrichment pass settings
    pub enrichment: EnrichmentConfig,
}

impl Settings {
    /// Build settings from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from `lookup`, falling back to defaults for unset variables
    pub fn from_lookup<L>(lookup: L) -> anyhow::Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut session = SessionConfig::default();
        let mut enrichment = EnrichmentConfig::default();

        if let Some(root) = lookup("RESERVATION_SITE_ROOT") {
            session.base_url = root;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "FETCH_TIMEOUT_SECS")? {
            session.timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_var::<u32, _>(&lookup, "SESSION_START_ATTEMPTS")? {
            if attempts == 0 {
                return Err(anyhow!("SESSION_START_ATTEMPTS must be at least 1"));
            }
            session.retry.max_attempts = attempts;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "SESSION_START_DELAY_SECS")? {
            session.retry.delay = Duration::from_secs(secs);
        }

        if let Some(size) = parse_var::<usize, _>(&lookup, "ENRICH_POOL_SIZE")? {
            if size == 0 {
                return Err(anyhow!("ENRICH_POOL_SIZE must be at least 1"));
            }
            enrichment.pool_size = size;
        }
        if let Some(isolation) = lookup("ENRICH_ISOLATION") {
            enrichment.isolation = isolation
                .parse::<FailureIsolation>()
                .context("Invalid ENRICH_ISOLATION")?;
        }
        if let Some(dir) = lookup("ENRICH_NOTES_DIR") {
            enrichment.notes_dir = Some(PathBuf::from(dir));
        }

        Ok(Self {
            session,
            enrichment,
        })
    }
}

fn parse_var<T, L>(lookup: &L, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    L: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {}", name, raw))
        })
        .transpose()
}

/// Window of one pass: from `today` up to, not including, December 31 of the same year
pub fn enrichment_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let finish = NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today);
    (today, finish)
}
