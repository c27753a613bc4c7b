use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, cookie::Jar};
use serde::Serialize;
use tracing::{debug, info};

use crate::fetcher::{PageFetcher, SessionFactory};
use crate::reservation_site::{DEFAULT_SITE_ROOT, ReservationSite};
use crate::scan_types::{RetryPolicy, ScanError};

/// Settings for browsing sessions against the reservation site
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Site root, also visited once to open each session
    pub base_url: String,

    /// Per-request timeout (default: 30 seconds)
    pub timeout: Duration,

    /// User agents to rotate through, one per session
    pub user_agents: Vec<String>,

    /// Retry budget for opening a session (default: 20 tries, 5 seconds apart)
    pub retry: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SITE_ROOT.to_string(),
            timeout: Duration::from_secs(30),
            user_agents: vec![
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
            ],
            retry: RetryPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// URL layout of the configured site
    pub fn site(&self) -> ReservationSite {
        ReservationSite::new(self.base_url.clone())
    }
}

/// Opens cookie-carrying HTTP sessions on the reservation site
pub struct HttpSessionFactory {
    config: SessionConfig,
    sessions_opened: AtomicUsize,
}

impl HttpSessionFactory {
    /// Create a new session factory
    pub fn new(config: Option<SessionConfig>) -> Result<Self, ScanError> {
        let config = config.unwrap_or_default();
        if config.user_agents.is_empty() {
            return Err(ScanError::ConfigError(
                "At least one user agent is required".to_string(),
            ));
        }

        Ok(Self {
            config,
            sessions_opened: AtomicUsize::new(0),
        })
    }

    /// Session settings in use
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

fn build_client(timeout: Duration) -> Result<Client, ScanError> {
    Client::builder()
        .cookie_provider(Arc::new(Jar::default()))
        .timeout(timeout)
        .build()
        .map_err(|e| ScanError::ConfigError(format!("Failed to create session client: {}", e)))
}

#[async_trait::async_trait]
impl SessionFactory for HttpSessionFactory {
    type Session = HttpSession;

    async fn acquire(&self) -> Result<HttpSession, ScanError> {
        let index = self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        let user_agent = self.config.user_agents[index % self.config.user_agents.len()].clone();

        let mut session = HttpSession {
            client: build_client(self.config.timeout)?,
            timeout: self.config.timeout,
            user_agent,
            stats: SessionStats {
                started_at: Utc::now(),
                pages_fetched: 0,
                cookie_resets: 0,
            },
        };

        // Visiting the root first gives the session its cookies.
        session.fetch(&self.config.base_url).await?;
        session.stats.pages_fetched = 0;

        debug!("Opened reservation session with user agent {}", session.user_agent);
        Ok(session)
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.config.retry
    }
}

/// One cookie-carrying HTTP session
pub struct HttpSession {
    client: Client,
    timeout: Duration,
    user_agent: String,
    stats: SessionStats,
}

/// Statistics about a session, logged when it is released
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// When the session was opened
    pub started_at: DateTime<Utc>,
    /// Pages fetched since opening
    pub pages_fetched: u64,
    /// Number of times cookies were dropped
    pub cookie_resets: u32,
}

impl HttpSession {
    /// Current session statistics
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpSession {
    async fn fetch(&mut self, url: &str) -> Result<String, ScanError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.5")
            .send()
            .await
            .map_err(|e| ScanError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| ScanError::Fetch {
            url: url.to_string(),
            message: format!("Failed to read body: {}", e),
        })?;

        self.stats.pages_fetched += 1;
        Ok(body)
    }

    async fn clear_session_state(&mut self) -> Result<(), ScanError> {
        // reqwest's jar cannot be emptied, so start over with a fresh one.
        self.client = build_client(self.timeout)?;
        self.stats.cookie_resets += 1;
        Ok(())
    }

    async fn release(&mut self) -> Result<(), ScanError> {
        info!(
            "Releasing reservation session: {} pages, {} cookie resets, open since {}",
            self.stats.pages_fetched, self.stats.cookie_resets, self.stats.started_at
        );
        Ok(())
    }
}
