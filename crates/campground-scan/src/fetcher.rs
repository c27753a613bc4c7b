use tokio::time::sleep;
use tracing::{debug, error};

use crate::scan_types::{RetryPolicy, ScanError};

/// A live browsing session able to return the rendered HTML of a page
#[async_trait::async_trait]
pub trait PageFetcher: Send {
    /// Load `url` and return its HTML
    async fn fetch(&mut self, url: &str) -> Result<String, ScanError>;

    /// Forget cookies and any other per-session state
    async fn clear_session_state(&mut self) -> Result<(), ScanError>;

    /// Shut the session down
    async fn release(&mut self) -> Result<(), ScanError>;
}

/// Starts browsing sessions. A single attempt may fail; callers retry through
/// [`acquire_with_retry`].
#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    /// Session type handed out by this factory
    type Session: PageFetcher;

    /// Try once to start a new session
    async fn acquire(&self) -> Result<Self::Session, ScanError>;

    /// Retry budget for [`acquire_with_retry`]
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }
}

/// Start a session for `facility_id`, retrying with a fixed delay until the
/// policy's attempt budget runs out.
pub async fn acquire_with_retry<F: SessionFactory + ?Sized>(
    factory: &F,
    policy: &RetryPolicy,
    facility_id: u64,
) -> Result<F::Session, ScanError> {
    for attempt in 0..policy.max_attempts {
        match factory.acquire().await {
            Ok(session) => return Ok(session),
            Err(e) => {
                debug!(
                    "Could not start fetch session: facility {}, try {}: {}",
                    facility_id, attempt, e
                );
                if attempt + 1 < policy.max_attempts {
                    sleep(policy.delay).await;
                }
            }
        }
    }

    error!(
        "Failed to start fetch session for {} after {} tries",
        facility_id, policy.max_attempts
    );
    Err(ScanError::SessionStartFailed {
        facility_id,
        attempts: policy.max_attempts,
    })
}
