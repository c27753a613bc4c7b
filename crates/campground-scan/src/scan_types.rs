use std::time::Duration;

/// Custom error type for availability scan operations
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The fetch session could not be started within its retry budget
    #[error("Failed to start fetch session for facility {facility_id} after {attempts} tries")]
    SessionStartFailed {
        /// Legacy facility id the session was requested for
        facility_id: u64,
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// A page could not be fetched
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        /// URL that was being fetched
        url: String,
        /// Underlying transport error
        message: String,
    },

    /// The reservation site answered with a non-success status
    #[error("HTTP {status} while fetching {url}")]
    HttpStatus {
        /// URL that was being fetched
        url: String,
        /// Status code returned by the site
        status: u16,
    },

    /// Key-value store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored record is missing its identifier or is not valid JSON
    #[error("Malformed record {key}: {message}")]
    MalformedRecord {
        /// Storage key of the record
        key: String,
        /// What was wrong with it
        message: String,
    },

    /// Data format error
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for ScanError {
    fn from(e: serde_json::Error) -> Self {
        ScanError::DataFormat(e.to_string())
    }
}

/// Fixed-delay retry budget for acquiring a fetch session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Pause between two consecutive attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            delay: Duration::from_secs(5),
        }
    }
}

/// How far a failing facility reaches within its recreation area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureIsolation {
    /// The first failing facility abandons the whole recreation area; nothing is written
    #[default]
    RecArea,

    /// A failing facility is left unenriched; its siblings continue and the area is written
    Facility,
}

impl std::str::FromStr for FailureIsolation {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rec_area" | "recarea" => Ok(FailureIsolation::RecArea),
            "facility" => Ok(FailureIsolation::Facility),
            other => Err(ScanError::ConfigError(format!(
                "Unknown failure isolation mode: {}",
                other
            ))),
        }
    }
}
