use campground_scan::{RecAreaStore, ScanError};
use redis::aio::MultiplexedConnection;
use tracing::{debug, info};

/// Environment variable holding the Redis connection string
pub const REDIS_URL_VAR: &str = "REDIS_URL";

/// Recreation area records stored as JSON strings keyed by area id
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

fn storage_error(context: &str, e: redis::RedisError) -> ScanError {
    ScanError::Storage(format!("{}: {}", context, e))
}

impl RedisStore {
    /// Connects to the Redis server at `url`.
    pub async fn connect(url: &str) -> Result<Self, ScanError> {
        let client =
            redis::Client::open(url).map_err(|e| storage_error("Invalid Redis URL", e))?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| storage_error("Failed to connect to Redis", e))?;

        Ok(Self { conn })
    }

    /// Connects using the `REDIS_URL` environment variable.
    pub async fn from_env() -> Result<Self, ScanError> {
        let url = std::env::var(REDIS_URL_VAR)
            .map_err(|_| ScanError::ConfigError(format!("{} is not set", REDIS_URL_VAR)))?;

        Self::connect(&url).await
    }

    /// Tests the connection with a PING.
    pub async fn test_connection(&self) -> Result<(), ScanError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| storage_error("PING failed", e))?;

        info!("Redis connection successful: {}", pong);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecAreaStore for RedisStore {
    async fn list_keys(&self) -> Result<Vec<String>, ScanError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg("*")
            .query_async(&mut conn)
            .await
            .map_err(|e| storage_error("Failed to list keys", e))?;

        debug!("Found {} keys in Redis", keys.len());
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ScanError> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| storage_error(&format!("Failed to get {}", key), e))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), ScanError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| storage_error(&format!("Failed to set {}", key), e))?;

        Ok(())
    }
}
