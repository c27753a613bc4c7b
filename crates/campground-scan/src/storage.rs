use std::collections::BTreeMap;

use tokio::sync::RwLock;

use crate::scan_types::ScanError;

/// Key-value store holding one serialized recreation area per key
#[async_trait::async_trait]
pub trait RecAreaStore: Send + Sync {
    /// Every key currently in the store
    async fn list_keys(&self) -> Result<Vec<String>, ScanError>;

    /// Raw JSON stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, ScanError>;

    /// Replace whatever is stored under `key`
    async fn set(&self, key: &str, value: String) -> Result<(), ScanError>;
}

/// Store kept in process memory, for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create a store preloaded with `entries`
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

#[async_trait::async_trait]
impl RecAreaStore for MemoryStore {
    async fn list_keys(&self) -> Result<Vec<String>, ScanError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ScanError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), ScanError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}
