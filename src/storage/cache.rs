use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::cache::KeyValueStore;

use super::{StorageBackend, WriteOutcome};

/// Baseline copy of the workspace kept under a fixed key. Always available.
pub struct CacheBackend {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl CacheBackend {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

#[async_trait]
impl StorageBackend for CacheBackend {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn write(&self, document: &str) -> Result<WriteOutcome> {
        self.store.set(&self.key, document).await?;
        Ok(WriteOutcome::Written)
    }

    async fn read(&self) -> Result<Option<String>> {
        self.store.get(&self.key).await
    }

    async fn clear(&self) -> Result<()> {
        self.store.remove(&self.key).await
    }
}
