//! In-memory [`MetadataStore`] double used by tests, grounded on the
//! `RwLock<HashMap<..>>` pattern of the memory-backed persistence adapters
//! this crate's orchestration style descends from.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::metadata::MetadataStore;

#[derive(Default)]
pub struct MemoryMetadataStore {
    inner: RwLock<HashMap<(String, String), String>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn set(&self, target: &str, key: &str, value: &str) -> anyhow::Result<()> {
        self.inner
            .write()
            .await
            .insert((target.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    async fn get(&self, target: &str, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .inner
            .read()
            .await
            .get(&(target.to_string(), key.to_string()))
            .cloned())
    }
}
