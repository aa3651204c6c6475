use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;

use crate::settings;

pub mod file;
pub mod memory;

/// Key-value persistence port. Values are serialized JSON documents; the
/// repositories own the key layout and the document schemas.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error>;
    async fn put(&self, key: &str, value: &str) -> Result<(), anyhow::Error>;
    async fn delete(&self, key: &str) -> Result<(), anyhow::Error>;
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, anyhow::Error>;
}

pub fn open(settings: &settings::Storage) -> Result<Arc<dyn Storage>, anyhow::Error> {
    match settings.backend.as_str() {
        "memory" => Ok(Arc::new(memory::MemoryStorage::new())),
        "file" => Ok(Arc::new(file::FileStorage::open(&settings.data_dir)?)),
        other => bail!("Unknown storage backend: {}", other),
    }
}
