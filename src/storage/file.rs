use std::path::{Path, PathBuf};

use anyhow::bail;
use async_trait::async_trait;

use super::Storage;

/// File-backed adapter for the storage port: one JSON document per key under
/// the configured data directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(data_dir: &str) -> Result<Self, anyhow::Error> {
        std::fs::create_dir_all(data_dir)?;

        Ok(FileStorage {
            dir: Path::new(data_dir).to_path_buf(),
        })
    }

    // Keys become file names, so the charset is restricted.
    fn is_valid_key(key: &str) -> bool {
        !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        if !Self::is_valid_key(key) {
            return Ok(None);
        }

        match tokio::fs::read_to_string(self.entry_path(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        if !Self::is_valid_key(key) {
            bail!("Invalid storage key: {}", key);
        }

        tokio::fs::write(self.entry_path(key), value).await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), anyhow::Error> {
        if !Self::is_valid_key(key) {
            return Ok(());
        }

        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, anyhow::Error> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();

            if let Some(key) = name.strip_suffix(".json") {
                if key.starts_with(prefix) {
                    keys.push(key.to_string());
                }
            }
        }

        Ok(keys)
    }
}
