use async_trait::async_trait;
use dashmap::DashMap;

use super::Storage;

/// In-memory adapter for the storage port. Used by tests and available as the
/// `memory` backend for throwaway deployments.
pub struct MemoryStorage {
    entries: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), anyhow::Error> {
        self.entries.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, anyhow::Error> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[tokio::test]
    async fn round_trips_values() {
        let store = MemoryStorage::new();

        store.put("adneon-user-1", "{\"coins\":5}").await.unwrap();
        assert_eq!(
            store.get("adneon-user-1").await.unwrap(),
            Some("{\"coins\":5}".to_string())
        );

        store.delete("adneon-user-1").await.unwrap();
        assert_eq!(store.get("adneon-user-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn lists_keys_by_prefix() {
        let store = MemoryStorage::new();

        store.put("adneon-user-1", "{}").await.unwrap();
        store.put("adneon-user-2", "{}").await.unwrap();
        store.put("adneon-withdrawal-1", "[]").await.unwrap();

        let mut keys = store.list_keys("adneon-user-").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["adneon-user-1", "adneon-user-2"]);
    }
}
