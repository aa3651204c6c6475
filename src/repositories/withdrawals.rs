use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::withdrawals::WithdrawalRequest;
use crate::storage::Storage;

const WITHDRAWAL_KEY_PREFIX: &str = "adneon-withdrawal-";

fn history_key(user_id: &str) -> String {
    format!("{}{}", WITHDRAWAL_KEY_PREFIX, user_id)
}

/// One document per user holding the full withdrawal history as a JSON array.
#[derive(Clone)]
pub struct WithdrawalRepository {
    store: Arc<dyn Storage>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl WithdrawalRepository {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        WithdrawalRepository {
            store,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub async fn lock_history(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.lock_owned().await
    }

    pub async fn load(&self, user_id: &str) -> Result<Vec<WithdrawalRequest>, anyhow::Error> {
        let raw = self.store.get(&history_key(user_id)).await?;

        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn save(
        &self,
        user_id: &str,
        history: &[WithdrawalRequest],
    ) -> Result<(), anyhow::Error> {
        let raw = serde_json::to_string(history)?;
        self.store.put(&history_key(user_id), &raw).await
    }

    pub async fn delete(&self, user_id: &str) -> Result<(), anyhow::Error> {
        self.store.delete(&history_key(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::withdrawals::WithdrawalStatus;
    use crate::storage::memory::MemoryStorage;

    #[tokio::test]
    async fn missing_history_loads_empty() {
        let repository = WithdrawalRepository::new(Arc::new(MemoryStorage::new()));

        assert!(repository.load("no-such-user").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_round_trips_through_storage() {
        let repository = WithdrawalRepository::new(Arc::new(MemoryStorage::new()));
        let request = WithdrawalRequest {
            id: Uuid::new_v4().hyphenated().to_string(),
            user_id: "user-1".to_string(),
            amount_in_cents: 500000,
            status: WithdrawalStatus::Pending,
            requested_at: Utc::now(),
            processed_at: None,
        };

        repository.save("user-1", &[request.clone()]).await.unwrap();

        let loaded = repository.load("user-1").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, request.id);
        assert_eq!(loaded[0].amount_in_cents, request.amount_in_cents);
        assert_eq!(loaded[0].status, request.status);
        assert_eq!(loaded[0].requested_at, request.requested_at);
        assert_eq!(loaded[0].processed_at, None);
    }

    #[tokio::test]
    async fn deleted_history_loads_empty() {
        let repository = WithdrawalRepository::new(Arc::new(MemoryStorage::new()));
        let request = WithdrawalRequest {
            id: Uuid::new_v4().hyphenated().to_string(),
            user_id: "user-1".to_string(),
            amount_in_cents: 500000,
            status: WithdrawalStatus::Pending,
            requested_at: Utc::now(),
            processed_at: None,
        };
        repository.save("user-1", &[request]).await.unwrap();

        repository.delete("user-1").await.unwrap();

        assert!(repository.load("user-1").await.unwrap().is_empty());
    }
}
