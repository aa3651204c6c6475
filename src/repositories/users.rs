use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::users::User;
use crate::storage::Storage;

const USER_KEY_PREFIX: &str = "adneon-user-";

fn user_key(user_id: &str) -> String {
    format!("{}{}", USER_KEY_PREFIX, user_id)
}

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn Storage>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        UserRepository {
            store,
            locks: Arc::new(DashMap::new()),
        }
    }

    // Serializes read-modify-write cycles on one user document. Callers hold
    // the guard for the whole load/mutate/save sequence.
    pub async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.lock_owned().await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, anyhow::Error> {
        let raw = self.store.get(&user_key(user_id)).await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn save_user(&self, user: &mut User) -> Result<(), anyhow::Error> {
        user.version += 1;
        user.updated_at = Utc::now();

        let raw = serde_json::to_string(user)?;
        self.store.put(&user_key(&user.id), &raw).await
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<(), anyhow::Error> {
        self.store.delete(&user_key(user_id)).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, anyhow::Error> {
        let keys = self.store.list_keys(USER_KEY_PREFIX).await?;
        let fetched = join_all(keys.iter().map(|key| self.store.get(key))).await;

        let mut users = Vec::new();
        for raw in fetched {
            if let Some(raw) = raw? {
                users.push(serde_json::from_str(&raw)?);
            }
        }

        Ok(users)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        let users = self.list_users().await?;

        Ok(users.into_iter().find(|user| user.email == email))
    }

    pub async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, anyhow::Error> {
        let users = self.list_users().await?;

        Ok(users.into_iter().find(|user| user.referral_code == code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    fn test_repository() -> UserRepository {
        UserRepository::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn saves_and_loads_users() {
        let repository = test_repository();
        let mut user = User::new("ana@example.com", "Ana", "ADN-1a2b3c4d");

        repository.save_user(&mut user).await.unwrap();

        let loaded = repository.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(loaded.email, "ana@example.com");
        assert_eq!(loaded.balance_in_cents, 0);
        assert_eq!(loaded.created_at, user.created_at);
    }

    #[tokio::test]
    async fn bumps_version_on_every_save() {
        let repository = test_repository();
        let mut user = User::new("ana@example.com", "Ana", "ADN-1a2b3c4d");

        repository.save_user(&mut user).await.unwrap();
        assert_eq!(user.version, 1);

        user.coins = 10;
        repository.save_user(&mut user).await.unwrap();

        let loaded = repository.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.coins, 10);
    }

    #[tokio::test]
    async fn finds_users_by_email_and_referral_code() {
        let repository = test_repository();
        let mut ana = User::new("ana@example.com", "Ana", "ADN-1a2b3c4d");
        let mut bea = User::new("bea@example.com", "Bea", "ADN-9f8e7d6c");
        repository.save_user(&mut ana).await.unwrap();
        repository.save_user(&mut bea).await.unwrap();

        let by_email = repository
            .find_by_email("bea@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, bea.id);

        let by_code = repository
            .find_by_referral_code("ADN-1a2b3c4d")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_code.id, ana.id);

        assert!(repository
            .find_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn deleted_users_stay_gone() {
        let repository = test_repository();
        let mut user = User::new("ana@example.com", "Ana", "ADN-1a2b3c4d");
        repository.save_user(&mut user).await.unwrap();

        repository.delete_user(&user.id).await.unwrap();

        assert!(repository.get_user(&user.id).await.unwrap().is_none());
        assert!(repository.list_users().await.unwrap().is_empty());
    }
}
