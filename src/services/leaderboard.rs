use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::leaderboard::LeaderboardEntry;
use crate::repositories::users::UserRepository;

pub enum LeaderboardRequest {
    GetLeaderboard {
        response: oneshot::Sender<Result<Vec<LeaderboardEntry>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct LeaderboardRequestHandler {
    repository: UserRepository,
    limit: usize,
}

impl LeaderboardRequestHandler {
    pub fn new(repository: UserRepository, limit: usize) -> Self {
        LeaderboardRequestHandler { repository, limit }
    }

    async fn get_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        let mut users = self
            .repository
            .list_users()
            .await
            .map_err(|e| ServiceError::Repository("Leaderboard".to_string(), e.to_string()))?;

        users.sort_by(|a, b| b.coins.cmp(&a.coins));

        Ok(users
            .into_iter()
            .take(self.limit)
            .map(|user| LeaderboardEntry {
                id: user.id,
                name: user.name,
                coins: user.coins,
            })
            .collect())
    }
}

#[async_trait]
impl RequestHandler<LeaderboardRequest> for LeaderboardRequestHandler {
    async fn handle_request(&self, request: LeaderboardRequest) {
        match request {
            LeaderboardRequest::GetLeaderboard { response } => {
                let result = self.get_leaderboard().await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct LeaderboardService;

impl LeaderboardService {
    pub fn new() -> Self {
        LeaderboardService {}
    }
}

#[async_trait]
impl Service<LeaderboardRequest, LeaderboardRequestHandler> for LeaderboardService {}
