use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::repositories::users::UserRepository;
use crate::repositories::withdrawals::WithdrawalRepository;
use crate::settings::Settings;
use crate::storage::Storage;

mod http;
mod leaderboard;
mod ledger;
mod withdrawals;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub fn spawn_services(
    store: Arc<dyn Storage>,
    settings: &Settings,
) -> (
    mpsc::Sender<ledger::LedgerRequest>,
    mpsc::Sender<withdrawals::WithdrawalServiceRequest>,
    mpsc::Sender<leaderboard::LeaderboardRequest>,
) {
    let (ledger_tx, mut ledger_rx) = mpsc::channel(512);
    let (withdrawal_tx, mut withdrawal_rx) = mpsc::channel(512);
    let (leaderboard_tx, mut leaderboard_rx) = mpsc::channel(512);

    let user_repository = UserRepository::new(store.clone());
    let withdrawal_repository = WithdrawalRepository::new(store);

    let mut ledger_service = ledger::LedgerService::new();
    let mut withdrawal_service = withdrawals::WithdrawalService::new();
    let mut leaderboard_service = leaderboard::LeaderboardService::new();

    println!("[*] Starting ledger service.");
    let ledger_user_repository = user_repository.clone();
    let ledger_withdrawal_tx = withdrawal_tx.clone();
    let ledger_rewards = settings.rewards.clone();
    tokio::spawn(async move {
        ledger_service
            .run(
                ledger::LedgerRequestHandler::new(
                    ledger_user_repository,
                    ledger_withdrawal_tx,
                    ledger_rewards,
                ),
                &mut ledger_rx,
            )
            .await;
    });

    println!("[*] Starting withdrawal service.");
    let withdrawal_ledger_tx = ledger_tx.clone();
    let min_withdrawal_in_cents = settings.rewards.min_withdrawal_in_cents;
    tokio::spawn(async move {
        withdrawal_service
            .run(
                withdrawals::WithdrawalRequestHandler::new(
                    withdrawal_repository,
                    withdrawal_ledger_tx,
                    min_withdrawal_in_cents,
                ),
                &mut withdrawal_rx,
            )
            .await;
    });

    log::info!("Starting leaderboard service.");
    let leaderboard_user_repository = user_repository.clone();
    let leaderboard_limit = settings.rewards.leaderboard_limit;
    tokio::spawn(async move {
        leaderboard_service
            .run(
                leaderboard::LeaderboardRequestHandler::new(
                    leaderboard_user_repository,
                    leaderboard_limit,
                ),
                &mut leaderboard_rx,
            )
            .await;
    });

    (ledger_tx, withdrawal_tx, leaderboard_tx)
}

pub async fn start_services(
    store: Arc<dyn Storage>,
    settings: Settings,
) -> Result<(), anyhow::Error> {
    let (ledger_tx, withdrawal_tx, leaderboard_tx) = spawn_services(store, &settings);

    println!("[*] Starting HTTP server.");
    http::start_http_server(&settings.server.listen, ledger_tx, withdrawal_tx, leaderboard_tx)
        .await?;

    Ok(())
}
