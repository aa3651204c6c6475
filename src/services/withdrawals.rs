use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::ledger::LedgerRequest;
use super::{RequestHandler, Service, ServiceError};
use crate::models::withdrawals::{WithdrawalDecision, WithdrawalRequest, WithdrawalStatus};
use crate::repositories::withdrawals::WithdrawalRepository;

pub enum WithdrawalServiceRequest {
    RequestWithdrawal {
        user_id: String,
        amount_in_cents: i64,
        response: oneshot::Sender<Result<WithdrawalRequest, ServiceError>>,
    },
    ListWithdrawals {
        user_id: String,
        response: oneshot::Sender<Result<Vec<WithdrawalRequest>, ServiceError>>,
    },
    ProcessWithdrawal {
        user_id: String,
        withdrawal_id: String,
        decision: WithdrawalDecision,
        response: oneshot::Sender<Result<WithdrawalRequest, ServiceError>>,
    },
    ClearHistory {
        user_id: String,
    },
}

#[derive(Clone)]
pub struct WithdrawalRequestHandler {
    repository: WithdrawalRepository,
    ledger_channel: mpsc::Sender<LedgerRequest>,
    min_withdrawal_in_cents: i64,
}

impl WithdrawalRequestHandler {
    pub fn new(
        repository: WithdrawalRepository,
        ledger_channel: mpsc::Sender<LedgerRequest>,
        min_withdrawal_in_cents: i64,
    ) -> Self {
        WithdrawalRequestHandler {
            repository,
            ledger_channel,
            min_withdrawal_in_cents,
        }
    }

    // The balance is debited up front; the request then sits in the history
    // as pending until it is processed.
    async fn request_withdrawal(
        &self,
        user_id: &str,
        amount_in_cents: i64,
    ) -> Result<WithdrawalRequest, ServiceError> {
        if amount_in_cents < self.min_withdrawal_in_cents {
            return Err(ServiceError::Validation(format!(
                "Minimum withdrawal is {} cents.",
                self.min_withdrawal_in_cents
            )));
        }

        let (ledger_tx, ledger_rx) = oneshot::channel();
        self.ledger_channel
            .send(LedgerRequest::DebitBalance {
                user_id: user_id.to_string(),
                amount_in_cents,
                response: ledger_tx,
            })
            .await
            .map_err(|e| {
                ServiceError::Communication("Withdrawal => Ledger".to_string(), e.to_string())
            })?;
        ledger_rx
            .await
            .map_err(|e| {
                ServiceError::Communication("Ledger => Withdrawal".to_string(), e.to_string())
            })??;

        let _guard = self.repository.lock_history(user_id).await;
        let mut history = self
            .repository
            .load(user_id)
            .await
            .map_err(|e| ServiceError::Repository("Withdrawal".to_string(), e.to_string()))?;

        let request = WithdrawalRequest {
            id: Uuid::new_v4().hyphenated().to_string(),
            user_id: user_id.to_string(),
            amount_in_cents,
            status: WithdrawalStatus::Pending,
            requested_at: Utc::now(),
            processed_at: None,
        };
        history.push(request.clone());

        self.repository
            .save(user_id, &history)
            .await
            .map_err(|e| ServiceError::Repository("Withdrawal".to_string(), e.to_string()))?;

        log::info!(
            "User {} requested withdrawal of {} cents",
            user_id,
            amount_in_cents
        );

        Ok(request)
    }

    async fn list_withdrawals(
        &self,
        user_id: &str,
    ) -> Result<Vec<WithdrawalRequest>, ServiceError> {
        self.repository
            .load(user_id)
            .await
            .map_err(|e| ServiceError::Repository("Withdrawal".to_string(), e.to_string()))
    }

    // Pending is the only state with outgoing transitions. Rejection refunds
    // the amount that was debited when the request was made.
    async fn process_withdrawal(
        &self,
        user_id: &str,
        withdrawal_id: &str,
        decision: WithdrawalDecision,
    ) -> Result<WithdrawalRequest, ServiceError> {
        let guard = self.repository.lock_history(user_id).await;
        let mut history = self
            .repository
            .load(user_id)
            .await
            .map_err(|e| ServiceError::Repository("Withdrawal".to_string(), e.to_string()))?;

        let position = history
            .iter()
            .position(|request| request.id == withdrawal_id)
            .ok_or_else(|| ServiceError::NotFound("Withdrawal not found.".to_string()))?;

        if history[position].status != WithdrawalStatus::Pending {
            return Err(ServiceError::Conflict(
                "Withdrawal already processed.".to_string(),
            ));
        }

        history[position].status = match decision {
            WithdrawalDecision::Approve => WithdrawalStatus::Approved,
            WithdrawalDecision::Reject => WithdrawalStatus::Rejected,
        };
        history[position].processed_at = Some(Utc::now());
        let request = history[position].clone();

        self.repository
            .save(user_id, &history)
            .await
            .map_err(|e| ServiceError::Repository("Withdrawal".to_string(), e.to_string()))?;
        drop(guard);

        if decision == WithdrawalDecision::Reject {
            let (ledger_tx, ledger_rx) = oneshot::channel();
            self.ledger_channel
                .send(LedgerRequest::AddBalance {
                    user_id: user_id.to_string(),
                    amount_in_cents: request.amount_in_cents,
                    response: ledger_tx,
                })
                .await
                .map_err(|e| {
                    ServiceError::Communication("Withdrawal => Ledger".to_string(), e.to_string())
                })?;
            ledger_rx
                .await
                .map_err(|e| {
                    ServiceError::Communication("Ledger => Withdrawal".to_string(), e.to_string())
                })??;

            log::info!(
                "Refunded {} cents to user {} for rejected withdrawal {}",
                request.amount_in_cents,
                user_id,
                request.id
            );
        }

        Ok(request)
    }

    async fn clear_history(&self, user_id: &str) {
        let _guard = self.repository.lock_history(user_id).await;

        if let Err(e) = self.repository.delete(user_id).await {
            log::error!("Could not clear withdrawal history for {}: {}", user_id, e);
        }
    }
}

#[async_trait]
impl RequestHandler<WithdrawalServiceRequest> for WithdrawalRequestHandler {
    async fn handle_request(&self, request: WithdrawalServiceRequest) {
        match request {
            WithdrawalServiceRequest::RequestWithdrawal {
                user_id,
                amount_in_cents,
                response,
            } => {
                let result = self.request_withdrawal(&user_id, amount_in_cents).await;
                let _ = response.send(result);
            }
            WithdrawalServiceRequest::ListWithdrawals { user_id, response } => {
                let result = self.list_withdrawals(&user_id).await;
                let _ = response.send(result);
            }
            WithdrawalServiceRequest::ProcessWithdrawal {
                user_id,
                withdrawal_id,
                decision,
                response,
            } => {
                let result = self
                    .process_withdrawal(&user_id, &withdrawal_id, decision)
                    .await;
                let _ = response.send(result);
            }
            WithdrawalServiceRequest::ClearHistory { user_id } => {
                self.clear_history(&user_id).await;
            }
        }
    }
}

pub struct WithdrawalService;

impl WithdrawalService {
    pub fn new() -> Self {
        WithdrawalService {}
    }
}

#[async_trait]
impl Service<WithdrawalServiceRequest, WithdrawalRequestHandler> for WithdrawalService {}
