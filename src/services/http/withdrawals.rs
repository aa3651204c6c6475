use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tokio::sync::oneshot;

use super::{error_response, AppState};
use crate::models::withdrawals::{NewWithdrawal, ProcessWithdrawal};
use crate::services::withdrawals::WithdrawalServiceRequest;
use crate::services::ServiceError;

pub async fn request_withdrawal(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<NewWithdrawal>,
) -> impl IntoResponse {
    let (withdrawal_tx, withdrawal_rx) = oneshot::channel();

    let send_result = state
        .withdrawal_channel
        .send(WithdrawalServiceRequest::RequestWithdrawal {
            user_id,
            amount_in_cents: body.amount_in_cents,
            response: withdrawal_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": format!("Failed to process request: {}", e) })),
        );
    }

    match withdrawal_rx.await {
        Ok(Ok(request)) => (StatusCode::CREATED, Json(json!(request))),
        Ok(Err(service_error)) => error_response(&service_error),
        Err(e) => error_response(&ServiceError::Internal(format!(
            "Failed to receive response: {}",
            e
        ))),
    }
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let (withdrawal_tx, withdrawal_rx) = oneshot::channel();

    let send_result = state
        .withdrawal_channel
        .send(WithdrawalServiceRequest::ListWithdrawals {
            user_id,
            response: withdrawal_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": format!("Failed to process request: {}", e) })),
        );
    }

    match withdrawal_rx.await {
        Ok(Ok(history)) => (StatusCode::OK, Json(json!(history))),
        Ok(Err(service_error)) => error_response(&service_error),
        Err(e) => error_response(&ServiceError::Internal(format!(
            "Failed to receive response: {}",
            e
        ))),
    }
}

pub async fn process_withdrawal(
    State(state): State<AppState>,
    Path((user_id, withdrawal_id)): Path<(String, String)>,
    Json(body): Json<ProcessWithdrawal>,
) -> impl IntoResponse {
    let (withdrawal_tx, withdrawal_rx) = oneshot::channel();

    let send_result = state
        .withdrawal_channel
        .send(WithdrawalServiceRequest::ProcessWithdrawal {
            user_id,
            withdrawal_id,
            decision: body.decision,
            response: withdrawal_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": format!("Failed to process request: {}", e) })),
        );
    }

    match withdrawal_rx.await {
        Ok(Ok(request)) => (StatusCode::OK, Json(json!(request))),
        Ok(Err(service_error)) => error_response(&service_error),
        Err(e) => error_response(&ServiceError::Internal(format!(
            "Failed to receive response: {}",
            e
        ))),
    }
}
