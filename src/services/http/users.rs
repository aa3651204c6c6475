use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

use super::{error_response, AppState};
use crate::models::offers::CompleteOffer;
use crate::models::users::{LoginRequest, User, UserPatch};
use crate::services::ledger::LedgerRequest;
use crate::services::ServiceError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddBalanceBody {
    amount_in_cents: i64,
}

#[derive(Deserialize)]
pub(crate) struct ReferralBody {
    code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddCoinsBody {
    amount: i64,
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GiftCardBody {
    card_name: String,
    coin_cost: i64,
}

async fn send_and_respond(
    state: &AppState,
    request: LedgerRequest,
    receiver: oneshot::Receiver<Result<User, ServiceError>>,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Err(e) = state.ledger_channel.send(request).await {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": format!("Failed to process request: {}", e) })),
        );
    }

    match receiver.await {
        Ok(Ok(user)) => (StatusCode::OK, Json(json!(user))),
        Ok(Err(service_error)) => error_response(&service_error),
        Err(e) => error_response(&ServiceError::Internal(format!(
            "Failed to receive response: {}",
            e
        ))),
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let (ledger_tx, ledger_rx) = oneshot::channel();

    send_and_respond(
        &state,
        LedgerRequest::Login {
            email: req.email,
            name: req.name,
            response: ledger_tx,
        },
        ledger_rx,
    )
    .await
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let (ledger_tx, ledger_rx) = oneshot::channel();

    send_and_respond(
        &state,
        LedgerRequest::GetUser {
            user_id,
            response: ledger_tx,
        },
        ledger_rx,
    )
    .await
}

pub async fn logout(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let (ledger_tx, ledger_rx) = oneshot::channel();

    let send_result = state
        .ledger_channel
        .send(LedgerRequest::Logout {
            user_id,
            response: ledger_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": format!("Failed to process request: {}", e) })),
        );
    }

    match ledger_rx.await {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({ "success": true }))),
        Ok(Err(service_error)) => error_response(&service_error),
        Err(e) => error_response(&ServiceError::Internal(format!(
            "Failed to receive response: {}",
            e
        ))),
    }
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(patch): Json<UserPatch>,
) -> impl IntoResponse {
    let (ledger_tx, ledger_rx) = oneshot::channel();

    send_and_respond(
        &state,
        LedgerRequest::UpdateUser {
            user_id,
            patch,
            response: ledger_tx,
        },
        ledger_rx,
    )
    .await
}

pub async fn add_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<AddBalanceBody>,
) -> impl IntoResponse {
    let (ledger_tx, ledger_rx) = oneshot::channel();

    send_and_respond(
        &state,
        LedgerRequest::AddBalance {
            user_id,
            amount_in_cents: body.amount_in_cents,
            response: ledger_tx,
        },
        ledger_rx,
    )
    .await
}

pub async fn apply_referral(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<ReferralBody>,
) -> impl IntoResponse {
    let (ledger_tx, ledger_rx) = oneshot::channel();

    send_and_respond(
        &state,
        LedgerRequest::ApplyReferral {
            user_id,
            code: body.code,
            response: ledger_tx,
        },
        ledger_rx,
    )
    .await
}

pub async fn claim_referral_tier(
    State(state): State<AppState>,
    Path((user_id, tier_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let (ledger_tx, ledger_rx) = oneshot::channel();

    send_and_respond(
        &state,
        LedgerRequest::ClaimReferralTier {
            user_id,
            tier_id,
            response: ledger_tx,
        },
        ledger_rx,
    )
    .await
}

pub async fn add_coins(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<AddCoinsBody>,
) -> impl IntoResponse {
    let (ledger_tx, ledger_rx) = oneshot::channel();

    send_and_respond(
        &state,
        LedgerRequest::AddCoins {
            user_id,
            amount: body.amount,
            description: body.description,
            response: ledger_tx,
        },
        ledger_rx,
    )
    .await
}

pub async fn redeem_gift_card(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<GiftCardBody>,
) -> impl IntoResponse {
    let (ledger_tx, ledger_rx) = oneshot::channel();

    send_and_respond(
        &state,
        LedgerRequest::RedeemGiftCard {
            user_id,
            card_name: body.card_name,
            coin_cost: body.coin_cost,
            response: ledger_tx,
        },
        ledger_rx,
    )
    .await
}

pub async fn complete_special_offer(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<CompleteOffer>,
) -> impl IntoResponse {
    let (ledger_tx, ledger_rx) = oneshot::channel();

    send_and_respond(
        &state,
        LedgerRequest::CompleteSpecialOffer {
            user_id,
            offer_id: body.offer_id,
            coins_earned: body.coins_earned,
            response: ledger_tx,
        },
        ledger_rx,
    )
    .await
}

pub async fn record_bonus_ad_watch(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let (ledger_tx, ledger_rx) = oneshot::channel();

    send_and_respond(
        &state,
        LedgerRequest::RecordSpecialBonusAdWatch {
            user_id,
            response: ledger_tx,
        },
        ledger_rx,
    )
    .await
}
