use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::leaderboard::LeaderboardRequest;
use super::ledger::LedgerRequest;
use super::withdrawals::WithdrawalServiceRequest;
use super::ServiceError;

mod users;
mod withdrawals;

#[derive(Clone)]
struct AppState {
    ledger_channel: mpsc::Sender<LedgerRequest>,
    withdrawal_channel: mpsc::Sender<WithdrawalServiceRequest>,
    leaderboard_channel: mpsc::Sender<LeaderboardRequest>,
}

fn error_response(error: &ServiceError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match error {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(json!({ "success": false, "error": error.to_string() })))
}

async fn get_leaderboard(State(state): State<AppState>) -> impl IntoResponse {
    let (leaderboard_tx, leaderboard_rx) = oneshot::channel();

    let send_result = state
        .leaderboard_channel
        .send(LeaderboardRequest::GetLeaderboard {
            response: leaderboard_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": format!("Failed to process request: {}", e) })),
        );
    }

    match leaderboard_rx.await {
        Ok(Ok(leaderboard)) => (
            StatusCode::OK,
            Json(json!({ "success": true, "leaderboard": leaderboard })),
        ),
        Ok(Err(service_error)) => error_response(&service_error),
        Err(e) => error_response(&ServiceError::Internal(format!(
            "Failed to receive response: {}",
            e
        ))),
    }
}

// Legacy endpoint shape: the body is validated field by field so malformed
// input gets the `{success, error}` envelope rather than an extractor reject.
async fn update_coins(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let user_id = match body.get("userId").and_then(|value| value.as_str()) {
        Some(user_id) if !user_id.is_empty() => user_id.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": "Missing or invalid userId field." })),
            )
        }
    };
    let coins = match body.get("coins").and_then(|value| value.as_i64()) {
        Some(coins) => coins,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": "Missing or invalid coins field." })),
            )
        }
    };
    let expected_version = body.get("expectedVersion").and_then(|value| value.as_u64());

    let (ledger_tx, ledger_rx) = oneshot::channel();
    let send_result = state
        .ledger_channel
        .send(LedgerRequest::UpdateCoins {
            user_id,
            coins,
            expected_version,
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
        Ok(Ok(user)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Coins updated to {}.", user.coins)
            })),
        ),
        Ok(Err(service_error)) => error_response(&service_error),
        Err(e) => error_response(&ServiceError::Internal(format!(
            "Failed to receive response: {}",
            e
        ))),
    }
}

fn router(
    ledger_channel: mpsc::Sender<LedgerRequest>,
    withdrawal_channel: mpsc::Sender<WithdrawalServiceRequest>,
    leaderboard_channel: mpsc::Sender<LeaderboardRequest>,
) -> Router {
    let app_state = AppState {
        ledger_channel,
        withdrawal_channel,
        leaderboard_channel,
    };

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/leaderboard", get(get_leaderboard))
        .route("/updateCoins", post(update_coins))
        .route("/users/login", post(users::login))
        .route("/users/{user_id}", get(users::get_user).put(users::update_user))
        .route("/users/{user_id}/logout", post(users::logout))
        .route("/users/{user_id}/balance", post(users::add_balance))
        .route("/users/{user_id}/referral", post(users::apply_referral))
        .route(
            "/users/{user_id}/referral-tiers/{tier_id}/claim",
            post(users::claim_referral_tier),
        )
        .route("/users/{user_id}/coins", post(users::add_coins))
        .route("/users/{user_id}/gift-cards", post(users::redeem_gift_card))
        .route("/users/{user_id}/offers", post(users::complete_special_offer))
        .route(
            "/users/{user_id}/offers/bonus-ad",
            post(users::record_bonus_ad_watch),
        )
        .route(
            "/users/{user_id}/withdrawals",
            post(withdrawals::request_withdrawal).get(withdrawals::list_withdrawals),
        )
        .route(
            "/users/{user_id}/withdrawals/{withdrawal_id}",
            post(withdrawals::process_withdrawal),
        )
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    listen: &str,
    ledger_channel: mpsc::Sender<LedgerRequest>,
    withdrawal_channel: mpsc::Sender<WithdrawalServiceRequest>,
    leaderboard_channel: mpsc::Sender<LeaderboardRequest>,
) -> Result<(), anyhow::Error> {
    let app = router(ledger_channel, withdrawal_channel, leaderboard_channel);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    println!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
