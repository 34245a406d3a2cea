//! Ledger account handlers: client info, balance, network status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    BalanceResponse, ClientErrorResponse, ClientInfoResponse, NetworkStatusResponse,
};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /api/hedera/client` — Active session details.
#[utoipa::path(
    get,
    path = "/api/hedera/client",
    tag = "Ledger",
    summary = "Ledger client info",
    description = "Network, operator account and key type of the active session.",
    responses(
        (status = 200, description = "Session details", body = ClientInfoResponse),
        (status = 500, description = "No session", body = ClientErrorResponse),
    )
)]
pub async fn client_info(State(state): State<AppState>) -> Response {
    match state.claim_service.session() {
        Ok(session) => Json(ClientInfoResponse {
            network: session.network(),
            account_id: session.operator_id(),
            key_type: session.key_type(),
        })
        .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ClientErrorResponse {
                error: err.to_string(),
            }),
        )
            .into_response(),
    }
}

/// `GET /api/account/balance` — Operator account balance.
///
/// # Errors
///
/// Returns [`GatewayError`] without a session or when the query fails.
#[utoipa::path(
    get,
    path = "/api/account/balance",
    tag = "Ledger",
    summary = "Operator balance",
    responses(
        (status = 200, description = "Balance", body = BalanceResponse),
        (status = 503, description = "Ledger unavailable", body = ErrorResponse),
    )
)]
pub async fn account_balance(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let (account_id, balance) = state.claim_service.account_balance().await?;
    Ok(Json(BalanceResponse {
        balance: balance.to_string(),
        account_id,
    }))
}

/// `GET /api/network-status` — Ledger reachability.
///
/// Always answers `200`; an unreachable node is reported in the body.
#[utoipa::path(
    get,
    path = "/api/network-status",
    tag = "Ledger",
    summary = "Network status",
    responses(
        (status = 200, description = "Connectivity report", body = NetworkStatusResponse),
    )
)]
pub async fn network_status(State(state): State<AppState>) -> impl IntoResponse {
    let body = match state.claim_service.ping().await {
        Ok(latency) => NetworkStatusResponse {
            status: "connected".to_string(),
            main_node_latency: Some(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)),
            error: None,
        },
        Err(err) => {
            tracing::warn!(error = %err, "ledger ping failed");
            NetworkStatusResponse {
                status: "disconnected".to_string(),
                main_node_latency: None,
                error: Some(err.to_string()),
            }
        }
    };
    Json(body)
}

/// Ledger routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/hedera/client", get(client_info))
        .route("/account/balance", get(account_balance))
        .route("/network-status", get(network_status))
}
