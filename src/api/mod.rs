//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Claim and ledger endpoints are mounted under `/api`; `/health`, `/ws`
//! and the attachment files under `/blobs` sit at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::ws::handler::ws_handler;

/// Slack on top of the attachment caps for form fields and multipart framing.
const FORM_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "claims-gateway",
        description = "REST API and WebSocket gateway for a ledger-backed insurance claims event log"
    ),
    paths(
        handlers::system::health_handler,
        handlers::claims::submit_claim,
        handlers::claims::list_claims,
        handlers::claims::refresh_claims,
        handlers::claims::claim_history,
        handlers::claims::get_claim,
        handlers::claims::get_submission,
        handlers::ledger::client_info,
        handlers::ledger::account_balance,
        handlers::ledger::network_status,
    ),
    tags(
        (name = "System", description = "Service health"),
        (name = "Claims", description = "Claim submission and the claims read model"),
        (name = "Ledger", description = "Operator account and network connectivity"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the full application: REST, WebSocket, attachment files,
/// OpenAPI docs and the HTTP middleware stack.
pub fn build_app(state: AppState, config: &GatewayConfig) -> Router {
    // Three attachment slots plus the text fields.
    let body_limit = config
        .max_attachment_bytes
        .saturating_mul(3)
        .saturating_add(FORM_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let router = build_router()
        .route("/ws", get(ws_handler))
        .nest_service("/blobs", ServeDir::new(&config.blob_root));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );
    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    );

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config.frontend_url.as_deref()))
        .with_state(state)
}

/// CORS restricted to the frontend origin when one is configured and
/// parses, permissive otherwise.
fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    match frontend_url.map(|url| url.trim_end_matches('/').parse::<HeaderValue>()) {
        Some(Ok(origin)) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Some(Err(_)) => {
            tracing::warn!(?frontend_url, "invalid FRONTEND_URL, falling back to permissive CORS");
            CorsLayer::permissive()
        }
        None => CorsLayer::permissive(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_claim_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/claims",
            "/api/claims/refresh",
            "/api/claims/history",
            "/api/claims/{claim_id}",
            "/api/submissions/{correlation_id}",
            "/api/hedera/client",
            "/api/account/balance",
            "/api/network-status",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
