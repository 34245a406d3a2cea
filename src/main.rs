//! claims-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use claims_gateway::api;
use claims_gateway::app_state::AppState;
use claims_gateway::config::{GatewayConfig, LogFormat};
use claims_gateway::domain::EventBus;
use claims_gateway::ledger::{Session, SessionCell};
use claims_gateway::service::{ClaimEventLog, ClaimService, LocalBlobStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting claims-gateway");

    // Build ledger session; failures leave the gateway running degraded
    let session = Session::connect(&config.ledger);
    if let Err(err) = &session {
        tracing::error!(error = %err, "ledger session unavailable; running in degraded mode");
    }
    let sessions = Arc::new(SessionCell::from_result(session));

    let topic = match config.ledger.topic_id() {
        Ok(topic) => {
            let current = sessions.current();
            match ClaimEventLog::new()
                .ensure_topic(current.as_deref(), topic)
                .await
            {
                Ok(topic) => Some(topic),
                Err(err) => {
                    tracing::warn!(topic_id = %topic, error = %err, "could not verify claims topic");
                    Some(topic)
                }
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "claims topic not configured");
            None
        }
    };

    // Build service layer
    let event_bus = EventBus::new(config.event_bus_capacity);
    let blobs = Arc::new(LocalBlobStore::new(
        config.blob_root.clone(),
        &config.blob_public_url,
    ));
    let claim_service = Arc::new(ClaimService::new(
        &config,
        sessions,
        topic,
        blobs,
        event_bus.clone(),
    ));
    claim_service.start().await;

    // Build application state
    let app_state = AppState {
        claim_service: Arc::clone(&claim_service),
        event_bus,
    };

    let app = api::build_app(app_state, &config);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
        })
        .await?;

    claim_service.shutdown();
    tracing::info!("claims-gateway stopped");

    Ok(())
}
