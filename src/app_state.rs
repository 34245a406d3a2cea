//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::ClaimService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Claim service for all business logic.
    pub claim_service: Arc<ClaimService>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}
