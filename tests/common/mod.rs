//! Shared harness for the integration tests.

#![allow(clippy::panic, dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use claims_gateway::api;
use claims_gateway::app_state::AppState;
use claims_gateway::config::GatewayConfig;
use claims_gateway::domain::EventBus;
use claims_gateway::ledger::{LedgerSettings, LedgerTransport, LocalLedger, Session, SessionCell, TopicId};
use claims_gateway::service::{ClaimInput, ClaimService, MemoryBlobStore};

pub const BOUNDARY: &str = "claims-gateway-test-boundary";

/// A gateway wired to an in-process ledger.
pub struct Harness {
    pub ledger: Arc<LocalLedger>,
    pub service: Arc<ClaimService>,
    pub blobs: Arc<MemoryBlobStore>,
    pub app: Router,
}

pub fn ledger_settings() -> LedgerSettings {
    LedgerSettings {
        network: Some("local".to_string()),
        operator_id: Some("0.0.1001".to_string()),
        operator_key: Some(
            "0101010101010101010101010101010101010101010101010101010101010101".to_string(),
        ),
        operator_key_type: None,
        max_fee_hbar: Some("2".to_string()),
        topic_id: Some("0.0.5005".to_string()),
        timeout: Duration::from_secs(5),
    }
}

fn config(max_attachment_bytes: u64) -> GatewayConfig {
    GatewayConfig {
        max_attachment_bytes,
        submission_timeout: Duration::from_secs(5),
        ledger: ledger_settings(),
        ..GatewayConfig::default()
    }
}

async fn build(
    config: &GatewayConfig,
    sessions: SessionCell,
    topic: Option<TopicId>,
    ledger: Arc<LocalLedger>,
) -> Harness {
    let blobs = Arc::new(MemoryBlobStore::new());
    let event_bus = EventBus::new(config.event_bus_capacity);
    let service = Arc::new(ClaimService::new(
        config,
        Arc::new(sessions),
        topic,
        Arc::clone(&blobs) as _,
        event_bus.clone(),
    ));
    service.start().await;
    let app = api::build_app(
        AppState {
            claim_service: Arc::clone(&service),
            event_bus,
        },
        config,
    );
    Harness {
        ledger,
        service,
        blobs,
        app,
    }
}

/// A gateway with a funded operator and an existing claims topic.
pub async fn harness_with_limit(max_attachment_bytes: u64) -> Harness {
    let config = config(max_attachment_bytes);
    let ledger = Arc::new(LocalLedger::for_settings(&config.ledger));
    let transport: Arc<dyn LedgerTransport> = Arc::clone(&ledger) as _;
    let Ok(session) = Session::create(&config.ledger, transport) else {
        panic!("valid ledger settings");
    };
    let Ok(topic) = config.ledger.topic_id() else {
        panic!("valid topic id");
    };
    build(&config, SessionCell::new(session), Some(topic), ledger).await
}

pub async fn harness() -> Harness {
    harness_with_limit(1024 * 1024).await
}

/// A gateway started without an operator key.
pub async fn degraded_harness() -> Harness {
    let config = config(1024 * 1024);
    let ledger = Arc::new(LocalLedger::new());
    build(
        &config,
        SessionCell::unavailable("HEDERA_OPERATOR_KEY is not set"),
        None,
        ledger,
    )
    .await
}

pub fn claim_input(claim_id: &str) -> ClaimInput {
    ClaimInput {
        claim_id: Some(claim_id.to_string()),
        full_name: "Jane Doe".to_string(),
        policy_number: "POL-1".to_string(),
        incident_date: "2026-10-01".to_string(),
        description: "Rear-ended at a light".to_string(),
        amount: "500".to_string(),
    }
}

/// Encodes a `multipart/form-data` body with [`BOUNDARY`].
pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn claim_fields(claim_id: &'static str) -> Vec<(&'static str, &'static str)> {
    vec![
        ("claimId", claim_id),
        ("fullName", "Jane Doe"),
        ("policyNumber", "POL-1"),
        ("incidentDate", "2026-10-01"),
        ("description", "Rear-ended at a light"),
        ("amount", "500"),
    ]
}
