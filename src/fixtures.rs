//! Shared builders for unit tests.

#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::domain::ClaimPayload;
use crate::ledger::{AccountId, LedgerSettings, LocalLedger, Session, TopicId};

pub(crate) const OPERATOR: AccountId = AccountId::new(1001);
pub(crate) const TOPIC: TopicId = TopicId::new(5005);

pub(crate) fn payload(amount: f64) -> ClaimPayload {
    let Some(incident_date) = NaiveDate::from_ymd_opt(2026, 10, 1) else {
        panic!("valid date");
    };
    ClaimPayload {
        full_name: "Jane Doe".to_string(),
        policy_number: "POL-1".to_string(),
        incident_date,
        description: "Rear-ended at a light".to_string(),
        amount,
        attachments: Vec::new(),
    }
}

pub(crate) fn settings() -> LedgerSettings {
    LedgerSettings {
        network: Some("local".to_string()),
        operator_id: Some(OPERATOR.to_string()),
        operator_key: Some(
            "0101010101010101010101010101010101010101010101010101010101010101".to_string(),
        ),
        operator_key_type: None,
        max_fee_hbar: Some("2".to_string()),
        topic_id: Some(TOPIC.to_string()),
        timeout: Duration::from_secs(5),
    }
}

/// A funded ledger with the claims topic and a session bound to it.
pub(crate) fn ledger_and_session() -> (Arc<LocalLedger>, Session) {
    let ledger = Arc::new(LocalLedger::for_settings(&settings()));
    let transport: Arc<dyn crate::ledger::LedgerTransport> = Arc::<LocalLedger>::clone(&ledger);
    let Ok(session) = Session::create(&settings(), transport) else {
        panic!("valid session settings");
    };
    (ledger, session)
}
