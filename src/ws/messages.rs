//! WebSocket message types: envelope, commands, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    #[serde(default)]
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a server-originated message.
    #[must_use]
    pub fn new(id: String, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error reply.
    #[must_use]
    pub fn error(id: String, code: u16, message: &str) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message }),
        )
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send over WebSocket, carried in the
/// envelope payload.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Subscribe to updates for claims and submissions. Use `["*"]` in
    /// `claim_ids` for every update.
    Subscribe {
        /// Claim ids to follow.
        #[serde(default)]
        claim_ids: Vec<String>,
        /// Submission correlation ids to follow.
        #[serde(default)]
        correlation_ids: Vec<String>,
    },
    /// Stop following claims and submissions. `["*"]` in `claim_ids` drops
    /// the wildcard subscription.
    Unsubscribe {
        /// Claim ids to drop.
        #[serde(default)]
        claim_ids: Vec<String>,
        /// Correlation ids to drop.
        #[serde(default)]
        correlation_ids: Vec<String>,
    },
    /// Latest known event for a claim.
    GetClaim {
        /// Claim id.
        claim_id: String,
    },
    /// Current read-model snapshot.
    GetSnapshot,
    /// State of a tracked submission.
    GetSubmission {
        /// Correlation id.
        correlation_id: String,
    },
}
