//! Ledger account and connectivity DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::ledger::{AccountId, KeyType, Network};

/// Response body for `GET /api/hedera/client`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfoResponse {
    /// Network the session is bound to.
    pub network: Network,
    /// Operator account.
    #[schema(value_type = String, example = "0.0.1001")]
    pub account_id: AccountId,
    /// Operator key scheme.
    pub key_type: KeyType,
}

/// Body returned by `GET /api/hedera/client` when no session exists.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClientErrorResponse {
    /// Why the session could not be created.
    pub error: String,
}

/// Response body for `GET /api/account/balance`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceResponse {
    /// Balance formatted in hbar (e.g. `"10000 ℏ"`).
    pub balance: String,
    /// Operator account.
    #[schema(value_type = String, example = "0.0.1001")]
    pub account_id: AccountId,
}

/// Response body for `GET /api/network-status`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatusResponse {
    /// `connected` or `disconnected`.
    pub status: String,
    /// Round-trip time to the node in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_node_latency: Option<u64>,
    /// Why the node could not be reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` without a ledger session.
    pub status: String,
    /// RFC 3339 server time.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// `available` or `unavailable`.
    pub ledger: String,
}
