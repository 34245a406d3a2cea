//! # claims-gateway
//!
//! REST API and WebSocket gateway for an insurance claims event log kept
//! on an append-only, consensus-ordered ledger channel.
//!
//! Claims are published as tagged JSON messages; the gateway reconstructs
//! recent claims from channel history, keeps a live read model current
//! from the channel subscription, and streams changes to WebSocket
//! clients. Attachments are uploaded to a blob store before the claim is
//! published, so a claim on the log never points at a missing file.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── ClaimService (service/)
//!     │     ├── SubmissionWorkflow ── BlobStore
//!     │     ├── ReadModel ◀── ClaimEventLog::subscribe
//!     │     ├── HistoryReader
//!     │     └── SubmissionTracker
//!     ├── EventBus (domain/)
//!     │
//!     └── Session ── LedgerTransport (ledger/)
//! ```
//!
//! Without a valid ledger session the gateway still starts: the read model
//! shows a placeholder claim and ledger-backed endpoints answer `503`.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod service;
pub mod ws;

#[cfg(test)]
pub(crate) mod fixtures;
