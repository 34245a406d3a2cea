//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams claim updates filtered by claim
//! id or submission correlation id, and answers read-only queries against
//! the claims read model.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
