//! Seam between the claims core and the ledger network.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use super::{AccountId, Hbar, Network, OperatorKey, TopicId, TransactionId};
use crate::error::TransportError;

/// A message as ordered by the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    /// Channel the message was published to.
    pub topic_id: TopicId,
    /// Position in the channel, starting at 1.
    pub sequence: u64,
    /// Time the network ordered the message.
    pub consensus_timestamp: DateTime<Utc>,
    /// Transaction that carried the message.
    pub transaction_id: TransactionId,
    /// Raw message body.
    pub contents: Vec<u8>,
}

/// Channel metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicInfo {
    /// Channel id.
    pub topic_id: TopicId,
    /// Highest sequence number assigned so far; 0 for an empty channel.
    pub sequence_number: u64,
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Transaction id.
    pub transaction_id: TransactionId,
    /// Network status string, `SUCCESS` on acceptance.
    pub status: String,
    /// Sequence assigned to the message.
    pub sequence: u64,
    /// Consensus time of the message.
    pub consensus_timestamp: DateTime<Utc>,
}

/// Operator credentials passed with every paid call.
#[derive(Debug, Clone, Copy)]
pub struct Operator<'a> {
    /// Paying account.
    pub account_id: AccountId,
    /// Signing key.
    pub key: &'a OperatorKey,
}

/// Calls into a consensus ledger.
///
/// Implementations must deliver messages to subscribers in sequence order
/// and assign consensus timestamps that never go backwards.
#[async_trait]
pub trait LedgerTransport: Send + Sync + std::fmt::Debug {
    /// Network this transport is connected to.
    fn network(&self) -> Network;

    /// Appends `contents` to `topic`, paying at most `max_fee`.
    async fn submit_message(
        &self,
        operator: Operator<'_>,
        topic: TopicId,
        contents: Vec<u8>,
        max_fee: Hbar,
    ) -> Result<SubmitReceipt, TransportError>;

    /// Reads channel metadata.
    async fn topic_info(&self, topic: TopicId) -> Result<TopicInfo, TransportError>;

    /// Reads the message at `sequence`.
    async fn message_at(&self, topic: TopicId, sequence: u64)
    -> Result<TopicMessage, TransportError>;

    /// Subscribes to messages published from now on.
    async fn subscribe(
        &self,
        topic: TopicId,
    ) -> Result<broadcast::Receiver<TopicMessage>, TransportError>;

    /// Creates a new channel owned by the operator.
    async fn create_topic(&self, operator: Operator<'_>) -> Result<TopicId, TransportError>;

    /// Queries an account balance.
    async fn account_balance(&self, account: AccountId) -> Result<Hbar, TransportError>;

    /// Round-trip to the nearest node.
    async fn ping(&self) -> Result<Duration, TransportError>;
}
