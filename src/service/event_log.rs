//! Claim event log: append-only publish and live subscription.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, oneshot};
use utoipa::ToSchema;

use crate::domain::ClaimDraft;
use crate::error::{PublishError, TransportError};
use crate::ledger::{Session, TopicId, TopicMessage, TransactionId};

/// Largest message body the transport accepts (20 KiB, the chunked ceiling).
pub const MAX_MESSAGE_BYTES: usize = 20 * 1024;

/// Acknowledgement of an accepted publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Transaction id assigned by the network.
    pub transaction_id: TransactionId,
    /// Acceptance status, `SUCCESS` when accepted.
    pub status: String,
    /// Sequence number assigned to the claim.
    pub sequence: u64,
    /// Consensus time of the claim.
    pub consensus_timestamp: DateTime<Utc>,
}

/// Consumer of raw channel messages.
///
/// Invoked once per delivered message, one at a time, in sequence order.
/// Decoding and filtering by type is the handler's job.
#[async_trait]
pub trait MessageHandler: Send + Sync + std::fmt::Debug {
    /// Handles one message.
    async fn on_message(&self, message: TopicMessage);

    /// Called when the subscriber fell behind and `skipped` messages were
    /// dropped. Delivery resumes with newer messages; the handler is
    /// expected to re-read history to cover the gap.
    async fn on_gap(&self, skipped: u64) {
        tracing::warn!(skipped, "subscription gap not handled");
    }
}

/// Handle that stops a subscription.
///
/// Cancelling is idempotent; only the first call has an effect. Clones
/// share the same underlying subscription, and dropping the last clone
/// stops delivery as well.
#[derive(Debug, Clone)]
pub struct Cancel {
    stop: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl Cancel {
    fn new(stop: oneshot::Sender<()>) -> Self {
        Self {
            stop: Arc::new(Mutex::new(Some(stop))),
        }
    }

    /// A handle with nothing to cancel.
    #[must_use]
    pub fn noop() -> Self {
        Self {
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Stops delivery. Returns `true` if this call stopped it.
    pub fn cancel(&self) -> bool {
        let sender = self
            .stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        sender.is_some_and(|tx| {
            let _ = tx.send(());
            true
        })
    }

    /// Returns `true` once nothing remains to cancel.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Publishes claims to, and subscribes to, a claims channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimEventLog;

impl ClaimEventLog {
    /// Creates the event log.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Appends a claim to `topic`.
    ///
    /// No retry is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::NoSession`] without a session,
    /// [`PublishError::PayloadTooLarge`] when the encoded claim exceeds
    /// [`MAX_MESSAGE_BYTES`], and [`PublishError::Transport`] when the network
    /// rejects or times out the publish.
    pub async fn publish(
        &self,
        session: Option<&Session>,
        topic: TopicId,
        draft: &ClaimDraft,
    ) -> Result<Receipt, PublishError> {
        let session = session.ok_or(PublishError::NoSession)?;
        let contents = draft.encode()?;
        if contents.len() > MAX_MESSAGE_BYTES {
            return Err(PublishError::PayloadTooLarge {
                size: contents.len(),
                limit: MAX_MESSAGE_BYTES,
            });
        }

        let receipt = session
            .call(session.transport().submit_message(
                session.operator(),
                topic,
                contents,
                session.max_fee(),
            ))
            .await?;

        tracing::info!(
            claim_id = %draft.claim_id,
            topic_id = %topic,
            sequence = receipt.sequence,
            transaction_id = %receipt.transaction_id,
            "claim published"
        );

        Ok(Receipt {
            transaction_id: receipt.transaction_id,
            status: receipt.status,
            sequence: receipt.sequence,
            consensus_timestamp: receipt.consensus_timestamp,
        })
    }

    /// Delivers every message appended to `topic` from now on to `handler`.
    ///
    /// Without a session, or when the subscription cannot be opened, the
    /// returned handle is a no-op and `handler` is never called.
    pub async fn subscribe(
        &self,
        session: Option<&Session>,
        topic: TopicId,
        handler: Arc<dyn MessageHandler>,
    ) -> Cancel {
        let Some(session) = session else {
            tracing::debug!(topic_id = %topic, "no ledger session; subscription is a no-op");
            return Cancel::noop();
        };
        let mut rx = match session.call(session.transport().subscribe(topic)).await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::error!(topic_id = %topic, error = %e, "could not subscribe to claims topic");
                return Cancel::noop();
            }
        };

        let (stop_tx, mut stop_rx) = oneshot::channel();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    received = rx.recv() => match received {
                        Ok(message) => handler.on_message(message).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(topic_id = %topic, skipped, "subscription lagged; messages dropped");
                            handler.on_gap(skipped).await;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!(topic_id = %topic, "subscription stopped");
        });

        tracing::info!(topic_id = %topic, "subscribed to claims topic");
        Cancel::new(stop_tx)
    }

    /// Returns `topic` if it exists, or creates a fresh channel when it does
    /// not.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::NoSession`] without a session and
    /// [`PublishError::Transport`] when the lookup or creation fails.
    pub async fn ensure_topic(
        &self,
        session: Option<&Session>,
        topic: TopicId,
    ) -> Result<TopicId, PublishError> {
        let session = session.ok_or(PublishError::NoSession)?;
        match session.call(session.transport().topic_info(topic)).await {
            Ok(_) => Ok(topic),
            Err(TransportError::TopicNotFound(_)) => {
                let created = session
                    .call(session.transport().create_topic(session.operator()))
                    .await?;
                tracing::warn!(configured = %topic, topic_id = %created, "claims topic missing; created a new one");
                Ok(created)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ClaimId;
    use crate::fixtures::{TOPIC, ledger_and_session, payload};
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Debug, Default)]
    struct Collect {
        seen: AsyncMutex<Vec<u64>>,
    }

    #[async_trait]
    impl MessageHandler for Collect {
        async fn on_message(&self, message: TopicMessage) {
            self.seen.lock().await.push(message.sequence);
        }
    }

    async fn wait_for(handler: &Collect, n: usize) -> Vec<u64> {
        for _ in 0..100 {
            let seen = handler.seen.lock().await.clone();
            if seen.len() >= n {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handler.seen.lock().await.clone()
    }

    #[tokio::test]
    async fn publish_returns_receipt() {
        let (_ledger, session) = ledger_and_session();
        let draft = ClaimDraft::new(ClaimId::generate(), payload(500.0));
        let receipt = tokio_test::assert_ok!(
            ClaimEventLog::new()
                .publish(Some(&session), TOPIC, &draft)
                .await
        );
        assert_eq!(receipt.status, "SUCCESS");
        assert_eq!(receipt.sequence, 1);
        assert!(!receipt.transaction_id.as_str().is_empty());
    }

    #[tokio::test]
    async fn publish_without_session_fails() {
        let draft = ClaimDraft::new(ClaimId::generate(), payload(1.0));
        let result = ClaimEventLog::new().publish(None, TOPIC, &draft).await;
        assert!(matches!(result, Err(PublishError::NoSession)));
    }

    #[tokio::test]
    async fn oversized_payload_never_reaches_transport() {
        let (ledger, session) = ledger_and_session();
        let mut big = payload(1.0);
        big.description = "x".repeat(MAX_MESSAGE_BYTES);
        let draft = ClaimDraft::new(ClaimId::generate(), big);
        let result = ClaimEventLog::new()
            .publish(Some(&session), TOPIC, &draft)
            .await;
        assert!(matches!(result, Err(PublishError::PayloadTooLarge { .. })));
        assert_eq!(ledger.message_count(TOPIC).await, 0);
    }

    #[tokio::test]
    async fn rejection_is_surfaced() {
        let (ledger, session) = ledger_and_session();
        ledger.reject_submits(Some("INVALID_SIGNATURE")).await;
        let draft = ClaimDraft::new(ClaimId::generate(), payload(1.0));
        let result = ClaimEventLog::new()
            .publish(Some(&session), TOPIC, &draft)
            .await;
        assert!(matches!(
            result,
            Err(PublishError::Transport(TransportError::Rejected(_)))
        ));
    }

    #[tokio::test]
    async fn subscribe_delivers_in_sequence_order() {
        let (_ledger, session) = ledger_and_session();
        let log = ClaimEventLog::new();
        let handler = Arc::new(Collect::default());
        let cancel = log
            .subscribe(Some(&session), TOPIC, Arc::clone(&handler) as Arc<dyn MessageHandler>)
            .await;

        for amount in [1.0, 2.0, 3.0, 4.0] {
            let draft = ClaimDraft::new(ClaimId::generate(), payload(amount));
            tokio_test::assert_ok!(log.publish(Some(&session), TOPIC, &draft).await);
        }

        assert_eq!(wait_for(&handler, 4).await, vec![1, 2, 3, 4]);
        assert!(cancel.cancel());
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_stops_delivery() {
        let (ledger, session) = ledger_and_session();
        let log = ClaimEventLog::new();
        let handler = Arc::new(Collect::default());
        let cancel = log
            .subscribe(Some(&session), TOPIC, Arc::clone(&handler) as Arc<dyn MessageHandler>)
            .await;

        assert!(!cancel.is_cancelled());
        assert!(cancel.cancel());
        assert!(!cancel.cancel());
        assert!(cancel.is_cancelled());

        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio_test::assert_ok!(
            ledger
                .append_raw(TOPIC, crate::fixtures::OPERATOR, b"{}".to_vec())
                .await
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handler.seen.lock().await.is_empty());
    }

    #[derive(Debug, Default)]
    struct Stalled {
        gate: tokio::sync::Notify,
        seen: AsyncMutex<Vec<u64>>,
        gaps: AsyncMutex<Vec<u64>>,
    }

    #[async_trait]
    impl MessageHandler for Stalled {
        async fn on_message(&self, message: TopicMessage) {
            if message.sequence == 1 {
                self.gate.notified().await;
            }
            self.seen.lock().await.push(message.sequence);
        }

        async fn on_gap(&self, skipped: u64) {
            self.gaps.lock().await.push(skipped);
        }
    }

    #[tokio::test]
    async fn slow_handler_is_told_about_dropped_messages() {
        let (ledger, session) = ledger_and_session();
        let log = ClaimEventLog::new();
        let handler = Arc::new(Stalled::default());
        let cancel = log
            .subscribe(Some(&session), TOPIC, Arc::clone(&handler) as Arc<dyn MessageHandler>)
            .await;

        tokio_test::assert_ok!(
            ledger
                .append_raw(TOPIC, crate::fixtures::OPERATOR, b"{}".to_vec())
                .await
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        for _ in 0..1100 {
            tokio_test::assert_ok!(
                ledger
                    .append_raw(TOPIC, crate::fixtures::OPERATOR, b"{}".to_vec())
                    .await
            );
        }
        handler.gate.notify_one();

        let mut gaps = Vec::new();
        for _ in 0..100 {
            gaps = handler.gaps.lock().await.clone();
            if !gaps.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(gaps.iter().sum::<u64>() > 0);

        for _ in 0..100 {
            if handler.seen.lock().await.last() == Some(&1101) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let seen = handler.seen.lock().await.clone();
        assert_eq!(seen.first(), Some(&1));
        assert_eq!(seen.last(), Some(&1101));
        assert!(seen.len() < 1101);
        assert!(cancel.cancel());
    }

    #[tokio::test]
    async fn subscribe_without_session_is_noop() {
        let handler = Arc::new(Collect::default());
        let cancel = ClaimEventLog::new()
            .subscribe(None, TOPIC, Arc::clone(&handler) as Arc<dyn MessageHandler>)
            .await;
        assert!(cancel.is_cancelled());
        assert!(!cancel.cancel());
        assert!(!cancel.cancel());
    }

    #[tokio::test]
    async fn ensure_topic_creates_missing_channel() {
        let (_ledger, session) = ledger_and_session();
        let log = ClaimEventLog::new();
        let existing = tokio_test::assert_ok!(log.ensure_topic(Some(&session), TOPIC).await);
        assert_eq!(existing, TOPIC);

        let missing = TopicId::new(9999);
        let created = tokio_test::assert_ok!(log.ensure_topic(Some(&session), missing).await);
        assert_ne!(created, missing);
    }
}
