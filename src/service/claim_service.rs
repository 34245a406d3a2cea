//! Claim service: wires the event log, history reader, submission workflow,
//! read model and submission tracker around the shared ledger session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::blob_store::BlobStore;
use super::event_log::{ClaimEventLog, MessageHandler};
use super::history::{ClaimHistory, HistoryReader};
use super::read_model::{ReadModel, ReadModelPhase, ReadModelSnapshot};
use super::submission::{Attachments, ClaimInput, SubmissionWorkflow, SubmittedClaim};
use super::tracker::{SubmissionTracker, TrackedSubmission};
use crate::config::GatewayConfig;
use crate::domain::{ClaimEvent, ClaimId, ClaimUpdate, EventBus};
use crate::error::{FetchError, GatewayError, SubmissionError, SubmissionStage};
use crate::ledger::{AccountId, Hbar, Session, SessionCell, TopicId};

/// A confirmed submission together with its correlation id.
#[derive(Debug, Clone)]
pub struct ClaimSubmission {
    /// Correlation id the submission was tracked under.
    pub correlation_id: String,
    /// Published claim.
    pub submitted: SubmittedClaim,
}

/// Orchestration layer for every claims operation.
///
/// Owns the read model and the submission tracker; reads the session from
/// the shared [`SessionCell`] on every call so a replaced session takes
/// effect immediately.
#[derive(Debug)]
pub struct ClaimService {
    sessions: Arc<SessionCell>,
    topic: Option<TopicId>,
    event_log: ClaimEventLog,
    history: HistoryReader,
    workflow: SubmissionWorkflow,
    tracker: Arc<SubmissionTracker>,
    read_model: Arc<ReadModel>,
    event_bus: EventBus,
    submission_timeout: Duration,
}

impl ClaimService {
    /// Creates a new `ClaimService`.
    ///
    /// `topic` is `None` when no claims topic is configured; ledger-backed
    /// operations then report themselves unavailable.
    #[must_use]
    pub fn new(
        config: &GatewayConfig,
        sessions: Arc<SessionCell>,
        topic: Option<TopicId>,
        blobs: Arc<dyn BlobStore>,
        event_bus: EventBus,
    ) -> Self {
        let event_log = ClaimEventLog::new();
        Self {
            sessions,
            topic,
            event_log,
            history: HistoryReader::new(config.history_window, config.history_fetch_concurrency),
            workflow: SubmissionWorkflow::new(blobs, event_log, config.max_attachment_bytes),
            tracker: Arc::new(SubmissionTracker::new(config.submission_retention)),
            read_model: Arc::new(ReadModel::new(config.read_model_window, event_bus.clone())),
            event_bus,
            submission_timeout: config.submission_timeout,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Configured claims topic.
    #[must_use]
    pub const fn topic(&self) -> Option<TopicId> {
        self.topic
    }

    /// Subscribes the read model to the claims topic, then seeds it from
    /// history. Subscribing first means nothing published during the scan
    /// is missed.
    pub async fn start(&self) -> ReadModelPhase {
        let session = self.sessions.current();
        if let Some(topic) = self.topic {
            let handler: Arc<dyn MessageHandler> = Arc::clone(&self.read_model) as _;
            let cancel = self
                .event_log
                .subscribe(session.as_deref(), topic, handler)
                .await;
            self.read_model.attach(cancel);
        }
        self.spawn_resync();
        let phase = self
            .read_model
            .bootstrap(&self.history, session.as_deref(), self.topic)
            .await;
        tracing::info!(?phase, topic = ?self.topic, "claims read model started");
        phase
    }

    /// Re-reads history whenever the live subscription reports a gap, until
    /// the read model shuts down.
    fn spawn_resync(&self) {
        let read_model = Arc::clone(&self.read_model);
        let sessions = Arc::clone(&self.sessions);
        let history = self.history;
        let topic = self.topic;
        tokio::spawn(async move {
            while read_model.wait_for_resync().await {
                let snapshot = read_model
                    .refresh(&history, sessions.current().as_deref(), topic)
                    .await;
                tracing::info!(phase = ?snapshot.state, "read model resynced after subscription gap");
            }
            tracing::debug!("read model resync stopped");
        });
    }

    /// Stops the live subscription. Returns `true` if one was running.
    pub fn shutdown(&self) -> bool {
        let stopped = self.read_model.shutdown();
        if stopped {
            tracing::info!("claims subscription cancelled");
        }
        stopped
    }

    /// Submits a claim, tracking it under a correlation id.
    ///
    /// The submission runs on its own task and always finishes; if it
    /// outlives the submission timeout the tracked entry is marked failed
    /// and later reconciled when the task completes.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] carrying the validation, upload or publish
    /// failure, or [`GatewayError::LedgerUnavailable`] on timeout.
    pub async fn submit_claim(
        &self,
        requested_correlation_id: Option<&str>,
        input: ClaimInput,
        attachments: Attachments,
    ) -> Result<ClaimSubmission, GatewayError> {
        let correlation_id = SubmissionTracker::correlation_id(requested_correlation_id);
        self.tracker.begin(&correlation_id).await;

        let workflow = self.workflow.clone();
        let tracker = Arc::clone(&self.tracker);
        let bus = self.event_bus.clone();
        let session = self.sessions.current();
        let topic = self.topic;
        let id = correlation_id.clone();
        let task = tokio::spawn(async move {
            let result = workflow
                .submit(session.as_deref(), topic, &input, &attachments)
                .await;
            reconcile(&tracker, &bus, &id, result).await
        });

        match tokio::time::timeout(self.submission_timeout, task).await {
            Ok(Ok(result)) => {
                let submitted = result?;
                Ok(ClaimSubmission {
                    correlation_id,
                    submitted,
                })
            }
            Ok(Err(join_error)) => {
                let reason = format!("submission task failed: {join_error}");
                self.record_failure(&correlation_id, SubmissionStage::Publish, &reason)
                    .await;
                Err(GatewayError::Internal(reason))
            }
            Err(_) => {
                let reason = format!(
                    "submission did not finish within {}s",
                    self.submission_timeout.as_secs()
                );
                self.record_failure(&correlation_id, SubmissionStage::Publish, &reason)
                    .await;
                Err(GatewayError::LedgerUnavailable(reason))
            }
        }
    }

    async fn record_failure(&self, correlation_id: &str, stage: SubmissionStage, reason: &str) {
        tracing::warn!(correlation_id, %stage, reason, "submission marked failed");
        self.tracker
            .fail(correlation_id, stage, reason.to_string())
            .await;
        let _ = self.event_bus.publish(ClaimUpdate::SubmissionFailed {
            correlation_id: correlation_id.to_string(),
            stage,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Scans recent claim history directly.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the scan cannot start.
    pub async fn history(&self) -> Result<ClaimHistory, FetchError> {
        let topic = self.topic.ok_or(FetchError::NoTopic)?;
        let session = self.sessions.current();
        self.history.fetch_history(session.as_deref(), topic).await
    }

    /// Current read-model view.
    pub async fn snapshot(&self) -> ReadModelSnapshot {
        self.read_model.snapshot().await
    }

    /// Re-seeds the read model from history.
    pub async fn refresh(&self) -> ReadModelSnapshot {
        let session = self.sessions.current();
        self.read_model
            .refresh(&self.history, session.as_deref(), self.topic)
            .await
    }

    /// Latest known event for a claim.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ClaimNotFound`] if the read model has not
    /// seen the claim.
    pub async fn find_claim(&self, claim_id: &ClaimId) -> Result<ClaimEvent, GatewayError> {
        self.read_model
            .find(claim_id)
            .await
            .ok_or_else(|| GatewayError::ClaimNotFound(claim_id.to_string()))
    }

    /// State of a tracked submission.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SubmissionNotFound`] if the id is unknown or
    /// was evicted.
    pub async fn submission(&self, correlation_id: &str) -> Result<TrackedSubmission, GatewayError> {
        self.tracker
            .get(correlation_id)
            .await
            .ok_or_else(|| GatewayError::SubmissionNotFound(correlation_id.to_string()))
    }

    /// The active ledger session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::LedgerUnavailable`] with the configuration
    /// failure when no session exists.
    pub fn session(&self) -> Result<Arc<Session>, GatewayError> {
        self.sessions.current().ok_or_else(|| {
            GatewayError::LedgerUnavailable(
                self.sessions
                    .unavailable_reason()
                    .unwrap_or_else(|| "ledger session not initialized".to_string()),
            )
        })
    }

    /// Balance of the operator account.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] without a session or when the query fails.
    pub async fn account_balance(&self) -> Result<(AccountId, Hbar), GatewayError> {
        let session = self.session()?;
        let account = session.operator_id();
        let balance = session
            .call(session.transport().account_balance(account))
            .await?;
        Ok((account, balance))
    }

    /// Round-trip time to the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] without a session or when the node cannot
    /// be reached.
    pub async fn ping(&self) -> Result<Duration, GatewayError> {
        let session = self.session()?;
        Ok(session.call(session.transport().ping()).await?)
    }
}

/// Records the workflow outcome on the tracker and the bus.
async fn reconcile(
    tracker: &SubmissionTracker,
    bus: &EventBus,
    correlation_id: &str,
    result: Result<SubmittedClaim, SubmissionError>,
) -> Result<SubmittedClaim, SubmissionError> {
    match &result {
        Ok(submitted) => {
            tracker
                .confirm(
                    correlation_id,
                    submitted.claim_id.clone(),
                    submitted.receipt.clone(),
                )
                .await;
            let _ = bus.publish(ClaimUpdate::SubmissionConfirmed {
                correlation_id: correlation_id.to_string(),
                claim_id: submitted.claim_id.clone(),
                transaction_id: submitted.receipt.transaction_id.clone(),
                sequence: submitted.receipt.sequence,
                timestamp: Utc::now(),
            });
        }
        Err(e) => {
            let stage = e.stage();
            tracing::warn!(correlation_id, %stage, error = %e, "claim submission failed");
            tracker.fail(correlation_id, stage, e.to_string()).await;
            let _ = bus.publish(ClaimUpdate::SubmissionFailed {
                correlation_id: correlation_id.to_string(),
                stage,
                reason: e.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
    result
}
