//! Optimistic submission tracking.
//!
//! A submission is registered as `Pending` under a correlation id before any
//! work starts, then reconciled to `Confirmed` or `Failed`. Entries are
//! never removed on failure; the only removal is oldest-first eviction once
//! the retention bound is reached.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::event_log::Receipt;
use crate::domain::ClaimId;
use crate::error::SubmissionStage;

/// Default number of tracked submissions kept.
pub const DEFAULT_RETENTION: usize = 256;

const MAX_CORRELATION_ID_LEN: usize = 64;

/// Reconciliation state of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubmissionState {
    /// Accepted locally, not yet confirmed by the log.
    Pending,
    /// Published.
    Confirmed {
        /// Claim id.
        claim_id: ClaimId,
        /// Publish receipt.
        receipt: Receipt,
    },
    /// Failed at the given stage; nothing was published.
    Failed {
        /// Failing step.
        #[schema(value_type = String)]
        stage: SubmissionStage,
        /// Human-readable reason.
        reason: String,
    },
}

/// A tracked submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TrackedSubmission {
    /// Correlation id.
    pub correlation_id: String,
    /// Current state.
    #[serde(flatten)]
    pub state: SubmissionState,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
}

/// Bounded registry of in-flight and recent submissions.
#[derive(Debug)]
pub struct SubmissionTracker {
    entries: RwLock<VecDeque<TrackedSubmission>>,
    capacity: usize,
}

impl Default for SubmissionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl SubmissionTracker {
    /// Creates a tracker retaining at most `capacity` submissions.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Normalises a client-supplied correlation id, or generates
    /// `temp-<uuid>` when none usable was given.
    #[must_use]
    pub fn correlation_id(requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|id| {
                !id.is_empty()
                    && id.len() <= MAX_CORRELATION_ID_LEN
                    && id
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            })
            .map_or_else(|| format!("temp-{}", uuid::Uuid::new_v4()), str::to_string)
    }

    /// Registers a pending submission, evicting the oldest entries when
    /// full. Re-registering an id resets it to `Pending`.
    pub async fn begin(&self, correlation_id: &str) -> TrackedSubmission {
        let now = Utc::now();
        let entry = TrackedSubmission {
            correlation_id: correlation_id.to_string(),
            state: SubmissionState::Pending,
            created_at: now,
            updated_at: now,
        };
        let mut entries = self.entries.write().await;
        entries.retain(|e| e.correlation_id != correlation_id);
        while entries.len() >= self.capacity {
            if let Some(evicted) = entries.pop_front() {
                tracing::debug!(correlation_id = %evicted.correlation_id, "evicting oldest tracked submission");
            }
        }
        entries.push_back(entry.clone());
        entry
    }

    /// Marks a submission confirmed. Returns `None` if it was evicted.
    pub async fn confirm(
        &self,
        correlation_id: &str,
        claim_id: ClaimId,
        receipt: Receipt,
    ) -> Option<TrackedSubmission> {
        self.update(correlation_id, SubmissionState::Confirmed { claim_id, receipt })
            .await
    }

    /// Marks a submission failed. Returns `None` if it was evicted.
    pub async fn fail(
        &self,
        correlation_id: &str,
        stage: SubmissionStage,
        reason: String,
    ) -> Option<TrackedSubmission> {
        self.update(correlation_id, SubmissionState::Failed { stage, reason })
            .await
    }

    /// Looks up a submission.
    pub async fn get(&self, correlation_id: &str) -> Option<TrackedSubmission> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.correlation_id == correlation_id)
            .cloned()
    }

    /// Number of tracked submissions.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` when nothing is tracked.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn update(
        &self,
        correlation_id: &str,
        state: SubmissionState,
    ) -> Option<TrackedSubmission> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.correlation_id == correlation_id)?;
        entry.state = state;
        entry.updated_at = Utc::now();
        Some(entry.clone())
    }
}
