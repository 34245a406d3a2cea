//! Read-model changes pushed to live subscribers.
//!
//! Every change to the claims read model or to a tracked submission emits a
//! [`ClaimUpdate`] through the [`super::EventBus`]. WebSocket connections
//! forward them to clients, filtered by claim id.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ClaimEvent, ClaimId, StatusCounts};
use crate::error::SubmissionStage;
use crate::ledger::TransactionId;

/// Change notification emitted by the read model and the submission tracker.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ClaimUpdate {
    /// A new claim event was observed on the live subscription.
    ClaimRecorded {
        /// The claim as read from the log.
        claim: ClaimEvent,
        /// Tallies after applying the claim.
        counts: StatusCounts,
    },

    /// The recent-claims window was rebuilt from history.
    HistoryReloaded {
        /// Number of claims in the reloaded window.
        total: usize,
        /// Tallies recomputed from the window.
        counts: StatusCounts,
        /// `true` when history could not be read and a placeholder is shown.
        degraded: bool,
        /// Reload time.
        timestamp: DateTime<Utc>,
    },

    /// An optimistic submission was confirmed by the log.
    SubmissionConfirmed {
        /// Caller-visible correlation id.
        correlation_id: String,
        /// Id the claim was published under.
        claim_id: ClaimId,
        /// Receipt transaction id.
        transaction_id: TransactionId,
        /// Position assigned by the log.
        sequence: u64,
        /// Confirmation time.
        timestamp: DateTime<Utc>,
    },

    /// An optimistic submission failed and was rolled back.
    SubmissionFailed {
        /// Caller-visible correlation id.
        correlation_id: String,
        /// Step that failed.
        stage: SubmissionStage,
        /// Human-readable reason.
        reason: String,
        /// Failure time.
        timestamp: DateTime<Utc>,
    },
}

impl ClaimUpdate {
    /// Returns the claim this update concerns, if any.
    #[must_use]
    pub const fn claim_id(&self) -> Option<&ClaimId> {
        match self {
            Self::ClaimRecorded { claim, .. } => Some(&claim.claim_id),
            Self::SubmissionConfirmed { claim_id, .. } => Some(claim_id),
            Self::HistoryReloaded { .. } | Self::SubmissionFailed { .. } => None,
        }
    }

    /// Returns the submission correlation id this update concerns, if any.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::SubmissionConfirmed { correlation_id, .. }
            | Self::SubmissionFailed { correlation_id, .. } => Some(correlation_id.as_str()),
            Self::ClaimRecorded { .. } | Self::HistoryReloaded { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::ClaimRecorded { .. } => "claim_recorded",
            Self::HistoryReloaded { .. } => "history_reloaded",
            Self::SubmissionConfirmed { .. } => "submission_confirmed",
            Self::SubmissionFailed { .. } => "submission_failed",
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn history_reloaded_has_no_claim() {
        let update = ClaimUpdate::HistoryReloaded {
            total: 0,
            counts: StatusCounts::default(),
            degraded: true,
            timestamp: Utc::now(),
        };
        assert!(update.claim_id().is_none());
        assert_eq!(update.event_type_str(), "history_reloaded");
    }

    #[test]
    fn claim_recorded_serializes_with_tag() {
        let claim = ClaimEvent::placeholder();
        let update = ClaimUpdate::ClaimRecorded {
            counts: StatusCounts::from_statuses([claim.status]),
            claim,
        };
        let json = serde_json::to_value(&update).unwrap_or_default();
        assert_eq!(json["event_type"], "claim_recorded");
        assert_eq!(json["claim"]["claimId"], "DEMO123");
        assert_eq!(json["counts"]["pending"], 1);
    }

    #[test]
    fn submission_failed_carries_stage() {
        let update = ClaimUpdate::SubmissionFailed {
            correlation_id: "temp-1".to_string(),
            stage: SubmissionStage::Publish,
            reason: "ledger down".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&update).unwrap_or_default();
        assert!(json.contains("submission_failed"));
        assert!(json.contains("ledger down"));
        assert_eq!(update.correlation_id(), Some("temp-1"));
        assert!(update.claim_id().is_none());
    }
}
