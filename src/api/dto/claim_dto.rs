//! Claim submission and history DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{AttachmentRef, ClaimEvent, ClaimId};
use crate::ledger::TransactionId;
use crate::service::{ClaimHistory, ClaimSubmission};

/// Response body for `POST /api/claims`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitClaimResponse {
    /// Id the claim was published under.
    pub claim_id: ClaimId,
    /// Publish transaction id.
    pub transaction_id: TransactionId,
    /// Acceptance status (`SUCCESS`).
    pub status: String,
    /// Correlation id the submission is tracked under.
    pub correlation_id: String,
    /// Sequence number the claim landed at.
    pub sequence: u64,
    /// Uploaded attachments.
    pub attachments: Vec<AttachmentRef>,
}

impl From<ClaimSubmission> for SubmitClaimResponse {
    fn from(submission: ClaimSubmission) -> Self {
        let ClaimSubmission {
            correlation_id,
            submitted,
        } = submission;
        Self {
            claim_id: submitted.claim_id,
            transaction_id: submitted.receipt.transaction_id,
            status: submitted.receipt.status,
            correlation_id,
            sequence: submitted.receipt.sequence,
            attachments: submitted.attachments,
        }
    }
}

/// Response body for `GET /api/claims/history`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimHistoryResponse {
    /// Claims, newest first.
    pub claims: Vec<ClaimEvent>,
    /// Sequence numbers that could not be fetched.
    pub skipped: Vec<u64>,
    /// Messages that were not claims.
    pub discarded: usize,
    /// Highest sequence number covered.
    pub high_watermark: u64,
}

impl From<ClaimHistory> for ClaimHistoryResponse {
    fn from(history: ClaimHistory) -> Self {
        Self {
            claims: history.events,
            skipped: history.skipped,
            discarded: history.discarded,
            high_watermark: history.high_watermark,
        }
    }
}
