//! Claim records carried on the event log.
//!
//! A submitter builds a [`ClaimDraft`]; the log assigns position and receipt
//! data, and readers reconstruct a [`ClaimEvent`] from each raw
//! [`TopicMessage`]. The channel is shared with other payloads, so every
//! claim is tagged with [`CLAIM_EVENT_TYPE`] and readers filter on it.
//!
//! Wire format (JSON text, camelCase):
//!
//! ```json
//! {
//!   "type": "INSURANCE_CLAIM",
//!   "claimId": "CLM01",
//!   "status": "PENDING",
//!   "submittedAt": "2026-10-17T09:30:00Z",
//!   "fullName": "Jane Doe",
//!   "policyNumber": "POL-1",
//!   "incidentDate": "2026-10-01",
//!   "description": "Rear-ended at a light",
//!   "amount": 500.0,
//!   "attachments": []
//! }
//! ```

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ClaimId;
use crate::error::DecodeError;
use crate::ledger::{TopicMessage, TransactionId};

/// Tag distinguishing claim records from other payloads on the channel.
pub const CLAIM_EVENT_TYPE: &str = "INSURANCE_CLAIM";

/// Claim id of the placeholder shown when history cannot be loaded.
pub const PLACEHOLDER_CLAIM_ID: &str = "DEMO123";

/// Review status of a claim. Submissions always start as `PENDING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    /// Awaiting review.
    Pending,
    /// Accepted for payout.
    Approved,
    /// Rejected.
    Denied,
}

impl ClaimStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Denied => "DENIED",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attachment slot on the claim form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Photo of the damage.
    Photo,
    /// Dashboard or scene video.
    Video,
    /// Supporting document (report, invoice).
    Document,
}

impl AttachmentKind {
    /// All slots, in upload order.
    pub const ALL: [Self; 3] = [Self::Photo, Self::Video, Self::Document];

    /// Blob store directory for this kind.
    #[must_use]
    pub const fn dir(&self) -> &'static str {
        match self {
            Self::Photo => "photos",
            Self::Video => "videos",
            Self::Document => "documents",
        }
    }

    /// Claim form field name for this kind.
    #[must_use]
    pub const fn field_name(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Document => "document",
        }
    }

    /// Parses a claim form field name.
    #[must_use]
    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.field_name() == name)
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Reference to an uploaded attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    /// Attachment slot.
    pub kind: AttachmentKind,
    /// Retrievable URL in the blob store.
    pub url: String,
    /// Original file name.
    pub file_name: String,
    /// Size in bytes.
    pub size: u64,
}

/// Claimant-supplied fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimPayload {
    /// Claimant's full name.
    pub full_name: String,
    /// Policy the claim is filed against.
    pub policy_number: String,
    /// Date of the incident.
    pub incident_date: NaiveDate,
    /// Free-form incident description.
    pub description: String,
    /// Claimed amount.
    pub amount: f64,
    /// Uploaded attachments.
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

/// A claim as published, before the log assigns sequence and receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimDraft {
    /// Claim identifier.
    pub claim_id: ClaimId,
    /// Review status.
    pub status: ClaimStatus,
    /// Client-assigned publish time.
    pub submitted_at: DateTime<Utc>,
    /// Claimant fields.
    #[serde(flatten)]
    pub payload: ClaimPayload,
}

/// Borrowed wire view that adds the type tag.
#[derive(Serialize)]
struct TaggedDraft<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    draft: &'a ClaimDraft,
}

/// Only the tag, so non-claim payloads of any shape can be skipped.
#[derive(Deserialize)]
struct TypeTag {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl ClaimDraft {
    /// Creates a new `PENDING` claim stamped with the current time.
    #[must_use]
    pub fn new(claim_id: ClaimId, payload: ClaimPayload) -> Self {
        Self {
            claim_id,
            status: ClaimStatus::Pending,
            submitted_at: Utc::now(),
            payload,
        }
    }

    /// Encodes the claim as a tagged JSON message body.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails (non-finite
    /// amounts are encoded as `null` and fail to decode later).
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&TaggedDraft {
            kind: CLAIM_EVENT_TYPE,
            draft: self,
        })
    }

    /// Decodes a message body.
    ///
    /// Returns `Ok(None)` for well-formed JSON that is not tagged as a claim.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] if the body is not JSON or a
    /// claim-tagged body does not have the claim shape.
    pub fn decode(contents: &[u8]) -> Result<Option<Self>, DecodeError> {
        let tag: TypeTag = serde_json::from_slice(contents)?;
        if tag.kind.as_deref() != Some(CLAIM_EVENT_TYPE) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(contents)?))
    }
}

/// A claim record read back from the log, with its assigned position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimEvent {
    /// Claim identifier.
    pub claim_id: ClaimId,
    /// Review status.
    pub status: ClaimStatus,
    /// Client-assigned publish time.
    pub submitted_at: DateTime<Utc>,
    /// Claimant fields.
    #[serde(flatten)]
    pub payload: ClaimPayload,
    /// Position in the channel, strictly increasing from 1.
    pub sequence: u64,
    /// Receipt id of the publish transaction.
    pub transaction_id: TransactionId,
    /// Time the network ordered the message.
    pub consensus_timestamp: DateTime<Utc>,
}

impl ClaimEvent {
    /// Builds an event from a draft and the position the log assigned it.
    #[must_use]
    pub fn from_parts(
        draft: ClaimDraft,
        sequence: u64,
        transaction_id: TransactionId,
        consensus_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            claim_id: draft.claim_id,
            status: draft.status,
            submitted_at: draft.submitted_at,
            payload: draft.payload,
            sequence,
            transaction_id,
            consensus_timestamp,
        }
    }

    /// Decodes a raw channel message.
    ///
    /// Returns `Ok(None)` when the message is not a claim.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if a claim-tagged message is malformed.
    pub fn from_message(message: &TopicMessage) -> Result<Option<Self>, DecodeError> {
        Ok(ClaimDraft::decode(&message.contents)?.map(|draft| {
            Self::from_parts(
                draft,
                message.sequence,
                message.transaction_id.clone(),
                message.consensus_timestamp,
            )
        }))
    }

    /// Synthetic claim shown while ledger history is unavailable.
    #[must_use]
    pub fn placeholder() -> Self {
        let now = Utc::now();
        Self {
            claim_id: ClaimId::placeholder(),
            status: ClaimStatus::Pending,
            submitted_at: now,
            payload: ClaimPayload {
                full_name: String::new(),
                policy_number: String::new(),
                incident_date: now.date_naive(),
                description: String::new(),
                amount: 0.0,
                attachments: Vec::new(),
            },
            sequence: 0,
            transaction_id: TransactionId::placeholder(),
            consensus_timestamp: now,
        }
    }

    /// Returns `true` for the degraded-mode placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.sequence == 0 && self.transaction_id.is_placeholder()
    }
}
