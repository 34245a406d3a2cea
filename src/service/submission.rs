//! Claim submission workflow: validate, upload attachments, publish.
//!
//! Steps run strictly in order and each can fail on its own. Nothing is
//! written to the event log unless every attachment uploaded.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::blob_store::{BlobStore, blob_path};
use super::event_log::{ClaimEventLog, Receipt};
use crate::domain::{AttachmentKind, AttachmentRef, ClaimDraft, ClaimId, ClaimPayload};
use crate::error::{FieldError, PublishError, SubmissionError};
use crate::ledger::{Session, TopicId};

/// Default per-attachment size cap (20 MiB).
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 20 * 1024 * 1024;

/// Claim form fields as submitted, before validation.
#[derive(Debug, Clone, Default)]
pub struct ClaimInput {
    /// Caller-chosen claim id; generated when absent.
    pub claim_id: Option<String>,
    /// Claimant's full name.
    pub full_name: String,
    /// Policy number.
    pub policy_number: String,
    /// Incident date, `YYYY-MM-DD`.
    pub incident_date: String,
    /// Incident description.
    pub description: String,
    /// Claimed amount, decimal.
    pub amount: String,
}

/// One uploaded file.
#[derive(Clone, Default)]
pub struct Attachment {
    /// Name the client gave the file.
    pub file_name: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// The three optional attachment slots of the claim form.
#[derive(Debug, Clone, Default)]
pub struct Attachments {
    /// Photo of the damage.
    pub photo: Option<Attachment>,
    /// Scene video.
    pub video: Option<Attachment>,
    /// Supporting document.
    pub document: Option<Attachment>,
}

impl Attachments {
    /// Mutable access to a slot.
    pub fn slot_mut(&mut self, kind: AttachmentKind) -> &mut Option<Attachment> {
        match kind {
            AttachmentKind::Photo => &mut self.photo,
            AttachmentKind::Video => &mut self.video,
            AttachmentKind::Document => &mut self.document,
        }
    }

    /// Non-empty slots in upload order.
    fn present(&self) -> impl Iterator<Item = (AttachmentKind, &Attachment)> {
        [
            (AttachmentKind::Photo, &self.photo),
            (AttachmentKind::Video, &self.video),
            (AttachmentKind::Document, &self.document),
        ]
        .into_iter()
        .filter_map(|(kind, slot)| slot.as_ref().filter(|a| !a.bytes.is_empty()).map(|a| (kind, a)))
    }
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedClaim {
    /// Id the claim was published under.
    pub claim_id: ClaimId,
    /// Publish receipt.
    pub receipt: Receipt,
    /// Uploaded attachments.
    pub attachments: Vec<AttachmentRef>,
}

/// Checks the form fields, collecting every problem.
///
/// # Errors
///
/// Returns all field errors at once.
pub fn validate(input: &ClaimInput) -> Result<(Option<ClaimId>, ClaimPayload), Vec<FieldError>> {
    let mut errors = Vec::new();

    let claim_id = match input.claim_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<ClaimId>() {
            Ok(id) => Some(id),
            Err(e) => {
                errors.push(FieldError::new("claimId", e.to_string()));
                None
            }
        },
    };

    for (field, value) in [
        ("fullName", &input.full_name),
        ("policyNumber", &input.policy_number),
        ("description", &input.description),
    ] {
        if value.trim().is_empty() {
            errors.push(FieldError::new(field, "is required"));
        }
    }

    let incident_date = match NaiveDate::parse_from_str(input.incident_date.trim(), "%Y-%m-%d") {
        Ok(date) if date > Utc::now().date_naive() => {
            errors.push(FieldError::new("incidentDate", "must not be in the future"));
            None
        }
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(FieldError::new("incidentDate", "must be a date in YYYY-MM-DD form"));
            None
        }
    };

    let amount = match input.amount.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount > 0.0 => Some(amount),
        Ok(_) => {
            errors.push(FieldError::new("amount", "must be greater than zero"));
            None
        }
        Err(_) => {
            errors.push(FieldError::new("amount", "must be a number"));
            None
        }
    };

    match (incident_date, amount) {
        (Some(incident_date), Some(amount)) if errors.is_empty() => Ok((
            claim_id,
            ClaimPayload {
                full_name: input.full_name.trim().to_string(),
                policy_number: input.policy_number.trim().to_string(),
                incident_date,
                description: input.description.trim().to_string(),
                amount,
                attachments: Vec::new(),
            },
        )),
        _ => Err(errors),
    }
}

/// Orchestrates a claim submission.
#[derive(Debug, Clone)]
pub struct SubmissionWorkflow {
    blobs: Arc<dyn BlobStore>,
    log: ClaimEventLog,
    max_attachment_bytes: u64,
}

impl SubmissionWorkflow {
    /// Creates a workflow uploading to `blobs` and publishing through `log`.
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>, log: ClaimEventLog, max_attachment_bytes: u64) -> Self {
        Self {
            blobs,
            log,
            max_attachment_bytes,
        }
    }

    /// Validates, uploads and publishes a claim.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError`] naming the failing stage. Validation and
    /// size failures happen before any upload; upload failures happen before
    /// any publish.
    pub async fn submit(
        &self,
        session: Option<&Session>,
        topic: Option<TopicId>,
        input: &ClaimInput,
        attachments: &Attachments,
    ) -> Result<SubmittedClaim, SubmissionError> {
        let (claim_id, mut payload) = validate(input).map_err(SubmissionError::Validation)?;

        for (kind, attachment) in attachments.present() {
            let size = attachment.bytes.len() as u64;
            if size > self.max_attachment_bytes {
                return Err(SubmissionError::AttachmentTooLarge {
                    kind,
                    size,
                    limit: self.max_attachment_bytes,
                });
            }
        }

        let session = session.ok_or(PublishError::NoSession)?;
        let topic = topic.ok_or(PublishError::NoTopic)?;

        let claim_id = claim_id.unwrap_or_else(ClaimId::generate);
        for (kind, attachment) in attachments.present() {
            let path = blob_path(kind, &attachment.file_name);
            let url = self
                .blobs
                .upload(attachment.bytes.clone(), &path)
                .await
                .map_err(|source| {
                    tracing::warn!(claim_id = %claim_id, stage = %kind, error = %source, "attachment upload failed");
                    SubmissionError::Upload { kind, source }
                })?;
            payload.attachments.push(AttachmentRef {
                kind,
                url,
                file_name: attachment.file_name.clone(),
                size: attachment.bytes.len() as u64,
            });
        }

        let draft = ClaimDraft::new(claim_id, payload);
        let receipt = self.log.publish(Some(session), topic, &draft).await?;
        Ok(SubmittedClaim {
            claim_id: draft.claim_id,
            receipt,
            attachments: draft.payload.attachments,
        })
    }
}
