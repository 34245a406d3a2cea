//! Service layer: the claims event-log core and its orchestration.
//!
//! [`ClaimService`] composes the [`ClaimEventLog`], [`HistoryReader`],
//! [`SubmissionWorkflow`], [`ReadModel`] and [`SubmissionTracker`] around
//! the shared ledger session, and publishes read-model changes through the
//! [`super::domain::EventBus`].

pub mod blob_store;
pub mod claim_service;
pub mod event_log;
pub mod history;
pub mod read_model;
pub mod submission;
pub mod tracker;

pub use blob_store::{BlobStore, LocalBlobStore, MemoryBlobStore};
pub use claim_service::{ClaimService, ClaimSubmission};
pub use event_log::{Cancel, ClaimEventLog, MessageHandler, Receipt};
pub use history::{ClaimHistory, HistoryReader};
pub use read_model::{ReadModel, ReadModelPhase, ReadModelSnapshot};
pub use submission::{Attachment, Attachments, ClaimInput, SubmissionWorkflow, SubmittedClaim};
pub use tracker::{SubmissionState, SubmissionTracker, TrackedSubmission};
