//! Domain layer: claim records, identifiers, tallies and the update bus.
//!
//! This module contains the claim model as it travels over the event log
//! ([`ClaimDraft`] out, [`ClaimEvent`] back), the per-status tallies kept by
//! the read model, and the in-process bus that fans read-model changes out
//! to WebSocket clients.

pub mod claim_event;
pub mod claim_id;
pub mod claim_update;
pub mod event_bus;
pub mod status_counts;

pub use claim_event::{
    AttachmentKind, AttachmentRef, CLAIM_EVENT_TYPE, ClaimDraft, ClaimEvent, ClaimPayload,
    ClaimStatus,
};
pub use claim_id::ClaimId;
pub use claim_update::ClaimUpdate;
pub use event_bus::EventBus;
pub use status_counts::StatusCounts;
