//! Data Transfer Objects for REST request/response serialization.
//!
//! Field names follow the camelCase wire format the claims frontend
//! expects, except where an endpoint's contract says otherwise.

pub mod claim_dto;
pub mod ledger_dto;

pub use claim_dto::*;
pub use ledger_dto::*;
