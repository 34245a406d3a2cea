//! Type-safe claim identifier.
//!
//! [`ClaimId`] is an opaque string chosen by the submitter or generated by
//! the submission workflow. It is the correlation key for tracking a claim
//! across the event log, the read model and WebSocket subscriptions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ClaimIdError;

/// Longest claim id accepted from a submitter.
pub const MAX_CLAIM_ID_LEN: usize = 64;

/// Unique identifier for an insurance claim.
///
/// Ids read back from the event log are taken as-is; ids supplied by a
/// submitter go through [`FromStr`], which rejects blanks, whitespace and
/// path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ClaimId(String);

impl ClaimId {
    /// Generates a new id of the form `CLM-XXXXXXXX` (8 upper-case hex digits).
    #[must_use]
    pub fn generate() -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        let suffix: String = simple.chars().take(8).collect();
        Self(format!("CLM-{}", suffix.to_uppercase()))
    }

    /// Id of the degraded-mode placeholder claim.
    pub(crate) fn placeholder() -> Self {
        Self(super::claim_event::PLACEHOLDER_CLAIM_ID.to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClaimId {
    type Err = ClaimIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ClaimIdError::Empty);
        }
        let len = trimmed.chars().count();
        if len > MAX_CLAIM_ID_LEN {
            return Err(ClaimIdError::TooLong(len));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '\\'))
        {
            return Err(ClaimIdError::InvalidChar(bad));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl AsRef<str> for ClaimId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
