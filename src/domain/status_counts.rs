//! Per-status claim tallies for the dashboard.

use serde::Serialize;
use utoipa::ToSchema;

use super::ClaimStatus;

/// Number of known claims, in total and per [`ClaimStatus`].
///
/// Built from scratch with [`StatusCounts::from_statuses`] on every history
/// load and bumped with [`StatusCounts::record`] for each live event; both
/// paths produce the same tallies for the same events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    /// All claims.
    pub total: u64,
    /// Claims awaiting review.
    pub pending: u64,
    /// Approved claims.
    pub approved: u64,
    /// Denied claims.
    pub denied: u64,
}

impl StatusCounts {
    /// Tallies a full set of statuses.
    #[must_use]
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = ClaimStatus>,
    {
        let mut counts = Self::default();
        for status in statuses {
            counts.record(status);
        }
        counts
    }

    /// Counts one more claim with the given status.
    pub fn record(&mut self, status: ClaimStatus) {
        self.total = self.total.saturating_add(1);
        let bucket = match status {
            ClaimStatus::Pending => &mut self.pending,
            ClaimStatus::Approved => &mut self.approved,
            ClaimStatus::Denied => &mut self.denied,
        };
        *bucket = bucket.saturating_add(1);
    }

    /// Returns the count for a single status.
    #[must_use]
    pub const fn get(&self, status: ClaimStatus) -> u64 {
        match status {
            ClaimStatus::Pending => self.pending,
            ClaimStatus::Approved => self.approved,
            ClaimStatus::Denied => self.denied,
        }
    }
}
