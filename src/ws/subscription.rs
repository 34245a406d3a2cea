//! Per-connection subscription manager.
//!
//! Tracks which claims and submissions a WebSocket client follows and
//! filters [`ClaimUpdate`]s server-side.

use std::collections::HashSet;

use crate::domain::{ClaimId, ClaimUpdate};

/// Manages the subscriptions of a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    claim_ids: HashSet<ClaimId>,
    correlation_ids: HashSet<String>,
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds claims and submissions to follow. `wildcard` follows everything.
    pub fn subscribe(&mut self, claim_ids: &[ClaimId], correlation_ids: &[String], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.claim_ids.extend(claim_ids.iter().cloned());
        self.correlation_ids.extend(correlation_ids.iter().cloned());
    }

    /// Stops following the given claims and submissions. `wildcard` drops
    /// the follow-everything subscription.
    pub fn unsubscribe(
        &mut self,
        claim_ids: &[ClaimId],
        correlation_ids: &[String],
        wildcard: bool,
    ) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in claim_ids {
            self.claim_ids.remove(id);
        }
        for id in correlation_ids {
            self.correlation_ids.remove(id);
        }
    }

    /// Returns `true` if the update passes the subscription filter.
    ///
    /// Updates that concern no claim or submission (history reloads) only
    /// reach wildcard subscribers.
    #[must_use]
    pub fn matches(&self, update: &ClaimUpdate) -> bool {
        self.subscribe_all
            || update.claim_id().is_some_and(|id| self.claim_ids.contains(id))
            || update
                .correlation_id()
                .is_some_and(|id| self.correlation_ids.contains(id))
    }

    /// Number of explicitly followed claims and submissions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.claim_ids.len() + self.correlation_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}
