//! Claim history reader: bounded, partial-failure-tolerant channel scan.

use std::collections::BTreeMap;

use futures_util::stream::{self, StreamExt};

use crate::domain::ClaimEvent;
use crate::error::{FetchError, TransportError};
use crate::ledger::{Session, TopicId, TopicMessage};

/// Default number of trailing sequence numbers scanned.
pub const DEFAULT_HISTORY_WINDOW: u64 = 100;

/// Default number of concurrent per-sequence fetches.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Result of a history scan.
///
/// An empty `events` with `Ok` means the channel holds no claims; a scan
/// that could not start is an `Err(FetchError)` instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimHistory {
    /// Claims, newest first.
    pub events: Vec<ClaimEvent>,
    /// Sequence numbers whose fetch failed.
    pub skipped: Vec<u64>,
    /// Messages that were not claims or did not decode.
    pub discarded: usize,
    /// Highest sequence number covered by the scan.
    pub high_watermark: u64,
}

/// Reconstructs recent claims by reading a channel position by position.
#[derive(Debug, Clone, Copy)]
pub struct HistoryReader {
    window: u64,
    concurrency: usize,
}

impl Default for HistoryReader {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW, DEFAULT_FETCH_CONCURRENCY)
    }
}

impl HistoryReader {
    /// Creates a reader scanning `window` positions back from the newest,
    /// with at most `concurrency` fetches in flight.
    #[must_use]
    pub fn new(window: u64, concurrency: usize) -> Self {
        Self {
            window,
            concurrency: concurrency.max(1),
        }
    }

    /// Inclusive range of sequence numbers to scan for a channel whose
    /// newest message is `high`.
    #[must_use]
    pub fn scan_range(&self, high: u64) -> Option<(u64, u64)> {
        (high > 0).then(|| (high.saturating_sub(self.window).max(1), high))
    }

    /// Reads the claims in the trailing window of `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NoSession`] without a session and
    /// [`FetchError::Metadata`] when the channel metadata cannot be read.
    /// Individual fetch and decode failures are logged and skipped.
    pub async fn fetch_history(
        &self,
        session: Option<&Session>,
        topic: TopicId,
    ) -> Result<ClaimHistory, FetchError> {
        let session = session.ok_or(FetchError::NoSession)?;
        let info = session
            .call(session.transport().topic_info(topic))
            .await
            .map_err(FetchError::Metadata)?;

        let Some((low, high)) = self.scan_range(info.sequence_number) else {
            return Ok(ClaimHistory::default());
        };

        let fetched: Vec<(u64, Result<TopicMessage, TransportError>)> =
            stream::iter(low..=high)
                .map(|sequence| async move {
                    let result = session
                        .call(session.transport().message_at(topic, sequence))
                        .await;
                    (sequence, result)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut by_sequence = BTreeMap::new();
        let mut skipped = Vec::new();
        let mut discarded = 0usize;
        for (sequence, result) in fetched {
            let message = match result {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(topic_id = %topic, sequence, error = %e, "skipping unreadable message");
                    skipped.push(sequence);
                    continue;
                }
            };
            match ClaimEvent::from_message(&message) {
                Ok(Some(event)) => {
                    by_sequence.insert(event.sequence, event);
                }
                Ok(None) => discarded += 1,
                Err(e) => {
                    tracing::warn!(topic_id = %topic, sequence, error = %e, "discarding malformed claim");
                    discarded += 1;
                }
            }
        }

        let mut events: Vec<ClaimEvent> = by_sequence.into_values().collect();
        events.sort_by(|a, b| {
            b.consensus_timestamp
                .cmp(&a.consensus_timestamp)
                .then(b.sequence.cmp(&a.sequence))
        });
        skipped.sort_unstable();

        tracing::debug!(
            topic_id = %topic,
            low,
            high,
            claims = events.len(),
            skipped = skipped.len(),
            "history scan complete"
        );

        Ok(ClaimHistory {
            events,
            skipped,
            discarded,
            high_watermark: high,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ClaimDraft, ClaimId};
    use crate::fixtures::{OPERATOR, TOPIC, ledger_and_session, payload};
    use crate::service::ClaimEventLog;

    #[test]
    fn scan_range_is_bounded_by_window() {
        let reader = HistoryReader::new(100, 4);
        assert_eq!(reader.scan_range(0), None);
        assert_eq!(reader.scan_range(1), Some((1, 1)));
        assert_eq!(reader.scan_range(100), Some((1, 100)));
        assert_eq!(reader.scan_range(250), Some((150, 250)));
    }

    #[tokio::test]
    async fn empty_channel_is_success_empty() {
        let (_ledger, session) = ledger_and_session();
        let history = tokio_test::assert_ok!(
            HistoryReader::default()
                .fetch_history(Some(&session), TOPIC)
                .await
        );
        assert!(history.events.is_empty());
        assert!(history.skipped.is_empty());
    }

    #[tokio::test]
    async fn metadata_failure_is_an_error() {
        let (ledger, session) = ledger_and_session();
        ledger.set_metadata_unavailable(true).await;
        let result = HistoryReader::default()
            .fetch_history(Some(&session), TOPIC)
            .await;
        assert!(matches!(result, Err(FetchError::Metadata(_))));

        let result = HistoryReader::default().fetch_history(None, TOPIC).await;
        assert!(matches!(result, Err(FetchError::NoSession)));
    }

    #[tokio::test]
    async fn returns_claims_newest_first_without_duplicates() {
        let (_ledger, session) = ledger_and_session();
        let log = ClaimEventLog::new();
        let mut ids = Vec::new();
        for amount in [100.0, 200.0, 300.0, 400.0, 500.0] {
            let id = ClaimId::generate();
            ids.push(id.clone());
            let draft = ClaimDraft::new(id, payload(amount));
            tokio_test::assert_ok!(log.publish(Some(&session), TOPIC, &draft).await);
        }

        let history = tokio_test::assert_ok!(
            HistoryReader::new(100, 3)
                .fetch_history(Some(&session), TOPIC)
                .await
        );
        let got: Vec<ClaimId> = history.events.iter().map(|e| e.claim_id.clone()).collect();
        ids.reverse();
        assert_eq!(got, ids);
        assert!(
            history
                .events
                .windows(2)
                .all(|w| matches!(w, [a, b] if a.consensus_timestamp > b.consensus_timestamp))
        );
        assert_eq!(history.high_watermark, 5);
    }

    #[tokio::test]
    async fn skips_failures_and_foreign_payloads() {
        let (ledger, session) = ledger_and_session();
        let log = ClaimEventLog::new();
        let first = ClaimDraft::new(ClaimId::generate(), payload(1.0));
        tokio_test::assert_ok!(log.publish(Some(&session), TOPIC, &first).await);
        tokio_test::assert_ok!(
            ledger
                .append_raw(TOPIC, OPERATOR, br#"{"type":"POLICY_ISSUED"}"#.to_vec())
                .await
        );
        tokio_test::assert_ok!(ledger.append_raw(TOPIC, OPERATOR, b"garbage".to_vec()).await);
        let last = ClaimDraft::new(ClaimId::generate(), payload(2.0));
        tokio_test::assert_ok!(log.publish(Some(&session), TOPIC, &last).await);
        ledger.fail_sequence(1).await;

        let history = tokio_test::assert_ok!(
            HistoryReader::default()
                .fetch_history(Some(&session), TOPIC)
                .await
        );
        assert_eq!(history.skipped, vec![1]);
        assert_eq!(history.discarded, 2);
        assert_eq!(history.events.len(), 1);
        let Some(event) = history.events.first() else {
            panic!("one claim expected");
        };
        assert_eq!(event.claim_id, last.claim_id);
    }

    #[tokio::test]
    async fn scan_is_limited_to_window() {
        let (_ledger, session) = ledger_and_session();
        let log = ClaimEventLog::new();
        for amount in 1..=6 {
            let draft = ClaimDraft::new(ClaimId::generate(), payload(f64::from(amount)));
            tokio_test::assert_ok!(log.publish(Some(&session), TOPIC, &draft).await);
        }
        let history = tokio_test::assert_ok!(
            HistoryReader::new(3, 2)
                .fetch_history(Some(&session), TOPIC)
                .await
        );
        let sequences: Vec<u64> = history.events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![6, 5, 4, 3]);
    }
}
