//! UI-facing read model of the claims channel.
//!
//! Holds the recent-claims window and per-status tallies, seeded from a
//! history scan and then advanced by live events. All mutations go through
//! one write lock, so live deliveries and history loads never interleave.
//!
//! ```text
//! Loading ──history ok──▶ Ready
//!    │                      ▲
//!    └──history failed──▶ Degraded ──refresh ok──┘
//! ```
//!
//! Live events that arrive while a history load is in flight are buffered
//! and re-applied once it lands; anything at or below the loaded high
//! watermark is already covered by history and is dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Notify, RwLock};
use utoipa::ToSchema;

use super::event_log::{Cancel, MessageHandler};
use super::history::{ClaimHistory, HistoryReader};
use crate::domain::{ClaimEvent, ClaimId, ClaimStatus, ClaimUpdate, EventBus, StatusCounts};
use crate::error::FetchError;
use crate::ledger::{Session, TopicId, TopicMessage};

/// Default number of claims kept in the recent window.
pub const DEFAULT_READ_MODEL_WINDOW: usize = 5;

/// Lifecycle of the read model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReadModelPhase {
    /// Waiting for the first history load.
    Loading,
    /// Seeded from history.
    Ready,
    /// History could not be loaded; a placeholder claim is shown.
    Degraded,
}

/// Point-in-time copy of the read model.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReadModelSnapshot {
    /// Lifecycle phase.
    pub state: ReadModelPhase,
    /// Why history could not be loaded, or a pending resync after a gap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-status tallies.
    pub counts: StatusCounts,
    /// Most recent claims, newest first.
    pub recent: Vec<ClaimEvent>,
    /// Highest sequence number applied.
    pub high_sequence: u64,
}

#[derive(Debug)]
struct ReadModelState {
    phase: ReadModelPhase,
    error: Option<String>,
    recent: VecDeque<ClaimEvent>,
    counts: StatusCounts,
    latest_by_claim: HashMap<ClaimId, ClaimEvent>,
    high_sequence: u64,
    buffering: bool,
    pending: Vec<ClaimEvent>,
}

impl ReadModelState {
    fn new() -> Self {
        Self {
            phase: ReadModelPhase::Loading,
            error: None,
            recent: VecDeque::new(),
            counts: StatusCounts::default(),
            latest_by_claim: HashMap::new(),
            high_sequence: 0,
            buffering: true,
            pending: Vec::new(),
        }
    }

    /// Applies one event in O(1). Returns `false` if history already
    /// covered it.
    fn apply(&mut self, event: ClaimEvent, window: usize) -> bool {
        if event.sequence <= self.high_sequence {
            return false;
        }
        self.high_sequence = event.sequence;
        self.counts.record(event.status);
        self.latest_by_claim
            .insert(event.claim_id.clone(), event.clone());
        self.recent.push_front(event);
        self.recent.truncate(window);
        true
    }

    fn seed(&mut self, history: &ClaimHistory, window: usize) {
        self.counts = StatusCounts::from_statuses(history.events.iter().map(|e| e.status));
        self.latest_by_claim = history
            .events
            .iter()
            .rev()
            .map(|e| (e.claim_id.clone(), e.clone()))
            .collect();
        self.recent = history.events.iter().take(window).cloned().collect();
        let newest = history.events.iter().map(|e| e.sequence).max().unwrap_or(0);
        self.high_sequence = history.high_watermark.max(newest);
        self.phase = ReadModelPhase::Ready;
        self.error = None;
    }

    fn degrade(&mut self, error: &FetchError) {
        let placeholder = ClaimEvent::placeholder();
        self.counts = StatusCounts::from_statuses([ClaimStatus::Pending]);
        self.latest_by_claim.clear();
        self.recent = VecDeque::from([placeholder]);
        self.high_sequence = 0;
        self.phase = ReadModelPhase::Degraded;
        self.error = Some(error.to_string());
    }

    fn snapshot(&self) -> ReadModelSnapshot {
        ReadModelSnapshot {
            state: self.phase,
            error: self.error.clone(),
            counts: self.counts,
            recent: self.recent.iter().cloned().collect(),
            high_sequence: self.high_sequence,
        }
    }
}

/// Derived, in-memory view of the claims channel.
#[derive(Debug)]
pub struct ReadModel {
    state: RwLock<ReadModelState>,
    window: usize,
    bus: EventBus,
    load_gate: tokio::sync::Mutex<()>,
    subscription: Mutex<Option<Cancel>>,
    resync: Notify,
    closed: AtomicBool,
}

impl ReadModel {
    /// Creates a read model in the `Loading` phase keeping `window` recent
    /// claims and publishing changes on `bus`.
    #[must_use]
    pub fn new(window: usize, bus: EventBus) -> Self {
        Self {
            state: RwLock::new(ReadModelState::new()),
            window: window.max(1),
            bus,
            load_gate: tokio::sync::Mutex::new(()),
            subscription: Mutex::new(None),
            resync: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Seeds the model from history, moving it to `Ready` or `Degraded`.
    pub async fn bootstrap(
        &self,
        reader: &HistoryReader,
        session: Option<&Session>,
        topic: Option<TopicId>,
    ) -> ReadModelPhase {
        self.load(reader, session, topic).await.state
    }

    /// Re-scans history and recomputes tallies from scratch.
    ///
    /// Reads keep serving the previous state while the scan runs. A failed
    /// refresh keeps the current data, including live events applied since
    /// the model degraded, and records the error.
    pub async fn refresh(
        &self,
        reader: &HistoryReader,
        session: Option<&Session>,
        topic: Option<TopicId>,
    ) -> ReadModelSnapshot {
        self.load(reader, session, topic).await
    }

    async fn load(
        &self,
        reader: &HistoryReader,
        session: Option<&Session>,
        topic: Option<TopicId>,
    ) -> ReadModelSnapshot {
        let _gate = self.load_gate.lock().await;
        self.state.write().await.buffering = true;
        let result = match topic {
            Some(topic) => reader.fetch_history(session, topic).await,
            None => Err(FetchError::NoTopic),
        };
        self.apply_history(result).await
    }

    /// Applies a history scan outcome and merges any buffered live events.
    pub async fn apply_history(
        &self,
        result: Result<ClaimHistory, FetchError>,
    ) -> ReadModelSnapshot {
        let mut state = self.state.write().await;
        let first_load = state.phase == ReadModelPhase::Loading;

        let (total, degraded) = match &result {
            Ok(history) => {
                state.seed(history, self.window);
                tracing::info!(
                    claims = history.events.len(),
                    skipped = history.skipped.len(),
                    high_sequence = state.high_sequence,
                    "read model loaded from history"
                );
                (history.events.len(), false)
            }
            Err(e) if state.phase != ReadModelPhase::Loading => {
                tracing::warn!(error = %e, phase = ?state.phase, "history refresh failed; keeping current view");
                state.error = Some(e.to_string());
                (
                    state.recent.len(),
                    state.phase == ReadModelPhase::Degraded,
                )
            }
            Err(e) => {
                tracing::warn!(error = %e, "history unavailable; read model degraded");
                state.degrade(e);
                (1, true)
            }
        };

        state.buffering = false;
        let pending = std::mem::take(&mut state.pending);
        let mut surfaced = Vec::new();
        for event in pending {
            if state.apply(event.clone(), self.window) && first_load {
                surfaced.push(event);
            }
        }

        let counts = state.counts;
        let snapshot = state.snapshot();
        drop(state);

        let _ = self.bus.publish(ClaimUpdate::HistoryReloaded {
            total,
            counts,
            degraded,
            timestamp: Utc::now(),
        });
        let replayed = surfaced.len();
        for claim in surfaced {
            let _ = self.bus.publish(ClaimUpdate::ClaimRecorded { claim, counts });
        }
        if replayed > 0 {
            tracing::debug!(replayed, "merged live events buffered during load");
        }
        snapshot
    }

    /// Applies one live event. Returns `true` if it changed the view.
    pub async fn apply_live(&self, event: ClaimEvent) -> bool {
        let mut state = self.state.write().await;
        if state.buffering {
            state.pending.push(event.clone());
        }
        if state.phase == ReadModelPhase::Loading {
            return false;
        }
        let claim_id = event.claim_id.clone();
        let sequence = event.sequence;
        if !state.apply(event.clone(), self.window) {
            return false;
        }
        let counts = state.counts;
        drop(state);

        tracing::debug!(claim_id = %claim_id, sequence, "live claim applied");
        let _ = self.bus.publish(ClaimUpdate::ClaimRecorded {
            claim: event,
            counts,
        });
        true
    }

    /// Stores the live subscription, cancelling any previous one.
    pub fn attach(&self, cancel: Cancel) {
        let previous = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(cancel);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Waits until the live subscription reports a gap. Returns `false`
    /// once the model has been shut down.
    pub async fn wait_for_resync(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.resync.notified().await;
        !self.closed.load(Ordering::Acquire)
    }

    /// Cancels the live subscription. Returns `true` if one was stopped.
    ///
    /// Also releases any task blocked in [`ReadModel::wait_for_resync`].
    pub fn shutdown(&self) -> bool {
        self.closed.store(true, Ordering::Release);
        self.resync.notify_one();
        let cancel = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        cancel.is_some_and(|c| c.cancel())
    }

    /// Current view.
    pub async fn snapshot(&self) -> ReadModelSnapshot {
        self.state.read().await.snapshot()
    }

    /// Latest known event for a claim.
    pub async fn find(&self, claim_id: &ClaimId) -> Option<ClaimEvent> {
        self.state.read().await.latest_by_claim.get(claim_id).cloned()
    }
}

#[async_trait]
impl MessageHandler for ReadModel {
    async fn on_message(&self, message: TopicMessage) {
        match ClaimEvent::from_message(&message) {
            Ok(Some(event)) => {
                self.apply_live(event).await;
            }
            Ok(None) => {
                tracing::debug!(sequence = message.sequence, "ignoring non-claim message");
            }
            Err(e) => {
                tracing::warn!(
                    topic_id = %message.topic_id,
                    sequence = message.sequence,
                    error = %e,
                    "dropping malformed claim message"
                );
            }
        }
    }

    async fn on_gap(&self, skipped: u64) {
        let mut state = self.state.write().await;
        state.error = Some(format!(
            "live subscription dropped {skipped} messages; refreshing"
        ));
        drop(state);
        tracing::warn!(skipped, "live subscription gap; scheduling history refresh");
        self.resync.notify_one();
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::domain::ClaimDraft;
    use crate::fixtures::{OPERATOR, TOPIC, ledger_and_session, payload};
    use crate::ledger::TransactionId;
    use crate::service::ClaimEventLog;

    fn event(sequence: u64, status: ClaimStatus) -> ClaimEvent {
        let mut draft = ClaimDraft::new(ClaimId::generate(), payload(10.0));
        draft.status = status;
        let at = Utc::now();
        ClaimEvent::from_parts(draft, sequence, TransactionId::new(OPERATOR, at), at)
    }

    fn history(events: Vec<ClaimEvent>) -> ClaimHistory {
        let high_watermark = events.iter().map(|e| e.sequence).max().unwrap_or(0);
        let mut events = events;
        events.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        ClaimHistory {
            events,
            high_watermark,
            ..ClaimHistory::default()
        }
    }

    fn model(window: usize) -> ReadModel {
        ReadModel::new(window, EventBus::new(64))
    }

    #[tokio::test]
    async fn history_success_moves_to_ready() {
        let model = model(5);
        let snapshot = model
            .apply_history(Ok(history(vec![
                event(1, ClaimStatus::Pending),
                event(2, ClaimStatus::Approved),
            ])))
            .await;
        assert_eq!(snapshot.state, ReadModelPhase::Ready);
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.counts.total, 2);
        assert_eq!(snapshot.counts.approved, 1);
        let sequences: Vec<u64> = snapshot.recent.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![2, 1]);
    }

    #[tokio::test]
    async fn empty_history_is_ready_not_degraded() {
        let model = model(5);
        let snapshot = model.apply_history(Ok(ClaimHistory::default())).await;
        assert_eq!(snapshot.state, ReadModelPhase::Ready);
        assert!(snapshot.recent.is_empty());
        assert_eq!(snapshot.counts, StatusCounts::default());
    }

    #[tokio::test]
    async fn history_failure_degrades_with_placeholder() {
        let model = model(5);
        let snapshot = model.apply_history(Err(FetchError::NoSession)).await;
        assert_eq!(snapshot.state, ReadModelPhase::Degraded);
        assert!(snapshot.error.is_some());
        assert_eq!(snapshot.recent.len(), 1);
        assert!(snapshot.recent.iter().all(ClaimEvent::is_placeholder));
        assert_eq!(snapshot.counts.pending, 1);
    }

    #[tokio::test]
    async fn failed_refresh_while_degraded_keeps_live_events() {
        let model = model(5);
        model.apply_history(Err(FetchError::NoSession)).await;
        let live = event(7, ClaimStatus::Pending);
        let claim_id = live.claim_id.clone();
        assert!(model.apply_live(live).await);
        assert!(model.apply_live(event(8, ClaimStatus::Approved)).await);
        let before = model.snapshot().await;
        assert_eq!(before.recent.len(), 3);
        assert_eq!(before.counts.total, 3);

        let after = model.apply_history(Err(FetchError::NoTopic)).await;
        assert_eq!(after.state, ReadModelPhase::Degraded);
        assert_eq!(after.error, Some(FetchError::NoTopic.to_string()));
        assert_eq!(after.recent.len(), 3);
        assert_eq!(after.counts, before.counts);
        assert_eq!(after.high_sequence, 8);
        assert!(model.find(&claim_id).await.is_some());
    }

    #[tokio::test]
    async fn live_events_prepend_and_cap_window() {
        let model = model(3);
        model.apply_history(Ok(ClaimHistory::default())).await;
        for seq in 1..=5 {
            assert!(model.apply_live(event(seq, ClaimStatus::Pending)).await);
        }
        let snapshot = model.snapshot().await;
        let sequences: Vec<u64> = snapshot.recent.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![5, 4, 3]);
        assert_eq!(snapshot.counts.total, 5);
    }

    #[tokio::test]
    async fn incremental_counts_match_full_recompute() {
        let model = model(2);
        model.apply_history(Ok(ClaimHistory::default())).await;
        let mut statuses = Vec::new();
        let mut seq = 0;
        for status in [ClaimStatus::Pending; 4]
            .into_iter()
            .chain([ClaimStatus::Approved; 3])
        {
            seq += 1;
            statuses.push(status);
            model.apply_live(event(seq, status)).await;
        }
        let snapshot = model.snapshot().await;
        assert_eq!(snapshot.counts, StatusCounts::from_statuses(statuses));
        assert_eq!(snapshot.counts.pending, 4);
        assert_eq!(snapshot.counts.approved, 3);
    }

    #[tokio::test]
    async fn events_during_loading_are_buffered_and_deduplicated() {
        let model = model(5);
        assert!(!model.apply_live(event(2, ClaimStatus::Pending)).await);
        assert!(!model.apply_live(event(3, ClaimStatus::Pending)).await);
        assert_eq!(model.snapshot().await.state, ReadModelPhase::Loading);

        let snapshot = model
            .apply_history(Ok(history(vec![
                event(1, ClaimStatus::Pending),
                event(2, ClaimStatus::Pending),
            ])))
            .await;
        let sequences: Vec<u64> = snapshot.recent.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![3, 2, 1]);
        assert_eq!(snapshot.counts.total, 3);
    }

    #[tokio::test]
    async fn stale_live_event_is_ignored() {
        let model = model(5);
        model
            .apply_history(Ok(history(vec![event(4, ClaimStatus::Pending)])))
            .await;
        assert!(!model.apply_live(event(4, ClaimStatus::Pending)).await);
        assert!(!model.apply_live(event(2, ClaimStatus::Pending)).await);
        assert_eq!(model.snapshot().await.counts.total, 1);
    }

    #[tokio::test]
    async fn live_event_is_broadcast() {
        let bus = EventBus::new(16);
        let model = ReadModel::new(5, bus.clone());
        model.apply_history(Ok(ClaimHistory::default())).await;
        let mut rx = bus.subscribe();
        let live = event(1, ClaimStatus::Pending);
        model.apply_live(live.clone()).await;
        let Ok(update) = rx.recv().await else {
            panic!("update expected");
        };
        assert_eq!(update.claim_id(), Some(&live.claim_id));
    }

    #[tokio::test]
    async fn find_returns_latest_for_claim() {
        let model = model(1);
        model.apply_history(Ok(ClaimHistory::default())).await;
        let first = event(1, ClaimStatus::Pending);
        let id = first.claim_id.clone();
        model.apply_live(first).await;
        model.apply_live(event(2, ClaimStatus::Denied)).await;
        let Some(found) = model.find(&id).await else {
            panic!("claim should be tracked beyond the display window");
        };
        assert_eq!(found.sequence, 1);
    }

    #[tokio::test]
    async fn gap_flags_view_and_requests_resync() {
        let model = model(5);
        model.apply_history(Ok(ClaimHistory::default())).await;
        model.on_gap(12).await;

        let snapshot = model.snapshot().await;
        let Some(error) = snapshot.error else {
            panic!("gap should be reported on the snapshot");
        };
        assert!(error.contains("12"));
        assert!(model.wait_for_resync().await);

        model.shutdown();
        assert!(!model.wait_for_resync().await);
    }

    #[tokio::test]
    async fn shutdown_cancels_exactly_once() {
        let (_ledger, session) = ledger_and_session();
        let model = Arc::new(model(5));
        let cancel = ClaimEventLog::new()
            .subscribe(Some(&session), TOPIC, Arc::clone(&model) as Arc<dyn MessageHandler>)
            .await;
        model.attach(cancel.clone());
        assert!(model.shutdown());
        assert!(!model.shutdown());
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn end_to_end_bootstrap_and_live() {
        let (ledger, session) = ledger_and_session();
        let log = ClaimEventLog::new();
        let seeded = ClaimDraft::new(ClaimId::generate(), payload(100.0));
        tokio_test::assert_ok!(log.publish(Some(&session), TOPIC, &seeded).await);

        let model = Arc::new(model(5));
        let cancel = log
            .subscribe(Some(&session), TOPIC, Arc::clone(&model) as Arc<dyn MessageHandler>)
            .await;
        model.attach(cancel);
        let phase = model
            .bootstrap(&HistoryReader::default(), Some(&session), Some(TOPIC))
            .await;
        assert_eq!(phase, ReadModelPhase::Ready);

        let live = ClaimDraft::new(ClaimId::generate(), payload(200.0));
        tokio_test::assert_ok!(log.publish(Some(&session), TOPIC, &live).await);
        tokio_test::assert_ok!(ledger.append_raw(TOPIC, OPERATOR, b"garbage".to_vec()).await);

        let mut found = None;
        for _ in 0..100 {
            found = model.find(&live.claim_id).await;
            if found.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(found.is_some());
        assert_eq!(model.snapshot().await.counts.total, 2);
        assert!(model.shutdown());
    }

    #[tokio::test]
    async fn bootstrap_without_topic_degrades() {
        let model = model(5);
        let phase = model
            .bootstrap(&HistoryReader::default(), None, None)
            .await;
        assert_eq!(phase, ReadModelPhase::Degraded);
    }
}
