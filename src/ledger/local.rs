//! In-process consensus ledger.
//!
//! [`LocalLedger`] keeps every topic in memory, assigns dense sequence
//! numbers and strictly increasing consensus timestamps, charges a flat fee
//! per publish and broadcasts appended messages to subscribers. It backs the
//! `local` network and every test in this crate, and exposes fault
//! injection for the degraded and partial-failure paths.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{RwLock, broadcast};

use super::transport::{LedgerTransport, Operator, SubmitReceipt, TopicInfo, TopicMessage};
use super::{AccountId, Hbar, LedgerSettings, Network, TopicId, TransactionId};
use crate::error::TransportError;

/// Flat fee charged for each publish.
pub const SUBMIT_FEE: Hbar = Hbar::from_tinybars(100_000);

/// Fee charged for creating a topic.
pub const CREATE_TOPIC_FEE: Hbar = Hbar::from_tinybars(1_000_000);

/// Balance given to the configured operator account.
pub const OPERATOR_FUNDING: Hbar = Hbar::from_hbars(10_000);

/// Messages buffered per subscriber. A subscriber more than this far
/// behind loses the oldest ones and is told the gap size.
const SUBSCRIBER_CAPACITY: usize = 1024;
const FIRST_ENTITY_NUM: u64 = 5000;

#[derive(Debug)]
struct TopicState {
    messages: Vec<TopicMessage>,
    sender: broadcast::Sender<TopicMessage>,
}

impl TopicState {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            messages: Vec::new(),
            sender,
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    offline: bool,
    metadata_unavailable: bool,
    reject_submits: Option<String>,
    failing_sequences: HashSet<u64>,
    latency: Duration,
}

#[derive(Debug)]
struct LedgerState {
    topics: HashMap<TopicId, TopicState>,
    balances: HashMap<AccountId, u64>,
    next_entity: u64,
    last_timestamp: DateTime<Utc>,
    faults: Faults,
}

impl LedgerState {
    fn online(&self) -> Result<(), TransportError> {
        if self.faults.offline {
            return Err(TransportError::Unavailable("local ledger is offline".to_string()));
        }
        Ok(())
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = if now > self.last_timestamp {
            now
        } else {
            self.last_timestamp + TimeDelta::nanoseconds(1)
        };
        self.last_timestamp = next;
        next
    }

    fn charge(&mut self, account: AccountId, fee: Hbar) -> Result<(), TransportError> {
        let balance = self
            .balances
            .get_mut(&account)
            .ok_or_else(|| TransportError::AccountNotFound(account.to_string()))?;
        *balance = balance
            .checked_sub(fee.tinybars())
            .ok_or_else(|| TransportError::Rejected("INSUFFICIENT_PAYER_BALANCE".to_string()))?;
        Ok(())
    }

    /// Appends to a topic and broadcasts while still holding the write lock,
    /// so subscribers observe sequence order.
    fn append(
        &mut self,
        topic: TopicId,
        payer: AccountId,
        contents: Vec<u8>,
    ) -> Result<TopicMessage, TransportError> {
        if !self.topics.contains_key(&topic) {
            return Err(TransportError::TopicNotFound(topic.to_string()));
        }
        let consensus_timestamp = self.next_timestamp();
        let Some(state) = self.topics.get_mut(&topic) else {
            return Err(TransportError::TopicNotFound(topic.to_string()));
        };
        let sequence = state.messages.len() as u64 + 1;
        let message = TopicMessage {
            topic_id: topic,
            sequence,
            consensus_timestamp,
            transaction_id: TransactionId::new(payer, consensus_timestamp),
            contents,
        };
        state.messages.push(message.clone());
        let _ = state.sender.send(message.clone());
        Ok(message)
    }
}

/// In-memory [`LedgerTransport`].
#[derive(Debug)]
pub struct LocalLedger {
    state: RwLock<LedgerState>,
}

impl Default for LocalLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalLedger {
    /// Creates an empty ledger with no accounts or topics.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState {
                topics: HashMap::new(),
                balances: HashMap::new(),
                next_entity: FIRST_ENTITY_NUM,
                last_timestamp: DateTime::<Utc>::UNIX_EPOCH,
                faults: Faults::default(),
            }),
        }
    }

    /// Creates a ledger pre-seeded from configuration: the operator account
    /// (funded with [`OPERATOR_FUNDING`]) and the claims topic, when their
    /// settings parse.
    #[must_use]
    pub fn for_settings(settings: &LedgerSettings) -> Self {
        let mut ledger = Self::new();
        if let Some(account) = settings
            .operator_id
            .as_deref()
            .and_then(|raw| raw.parse::<AccountId>().ok())
        {
            ledger = ledger.with_account(account, OPERATOR_FUNDING);
        }
        if let Ok(topic) = settings.topic_id() {
            ledger = ledger.with_topic(topic);
        }
        ledger
    }

    /// Adds an empty topic.
    #[must_use]
    pub fn with_topic(mut self, topic: TopicId) -> Self {
        let state = self.state.get_mut();
        state.topics.entry(topic).or_insert_with(TopicState::new);
        state.next_entity = state.next_entity.max(topic.num + 1);
        self
    }

    /// Adds an account with the given balance.
    #[must_use]
    pub fn with_account(mut self, account: AccountId, balance: Hbar) -> Self {
        self.state
            .get_mut()
            .balances
            .insert(account, balance.tinybars());
        self
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.state.get_mut().faults.latency = latency;
        self
    }

    /// Makes every call fail with [`TransportError::Unavailable`].
    pub async fn set_offline(&self, offline: bool) {
        self.state.write().await.faults.offline = offline;
    }

    /// Makes topic metadata queries fail.
    pub async fn set_metadata_unavailable(&self, unavailable: bool) {
        self.state.write().await.faults.metadata_unavailable = unavailable;
    }

    /// Rejects every publish with the given network status, or stops
    /// rejecting when `None`.
    pub async fn reject_submits(&self, status: Option<&str>) {
        self.state.write().await.faults.reject_submits = status.map(str::to_string);
    }

    /// Makes reads of one sequence number fail.
    pub async fn fail_sequence(&self, sequence: u64) {
        self.state.write().await.faults.failing_sequences.insert(sequence);
    }

    /// Changes the per-call delay.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.write().await.faults.latency = latency;
    }

    /// Appends a raw message without fee or signature checks.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::TopicNotFound`] for an unknown topic.
    pub async fn append_raw(
        &self,
        topic: TopicId,
        payer: AccountId,
        contents: Vec<u8>,
    ) -> Result<u64, TransportError> {
        let mut state = self.state.write().await;
        Ok(state.append(topic, payer, contents)?.sequence)
    }

    /// Number of messages stored on a topic (0 when unknown).
    pub async fn message_count(&self, topic: TopicId) -> usize {
        self.state
            .read()
            .await
            .topics
            .get(&topic)
            .map_or(0, |t| t.messages.len())
    }

    async fn delay(&self) {
        let latency = self.state.read().await.faults.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl LedgerTransport for LocalLedger {
    fn network(&self) -> Network {
        Network::Local
    }

    async fn submit_message(
        &self,
        operator: Operator<'_>,
        topic: TopicId,
        contents: Vec<u8>,
        max_fee: Hbar,
    ) -> Result<SubmitReceipt, TransportError> {
        self.delay().await;
        let mut state = self.state.write().await;
        state.online()?;
        if let Some(status) = &state.faults.reject_submits {
            return Err(TransportError::Rejected(status.clone()));
        }
        if !state.topics.contains_key(&topic) {
            return Err(TransportError::TopicNotFound(topic.to_string()));
        }
        if max_fee < SUBMIT_FEE {
            return Err(TransportError::Rejected("INSUFFICIENT_TX_FEE".to_string()));
        }
        state.charge(operator.account_id, SUBMIT_FEE)?;
        let message = state.append(topic, operator.account_id, contents)?;
        Ok(SubmitReceipt {
            transaction_id: message.transaction_id,
            status: "SUCCESS".to_string(),
            sequence: message.sequence,
            consensus_timestamp: message.consensus_timestamp,
        })
    }

    async fn topic_info(&self, topic: TopicId) -> Result<TopicInfo, TransportError> {
        self.delay().await;
        let state = self.state.read().await;
        state.online()?;
        if state.faults.metadata_unavailable {
            return Err(TransportError::Unavailable(format!(
                "metadata for topic {topic} unavailable"
            )));
        }
        let topic_state = state
            .topics
            .get(&topic)
            .ok_or_else(|| TransportError::TopicNotFound(topic.to_string()))?;
        Ok(TopicInfo {
            topic_id: topic,
            sequence_number: topic_state.messages.len() as u64,
        })
    }

    async fn message_at(
        &self,
        topic: TopicId,
        sequence: u64,
    ) -> Result<TopicMessage, TransportError> {
        self.delay().await;
        let state = self.state.read().await;
        state.online()?;
        if state.faults.failing_sequences.contains(&sequence) {
            return Err(TransportError::Unavailable(format!(
                "mirror node could not serve sequence {sequence}"
            )));
        }
        let topic_state = state
            .topics
            .get(&topic)
            .ok_or_else(|| TransportError::TopicNotFound(topic.to_string()))?;
        sequence
            .checked_sub(1)
            .and_then(|idx| usize::try_from(idx).ok())
            .and_then(|idx| topic_state.messages.get(idx))
            .cloned()
            .ok_or(TransportError::MessageNotFound(sequence))
    }

    async fn subscribe(
        &self,
        topic: TopicId,
    ) -> Result<broadcast::Receiver<TopicMessage>, TransportError> {
        let state = self.state.read().await;
        state.online()?;
        state
            .topics
            .get(&topic)
            .map(|t| t.sender.subscribe())
            .ok_or_else(|| TransportError::TopicNotFound(topic.to_string()))
    }

    async fn create_topic(&self, operator: Operator<'_>) -> Result<TopicId, TransportError> {
        self.delay().await;
        let mut state = self.state.write().await;
        state.online()?;
        state.charge(operator.account_id, CREATE_TOPIC_FEE)?;
        let topic = TopicId::new(state.next_entity);
        state.next_entity += 1;
        state.topics.insert(topic, TopicState::new());
        Ok(topic)
    }

    async fn account_balance(&self, account: AccountId) -> Result<Hbar, TransportError> {
        self.delay().await;
        let state = self.state.read().await;
        state.online()?;
        state
            .balances
            .get(&account)
            .copied()
            .map(Hbar::from_tinybars)
            .ok_or_else(|| TransportError::AccountNotFound(account.to_string()))
    }

    async fn ping(&self) -> Result<Duration, TransportError> {
        let started = Instant::now();
        self.delay().await;
        self.state.read().await.online()?;
        Ok(started.elapsed())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::ledger::OperatorKey;

    const KEY: &str = "0101010101010101010101010101010101010101010101010101010101010101";

    fn key() -> OperatorKey {
        let Ok(key) = OperatorKey::parse(KEY, None) else {
            panic!("valid key");
        };
        key
    }

    fn ledger() -> LocalLedger {
        LocalLedger::new()
            .with_account(AccountId::new(1001), Hbar::from_hbars(10))
            .with_topic(TopicId::new(5005))
    }

    #[tokio::test]
    async fn submit_assigns_dense_sequences_and_increasing_timestamps() {
        let ledger = ledger();
        let key = key();
        let operator = Operator {
            account_id: AccountId::new(1001),
            key: &key,
        };
        let mut last = None;
        for expected in 1..=3u64 {
            let result = ledger
                .submit_message(operator, TopicId::new(5005), b"{}".to_vec(), Hbar::from_hbars(2))
                .await;
            let Ok(receipt) = result else {
                panic!("submit failed: {result:?}");
            };
            assert_eq!(receipt.sequence, expected);
            assert_eq!(receipt.status, "SUCCESS");
            assert!(receipt.transaction_id.as_str().starts_with("0.0.1001@"));
            if let Some(prev) = last {
                assert!(receipt.consensus_timestamp > prev);
            }
            last = Some(receipt.consensus_timestamp);
        }
        let info = tokio_test::assert_ok!(ledger.topic_info(TopicId::new(5005)).await);
        assert_eq!(info.sequence_number, 3);
    }

    #[tokio::test]
    async fn submit_charges_fee_and_rejects_low_ceiling() {
        let ledger = ledger();
        let key = key();
        let operator = Operator {
            account_id: AccountId::new(1001),
            key: &key,
        };
        let low = ledger
            .submit_message(operator, TopicId::new(5005), Vec::new(), Hbar::from_tinybars(1))
            .await;
        assert_eq!(
            low.err(),
            Some(TransportError::Rejected("INSUFFICIENT_TX_FEE".to_string()))
        );

        tokio_test::assert_ok!(
            ledger
                .submit_message(operator, TopicId::new(5005), Vec::new(), Hbar::from_hbars(1))
                .await
        );
        let balance = tokio_test::assert_ok!(ledger.account_balance(AccountId::new(1001)).await);
        assert_eq!(
            balance.tinybars(),
            Hbar::from_hbars(10).tinybars() - SUBMIT_FEE.tinybars()
        );
    }

    #[tokio::test]
    async fn subscribers_see_messages_in_order() {
        let ledger = ledger();
        let Ok(mut rx) = ledger.subscribe(TopicId::new(5005)).await else {
            panic!("subscribe failed");
        };
        for body in [b"a".to_vec(), b"b".to_vec()] {
            tokio_test::assert_ok!(
                ledger
                    .append_raw(TopicId::new(5005), AccountId::new(1001), body)
                    .await
            );
        }
        let Ok(first) = rx.recv().await else {
            panic!("first message missing");
        };
        let Ok(second) = rx.recv().await else {
            panic!("second message missing");
        };
        assert_eq!((first.sequence, second.sequence), (1, 2));
        assert_eq!(second.contents, b"b");
    }

    #[tokio::test]
    async fn faults_are_reported() {
        let ledger = ledger();
        tokio_test::assert_ok!(
            ledger
                .append_raw(TopicId::new(5005), AccountId::new(1001), b"x".to_vec())
                .await
        );

        ledger.fail_sequence(1).await;
        assert!(matches!(
            ledger.message_at(TopicId::new(5005), 1).await,
            Err(TransportError::Unavailable(_))
        ));
        assert_eq!(
            ledger.message_at(TopicId::new(5005), 2).await.err(),
            Some(TransportError::MessageNotFound(2))
        );

        ledger.set_metadata_unavailable(true).await;
        assert!(ledger.topic_info(TopicId::new(5005)).await.is_err());

        ledger.set_offline(true).await;
        assert!(ledger.ping().await.is_err());
    }

    #[tokio::test]
    async fn create_topic_allocates_fresh_ids() {
        let ledger = ledger();
        let key = key();
        let operator = Operator {
            account_id: AccountId::new(1001),
            key: &key,
        };
        let first = tokio_test::assert_ok!(ledger.create_topic(operator).await);
        let second = tokio_test::assert_ok!(ledger.create_topic(operator).await);
        assert_ne!(first, second);
        assert!(first.num > 5005);
        assert_eq!(ledger.message_count(first).await, 0);
    }
}
