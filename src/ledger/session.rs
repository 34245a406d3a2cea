//! Ledger session: validated operator credentials bound to a transport.
//!
//! A [`Session`] is the capability every ledger operation requires. It is
//! created once from [`LedgerSettings`] and shared read-only through a
//! [`SessionCell`]; when creation fails the cell records why and callers see
//! `None`, which every downstream component treats as degraded mode.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use super::transport::{LedgerTransport, Operator};
use super::{AccountId, Hbar, KeyType, LocalLedger, Network, OperatorKey, TopicId};
use crate::error::{ConfigurationError, LedgerValueError, TransportError};

/// Raw ledger options as read from the environment.
///
/// Every field is optional at load time; [`Session::create`] decides whether
/// the combination is usable.
#[derive(Clone, Default)]
pub struct LedgerSettings {
    /// `HEDERA_NETWORK`.
    pub network: Option<String>,
    /// `HEDERA_OPERATOR_ID`.
    pub operator_id: Option<String>,
    /// `HEDERA_OPERATOR_KEY`.
    pub operator_key: Option<String>,
    /// `HEDERA_OPERATOR_KEY_TYPE`.
    pub operator_key_type: Option<String>,
    /// `HEDERA_MAX_FEE_HBAR`.
    pub max_fee_hbar: Option<String>,
    /// `HEDERA_TOPIC_ID`.
    pub topic_id: Option<String>,
    /// Upper bound on any single ledger call.
    pub timeout: Duration,
}

impl LedgerSettings {
    /// Parses the configured claims topic.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the topic id is absent or malformed.
    pub fn topic_id(&self) -> Result<TopicId, ConfigurationError> {
        required(self.topic_id.as_deref(), "HEDERA_TOPIC_ID")?
            .parse()
            .map_err(|source| ConfigurationError::Invalid {
                field: "HEDERA_TOPIC_ID",
                source,
            })
    }
}

impl fmt::Debug for LedgerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerSettings")
            .field("network", &self.network)
            .field("operator_id", &self.operator_id)
            .field("operator_key", &self.operator_key.as_ref().map(|_| "<redacted>"))
            .field("operator_key_type", &self.operator_key_type)
            .field("max_fee_hbar", &self.max_fee_hbar)
            .field("topic_id", &self.topic_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn required<'a>(
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, ConfigurationError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigurationError::Missing(field))
}

fn parse_network(settings: &LedgerSettings) -> Result<Network, ConfigurationError> {
    required(settings.network.as_deref(), "HEDERA_NETWORK")?
        .parse()
        .map_err(|source| ConfigurationError::Invalid {
            field: "HEDERA_NETWORK",
            source,
        })
}

/// An authenticated handle on the ledger network.
#[derive(Debug)]
pub struct Session {
    network: Network,
    operator_id: AccountId,
    operator_key: OperatorKey,
    max_fee: Hbar,
    timeout: Duration,
    transport: Arc<dyn LedgerTransport>,
}

impl Session {
    /// Validates `settings` and binds them to `transport`.
    ///
    /// No network call is made.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the network, operator id, operator
    /// key or fee ceiling is missing or malformed, or if `transport` serves
    /// a different network than the one selected.
    pub fn create(
        settings: &LedgerSettings,
        transport: Arc<dyn LedgerTransport>,
    ) -> Result<Self, ConfigurationError> {
        let invalid = |field: &'static str| {
            move |source: LedgerValueError| ConfigurationError::Invalid { field, source }
        };

        let network = parse_network(settings)?;
        if transport.network() != network {
            return Err(ConfigurationError::NetworkMismatch {
                configured: network,
                transport: transport.network(),
            });
        }
        let operator_id: AccountId =
            required(settings.operator_id.as_deref(), "HEDERA_OPERATOR_ID")?
                .parse()
                .map_err(invalid("HEDERA_OPERATOR_ID"))?;
        let key_hint = settings
            .operator_key_type
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::parse::<KeyType>)
            .transpose()
            .map_err(invalid("HEDERA_OPERATOR_KEY_TYPE"))?;
        let operator_key = OperatorKey::parse(
            required(settings.operator_key.as_deref(), "HEDERA_OPERATOR_KEY")?,
            key_hint,
        )
        .map_err(invalid("HEDERA_OPERATOR_KEY"))?;
        let max_fee: Hbar = required(settings.max_fee_hbar.as_deref(), "HEDERA_MAX_FEE_HBAR")?
            .parse()
            .map_err(invalid("HEDERA_MAX_FEE_HBAR"))?;
        if max_fee.is_zero() {
            return Err(ConfigurationError::ZeroFeeCeiling);
        }

        Ok(Self {
            network,
            operator_id,
            operator_key,
            max_fee,
            timeout: settings.timeout,
            transport,
        })
    }

    /// Builds the transport for the selected network and creates a session
    /// on it.
    ///
    /// Only the in-process `local` network has a transport; any other
    /// selector is refused so the gateway runs degraded rather than
    /// serving a public network from memory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnsupportedNetwork`] for networks
    /// without a transport, or any error from [`Session::create`].
    pub fn connect(settings: &LedgerSettings) -> Result<Self, ConfigurationError> {
        match parse_network(settings)? {
            Network::Local => {
                let transport: Arc<dyn LedgerTransport> =
                    Arc::new(LocalLedger::for_settings(settings));
                Self::create(settings, transport)
            }
            other => Err(ConfigurationError::UnsupportedNetwork(other)),
        }
    }

    /// Network the session talks to.
    #[must_use]
    pub const fn network(&self) -> Network {
        self.network
    }

    /// Paying operator account.
    #[must_use]
    pub const fn operator_id(&self) -> AccountId {
        self.operator_id
    }

    /// Signature scheme of the operator key.
    #[must_use]
    pub const fn key_type(&self) -> KeyType {
        self.operator_key.key_type()
    }

    /// Default fee ceiling for publishes.
    #[must_use]
    pub const fn max_fee(&self) -> Hbar {
        self.max_fee
    }

    /// Operator credentials for paid calls.
    #[must_use]
    pub const fn operator(&self) -> Operator<'_> {
        Operator {
            account_id: self.operator_id,
            key: &self.operator_key,
        }
    }

    /// Underlying transport.
    #[must_use]
    pub fn transport(&self) -> &dyn LedgerTransport {
        self.transport.as_ref()
    }

    /// Runs a transport call under the session timeout.
    ///
    /// # Errors
    ///
    /// Returns the call's own error, or [`TransportError::Timeout`] when it
    /// does not finish in time.
    pub async fn call<T, F>(&self, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        if self.timeout.is_zero() {
            return fut.await;
        }
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
    }
}

#[derive(Debug)]
enum Slot {
    Active(Arc<Session>),
    Unavailable(String),
}

/// Holder of the single process-wide session.
///
/// Re-creating a session replaces the previous one; holders of the old
/// `Arc<Session>` finish their in-flight calls with it.
#[derive(Debug)]
pub struct SessionCell {
    slot: RwLock<Slot>,
}

impl SessionCell {
    /// Creates a cell holding `session`.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            slot: RwLock::new(Slot::Active(Arc::new(session))),
        }
    }

    /// Creates a cell with no session.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            slot: RwLock::new(Slot::Unavailable(reason.into())),
        }
    }

    /// Builds a cell from the outcome of [`Session::create`].
    #[must_use]
    pub fn from_result(result: Result<Session, ConfigurationError>) -> Self {
        match result {
            Ok(session) => Self::new(session),
            Err(err) => Self::unavailable(err.to_string()),
        }
    }

    /// Returns the active session, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<Session>> {
        match &*self.slot.read().unwrap_or_else(PoisonError::into_inner) {
            Slot::Active(session) => Some(Arc::clone(session)),
            Slot::Unavailable(_) => None,
        }
    }

    /// Installs a new session.
    pub fn replace(&self, session: Session) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) =
            Slot::Active(Arc::new(session));
    }

    /// Drops the active session.
    pub fn mark_unavailable(&self, reason: impl Into<String>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) =
            Slot::Unavailable(reason.into());
    }

    /// Why no session is available; `None` when one is.
    #[must_use]
    pub fn unavailable_reason(&self) -> Option<String> {
        match &*self.slot.read().unwrap_or_else(PoisonError::into_inner) {
            Slot::Active(_) => None,
            Slot::Unavailable(reason) => Some(reason.clone()),
        }
    }
}
