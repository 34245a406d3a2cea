//! Ledger client adapter.
//!
//! Everything the claims core needs from the consensus network: entity and
//! transaction identifiers, operator keys, the [`LedgerTransport`] seam, the
//! in-process [`LocalLedger`] and the [`Session`] capability.

pub mod ids;
pub mod key;
pub mod local;
pub mod network;
pub mod session;
pub mod transport;

pub use ids::{AccountId, TopicId, TransactionId};
pub use key::{KeyType, OperatorKey};
pub use local::LocalLedger;
pub use network::{Hbar, Network};
pub use session::{LedgerSettings, Session, SessionCell};
pub use transport::{LedgerTransport, Operator, SubmitReceipt, TopicInfo, TopicMessage};
