//! Ledger entity and transaction identifiers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use utoipa::ToSchema;

use crate::error::LedgerValueError;

/// Parses `<shard>.<realm>.<num>`.
fn parse_triple(s: &str) -> Result<(u64, u64, u64), LedgerValueError> {
    let invalid = || LedgerValueError::EntityId(s.to_string());
    let mut parts = s.trim().split('.');
    let mut next = || -> Result<u64, LedgerValueError> {
        parts
            .next()
            .and_then(|p| p.parse::<u64>().ok())
            .ok_or_else(invalid)
    };
    let triple = (next()?, next()?, next()?);
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(triple)
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            /// Shard number.
            pub shard: u64,
            /// Realm number.
            pub realm: u64,
            /// Entity number.
            pub num: u64,
        }

        impl $name {
            /// Creates an id in shard 0, realm 0.
            #[must_use]
            pub const fn new(num: u64) -> Self {
                Self { shard: 0, realm: 0, num }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
            }
        }

        impl FromStr for $name {
            type Err = LedgerValueError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let (shard, realm, num) = parse_triple(s)?;
                Ok(Self { shard, realm, num })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }
    };
}

entity_id!(
    /// Ledger account, written `0.0.1001`.
    AccountId
);

entity_id!(
    /// Consensus topic (the claims channel), written `0.0.5005`.
    TopicId
);

/// Transaction id in `<payer>@<seconds>.<nanos>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Builds the id of a transaction paid by `payer` and valid from `at`.
    #[must_use]
    pub fn new(payer: AccountId, at: DateTime<Utc>) -> Self {
        Self(format!(
            "{payer}@{}.{:09}",
            at.timestamp(),
            at.timestamp_subsec_nanos()
        ))
    }

    /// Id carried by the degraded-mode placeholder claim.
    #[must_use]
    pub fn placeholder() -> Self {
        Self("0.0.0".to_string())
    }

    /// Returns `true` for [`TransactionId::placeholder`].
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.0 == "0.0.0"
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_and_displays_triples() {
        let Ok(account) = "0.0.1001".parse::<AccountId>() else {
            panic!("valid account");
        };
        assert_eq!(account, AccountId::new(1001));
        assert_eq!(account.to_string(), "0.0.1001");

        let Ok(topic) = " 1.2.3 ".parse::<TopicId>() else {
            panic!("valid topic");
        };
        assert_eq!((topic.shard, topic.realm, topic.num), (1, 2, 3));
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in ["", "0.0", "0.0.1.2", "a.b.c", "0.0.-1", "0..1"] {
            assert!(bad.parse::<AccountId>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn serializes_as_dotted_string() {
        let json = serde_json::to_string(&TopicId::new(5005)).unwrap_or_default();
        assert_eq!(json, "\"0.0.5005\"");
    }

    #[test]
    fn transaction_id_format() {
        let at = Utc.timestamp_opt(1_700_000_000, 42).single();
        let Some(at) = at else {
            panic!("valid timestamp");
        };
        let id = TransactionId::new(AccountId::new(1001), at);
        assert_eq!(id.as_str(), "0.0.1001@1700000000.000000042");
        assert!(!id.is_placeholder());
        assert!(TransactionId::placeholder().is_placeholder());
    }
}
