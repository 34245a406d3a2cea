//! Operator private keys.
//!
//! Keys are accepted as hex, either raw 32-byte scalars or DER-encoded
//! PKCS#8 blobs. The DER prefix identifies the curve; a raw key falls back to
//! the configured type (ED25519 when none is given).

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::LedgerValueError;

const ED25519_DER_PREFIX: &str = "302e020100300506032b657004220420";
const ECDSA_SECP256K1_DER_PREFIX: &str = "3030020100300706052b8104000a04220420";
const KEY_LEN: usize = 32;

/// Signature scheme of an operator key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum KeyType {
    /// Ed25519.
    #[serde(rename = "ED25519")]
    Ed25519,
    /// ECDSA over secp256k1.
    #[serde(rename = "ECDSA_SECP256K1")]
    EcdsaSecp256k1,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ed25519 => "ED25519",
            Self::EcdsaSecp256k1 => "ECDSA_SECP256K1",
        })
    }
}

impl FromStr for KeyType {
    type Err = LedgerValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ED25519" => Ok(Self::Ed25519),
            "ECDSA" | "ECDSA_SECP256K1" | "SECP256K1" => Ok(Self::EcdsaSecp256k1),
            _ => Err(LedgerValueError::KeyType(s.to_string())),
        }
    }
}

/// Private key used to sign publishes on behalf of the operator account.
#[derive(Clone, PartialEq, Eq)]
pub struct OperatorKey {
    key_type: KeyType,
    bytes: [u8; KEY_LEN],
}

impl OperatorKey {
    /// Parses hex key material.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerValueError`] if the material is not hex, is not
    /// 32 bytes after the DER prefix, or its DER prefix contradicts `hint`.
    pub fn parse(raw: &str, hint: Option<KeyType>) -> Result<Self, LedgerValueError> {
        let trimmed = raw.trim();
        let hex_str = trimmed
            .strip_prefix("0x")
            .unwrap_or(trimmed)
            .to_ascii_lowercase();

        let (detected, body) = if let Some(rest) = hex_str.strip_prefix(ED25519_DER_PREFIX) {
            (Some(KeyType::Ed25519), rest)
        } else if let Some(rest) = hex_str.strip_prefix(ECDSA_SECP256K1_DER_PREFIX) {
            (Some(KeyType::EcdsaSecp256k1), rest)
        } else {
            (None, hex_str.as_str())
        };

        let key_type = match (detected, hint) {
            (Some(actual), Some(expected)) if actual != expected => {
                return Err(LedgerValueError::KeyTypeMismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
            (Some(actual), _) => actual,
            (None, hint) => hint.unwrap_or(KeyType::Ed25519),
        };

        let decoded = hex::decode(body).map_err(|_| LedgerValueError::KeyEncoding)?;
        let bytes: [u8; KEY_LEN] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| LedgerValueError::KeyLength(decoded.len()))?;

        Ok(Self { key_type, bytes })
    }

    /// Returns the signature scheme.
    #[must_use]
    pub const fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Returns the raw private scalar.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for OperatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorKey")
            .field("key_type", &self.key_type)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const RAW: &str = "0101010101010101010101010101010101010101010101010101010101010101";

    #[test]
    fn raw_key_defaults_to_ed25519() {
        let Ok(key) = OperatorKey::parse(RAW, None) else {
            panic!("valid raw key");
        };
        assert_eq!(key.key_type(), KeyType::Ed25519);
        assert_eq!(key.as_bytes(), &[1u8; 32]);
    }

    #[test]
    fn raw_key_follows_hint() {
        let Ok(key) = OperatorKey::parse(&format!("0x{RAW}"), Some(KeyType::EcdsaSecp256k1))
        else {
            panic!("valid raw key");
        };
        assert_eq!(key.key_type(), KeyType::EcdsaSecp256k1);
    }

    #[test]
    fn der_prefix_selects_curve() {
        let der = format!("{ECDSA_SECP256K1_DER_PREFIX}{RAW}");
        let Ok(key) = OperatorKey::parse(&der, None) else {
            panic!("valid der key");
        };
        assert_eq!(key.key_type(), KeyType::EcdsaSecp256k1);

        let der = format!("{ED25519_DER_PREFIX}{RAW}");
        assert_eq!(
            OperatorKey::parse(&der, Some(KeyType::EcdsaSecp256k1)),
            Err(LedgerValueError::KeyTypeMismatch {
                expected: "ECDSA_SECP256K1".to_string(),
                actual: "ED25519".to_string(),
            })
        );
    }

    #[test]
    fn rejects_bad_material() {
        assert_eq!(
            OperatorKey::parse("zz", None),
            Err(LedgerValueError::KeyEncoding)
        );
        assert_eq!(
            OperatorKey::parse("abcd", None),
            Err(LedgerValueError::KeyLength(2))
        );
    }

    #[test]
    fn debug_redacts_bytes() {
        let Ok(key) = OperatorKey::parse(RAW, None) else {
            panic!("valid raw key");
        };
        let debug = format!("{key:?}");
        assert!(debug.contains("redacted"));
        assert!(!debug.contains("0101"));
    }

    #[test]
    fn key_type_names() {
        assert_eq!("ecdsa".parse::<KeyType>(), Ok(KeyType::EcdsaSecp256k1));
        assert_eq!("ed25519".parse::<KeyType>(), Ok(KeyType::Ed25519));
        assert!("rsa".parse::<KeyType>().is_err());
    }
}
