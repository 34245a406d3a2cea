//! Network selection and hbar amounts.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::LedgerValueError;

/// Tinybars per hbar.
pub const TINYBARS_PER_HBAR: u64 = 100_000_000;

/// Ledger network the operator account lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    Mainnet,
    /// Public test network.
    Testnet,
    /// Preview network.
    Previewnet,
    /// Single-node development network.
    Local,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Previewnet => "previewnet",
            Self::Local => "local",
        })
    }
}

impl FromStr for Network {
    type Err = LedgerValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "previewnet" => Ok(Self::Previewnet),
            "local" | "local-node" | "localnode" => Ok(Self::Local),
            _ => Err(LedgerValueError::Network(s.to_string())),
        }
    }
}

/// A non-negative hbar amount, stored in tinybars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Hbar {
    tinybars: u64,
}

impl Hbar {
    /// Creates an amount from tinybars.
    #[must_use]
    pub const fn from_tinybars(tinybars: u64) -> Self {
        Self { tinybars }
    }

    /// Creates an amount from whole hbars, saturating on overflow.
    #[must_use]
    pub const fn from_hbars(hbars: u64) -> Self {
        Self {
            tinybars: hbars.saturating_mul(TINYBARS_PER_HBAR),
        }
    }

    /// Returns the amount in tinybars.
    #[must_use]
    pub const fn tinybars(&self) -> u64 {
        self.tinybars
    }

    /// Returns `true` for a zero amount.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.tinybars == 0
    }
}

impl fmt::Display for Hbar {
    /// Formats as `<whole>.<fraction> ℏ` with trailing zeros trimmed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.tinybars / TINYBARS_PER_HBAR;
        let frac = self.tinybars % TINYBARS_PER_HBAR;
        if frac == 0 {
            write!(f, "{whole} ℏ")
        } else {
            let digits = format!("{frac:08}");
            write!(f, "{whole}.{} ℏ", digits.trim_end_matches('0'))
        }
    }
}

impl FromStr for Hbar {
    type Err = LedgerValueError;

    /// Parses a decimal hbar amount such as `2`, `0.5` or `1.00000001`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerValueError::Hbar(s.to_string());
        let trimmed = s.trim();
        let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > 8
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac: u64 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<8}").parse().map_err(|_| invalid())?
        };
        whole
            .checked_mul(TINYBARS_PER_HBAR)
            .and_then(|t| t.checked_add(frac))
            .map(Self::from_tinybars)
            .ok_or_else(invalid)
    }
}
