//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Ledger options are collected into
//! [`LedgerSettings`] without validation; a missing or malformed ledger
//! option degrades ledger features at session creation instead of aborting
//! startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::ledger::LedgerSettings;
use crate::service::history::{DEFAULT_FETCH_CONCURRENCY, DEFAULT_HISTORY_WINDOW};
use crate::service::read_model::DEFAULT_READ_MODEL_WINDOW;
use crate::service::submission::DEFAULT_MAX_ATTACHMENT_BYTES;
use crate::service::tracker::DEFAULT_RETENTION;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Allowed CORS origin; permissive when unset.
    pub frontend_url: Option<String>,

    /// Log output format.
    pub log_format: LogFormat,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Number of trailing sequence numbers read by a history scan.
    pub history_window: u64,

    /// Maximum concurrent per-sequence fetches during a history scan.
    pub history_fetch_concurrency: usize,

    /// Upper bound on the whole submission workflow.
    pub submission_timeout: Duration,

    /// Number of claims kept in the read model's recent window.
    pub read_model_window: usize,

    /// Per-attachment size cap in bytes.
    pub max_attachment_bytes: u64,

    /// Number of tracked submissions retained.
    pub submission_retention: usize,

    /// Directory attachments are written to.
    pub blob_root: PathBuf,

    /// Public URL prefix under which `blob_root` is served.
    pub blob_public_url: String,

    /// Ledger network, operator and topic options.
    pub ledger: LedgerSettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            frontend_url: None,
            log_format: LogFormat::Pretty,
            event_bus_capacity: 10_000,
            history_window: DEFAULT_HISTORY_WINDOW,
            history_fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            submission_timeout: Duration::from_secs(60),
            read_model_window: DEFAULT_READ_MODEL_WINDOW,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            submission_retention: DEFAULT_RETENTION,
            blob_root: PathBuf::from("./blobs"),
            blob_public_url: "http://localhost:3000/blobs".to_string(),
            ledger: LedgerSettings {
                timeout: Duration::from_secs(30),
                ..LedgerSettings::default()
            },
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or does not parse.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let first = |keys: &[&str]| keys.iter().find_map(|key| get(*key));
        let parse = |key: &str| get(key).and_then(|v| v.trim().parse::<u64>().ok());

        let listen_addr = match get("LISTEN_ADDR") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("LISTEN_ADDR `{raw}` is not a socket address"))?,
            None => defaults.listen_addr,
        };

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            Some(f) if f == "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let ledger_timeout = parse("LEDGER_TIMEOUT_SECS")
            .map_or(defaults.ledger.timeout, Duration::from_secs);

        Ok(Self {
            listen_addr,
            frontend_url: get("FRONTEND_URL"),
            log_format,
            event_bus_capacity: parse_usize(parse("EVENT_BUS_CAPACITY"), defaults.event_bus_capacity),
            history_window: parse("HISTORY_WINDOW").unwrap_or(defaults.history_window),
            history_fetch_concurrency: parse_usize(
                parse("HISTORY_FETCH_CONCURRENCY"),
                defaults.history_fetch_concurrency,
            ),
            submission_timeout: parse("SUBMISSION_TIMEOUT_SECS")
                .map_or(defaults.submission_timeout, Duration::from_secs),
            read_model_window: parse_usize(parse("READ_MODEL_WINDOW"), defaults.read_model_window),
            max_attachment_bytes: parse("MAX_ATTACHMENT_BYTES")
                .unwrap_or(defaults.max_attachment_bytes),
            submission_retention: parse_usize(
                parse("SUBMISSION_RETENTION"),
                defaults.submission_retention,
            ),
            blob_root: get("BLOB_ROOT").map_or(defaults.blob_root, PathBuf::from),
            blob_public_url: get("BLOB_PUBLIC_URL").unwrap_or(defaults.blob_public_url),
            ledger: LedgerSettings {
                network: first(&["HEDERA_NETWORK", "HEDERA_ACCOUNT_NETWORK"]),
                operator_id: first(&["HEDERA_OPERATOR_ID", "HEDERA_ACCOUNT_ID"]),
                operator_key: first(&["HEDERA_OPERATOR_KEY", "HEDERA_ACCOUNT_PRIVATE_KEY"]),
                operator_key_type: get("HEDERA_OPERATOR_KEY_TYPE"),
                max_fee_hbar: get("HEDERA_MAX_FEE_HBAR"),
                topic_id: first(&["HEDERA_TOPIC_ID", "HCS_TOPIC_ID"]),
                timeout: ledger_timeout,
            },
        })
    }
}

fn parse_usize(value: Option<u64>, default: usize) -> usize {
    value
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<GatewayConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let Ok(config) = load(&[]) else {
            panic!("empty environment is valid");
        };
        assert_eq!(config.listen_addr.port(), 3000);
        assert_eq!(config.history_window, 100);
        assert_eq!(config.read_model_window, 5);
        assert_eq!(config.max_attachment_bytes, 20 * 1024 * 1024);
        assert_eq!(config.ledger.timeout, Duration::from_secs(30));
        assert!(config.ledger.network.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn reads_ledger_settings_with_fallback_names() {
        let Ok(config) = load(&[
            ("HEDERA_ACCOUNT_NETWORK", "testnet"),
            ("HEDERA_OPERATOR_ID", "0.0.1001"),
            ("HEDERA_ACCOUNT_ID", "0.0.9"),
            ("HCS_TOPIC_ID", "0.0.5005"),
            ("HEDERA_MAX_FEE_HBAR", "2"),
            ("LEDGER_TIMEOUT_SECS", "7"),
        ]) else {
            panic!("valid environment");
        };
        assert_eq!(config.ledger.network.as_deref(), Some("testnet"));
        assert_eq!(config.ledger.operator_id.as_deref(), Some("0.0.1001"));
        assert_eq!(config.ledger.topic_id.as_deref(), Some("0.0.5005"));
        assert_eq!(config.ledger.timeout, Duration::from_secs(7));
    }

    #[test]
    fn bad_numbers_fall_back_and_bad_addr_fails() {
        let Ok(config) = load(&[("HISTORY_WINDOW", "lots"), ("LOG_FORMAT", "JSON")]) else {
            panic!("valid environment");
        };
        assert_eq!(config.history_window, 100);
        assert_eq!(config.log_format, LogFormat::Json);

        assert!(load(&[("LISTEN_ADDR", "not-an-addr")]).is_err());
    }
}
