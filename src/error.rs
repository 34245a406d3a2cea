//! Gateway error types with HTTP status code mapping.
//!
//! The claims core reports failures through small, purpose-specific enums:
//! [`ConfigurationError`] for ledger session setup, [`TransportError`] for
//! calls into the ledger network, [`PublishError`], [`FetchError`] and
//! [`DecodeError`] for the event log, [`BlobError`] for attachment storage and
//! [`SubmissionError`] for the submission workflow.
//!
//! [`GatewayError`] is the central HTTP-facing error. Each variant maps to a
//! specific HTTP status code and structured JSON error response.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::AttachmentKind;
use crate::ledger::Network;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1002,
///     "message": "claim validation failed: 1 field error(s)",
///     "details": [{ "field": "amount", "message": "must be greater than zero" }]
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see the code table on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Per-field validation errors, when the request failed validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// A single validation failure on a named claim form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    /// Wire name of the offending field (e.g. `"policyNumber"`).
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldError {
    /// Creates a field error.
    #[must_use]
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// A claim identifier that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimIdError {
    /// Blank identifier.
    #[error("claim id must not be empty")]
    Empty,
    /// Longer than [`crate::domain::claim_id::MAX_CLAIM_ID_LEN`].
    #[error("claim id is {0} characters long")]
    TooLong(usize),
    /// Contains whitespace, control or path characters.
    #[error("claim id contains invalid character {0:?}")]
    InvalidChar(char),
}

/// A ledger value (entity id, key, network, fee) that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerValueError {
    /// Not a `<shard>.<realm>.<num>` triple.
    #[error("expected <shard>.<realm>.<num>, got `{0}`")]
    EntityId(String),
    /// Unknown network selector.
    #[error("unknown network `{0}`")]
    Network(String),
    /// Not a non-negative hbar amount with at most 8 decimals.
    #[error("invalid hbar amount `{0}`")]
    Hbar(String),
    /// Key material is not hexadecimal.
    #[error("key material is not hex encoded")]
    KeyEncoding,
    /// Key material has the wrong length.
    #[error("expected 32 private key bytes, got {0}")]
    KeyLength(usize),
    /// Unknown key type name.
    #[error("unknown key type `{0}`")]
    KeyType(String),
    /// DER prefix disagrees with the configured key type.
    #[error("key is {actual} but {expected} was configured")]
    KeyTypeMismatch {
        /// Type configured via the key type setting.
        expected: String,
        /// Type detected from the DER prefix.
        actual: String,
    },
}

/// Ledger session could not be created from configuration.
///
/// Fatal to ledger features only; the process keeps serving in degraded mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// A required ledger setting is absent.
    #[error("missing ledger setting {0}")]
    Missing(&'static str),
    /// A ledger setting is present but malformed.
    #[error("invalid ledger setting {field}: {source}")]
    Invalid {
        /// Environment variable name of the setting.
        field: &'static str,
        /// Parse failure.
        #[source]
        source: LedgerValueError,
    },
    /// The fee ceiling must allow at least one tinybar.
    #[error("ledger fee ceiling must be greater than zero")]
    ZeroFeeCeiling,
    /// No transport is available for the selected network.
    #[error("no ledger transport available for network {0}")]
    UnsupportedNetwork(Network),
    /// The transport serves a different network than the one configured.
    #[error("ledger transport serves {transport}, but HEDERA_NETWORK is {configured}")]
    NetworkMismatch {
        /// Network from the settings.
        configured: Network,
        /// Network the transport is connected to.
        transport: Network,
    },
}

/// Failure of a single call into the ledger network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The topic does not exist on the network.
    #[error("topic {0} not found")]
    TopicNotFound(String),
    /// The account does not exist on the network.
    #[error("account {0} not found")]
    AccountNotFound(String),
    /// No message is stored at the requested sequence number.
    #[error("no message at sequence {0}")]
    MessageNotFound(u64),
    /// The network or the operator rejected the transaction.
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// The network could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    /// The call did not finish within the session timeout.
    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),
}

/// A claim could not be appended to the event log.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// No ledger session is available.
    #[error("ledger session not initialized")]
    NoSession,
    /// No claims topic is configured.
    #[error("claims topic not configured")]
    NoTopic,
    /// The encoded claim exceeds the transport message limit.
    #[error("claim payload is {size} bytes; the transport limit is {limit}")]
    PayloadTooLarge {
        /// Encoded payload size.
        size: usize,
        /// Transport limit.
        limit: usize,
    },
    /// The claim could not be encoded.
    #[error("claim could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    /// The network or operator rejected the publish.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Claim history could not be read.
///
/// Per-sequence failures are absorbed by the history reader; only failures
/// that prevent the scan from starting surface as this error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// No ledger session is available.
    #[error("ledger session not initialized")]
    NoSession,
    /// No claims topic is configured.
    #[error("claims topic not configured")]
    NoTopic,
    /// The topic metadata query failed.
    #[error("could not read topic metadata: {0}")]
    Metadata(#[source] TransportError),
}

/// A log message body that claims to be a claim but does not decode.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Not JSON, or the claim fields do not match the expected shape.
    #[error("malformed claim message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Attachment storage failure.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// Filesystem failure.
    #[error("blob io: {0}")]
    Io(#[from] std::io::Error),
    /// Path escapes the store or has no file name.
    #[error("invalid blob path `{0}`")]
    InvalidPath(String),
    /// The store refused the upload.
    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// Stage of the submission workflow at which a submission failed.
///
/// Serialized as its display text (`validation`, `photo upload`, `publish`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    /// Field or attachment validation, before any network call.
    Validation,
    /// Uploading the attachment of the given kind.
    Upload(AttachmentKind),
    /// Appending the claim to the event log.
    Publish,
}

impl Serialize for SubmissionStage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl std::fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Upload(kind) => write!(f, "{kind} upload"),
            Self::Publish => write!(f, "publish"),
        }
    }
}

/// A claim submission failed. Nothing was written to the event log.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// One or more form fields are invalid.
    #[error("claim validation failed: {} field error(s)", .0.len())]
    Validation(Vec<FieldError>),
    /// An attachment exceeds the size cap.
    #[error("{kind} attachment is {size} bytes; the limit is {limit}")]
    AttachmentTooLarge {
        /// Attachment slot.
        kind: AttachmentKind,
        /// Attachment size in bytes.
        size: u64,
        /// Configured cap in bytes.
        limit: u64,
    },
    /// Uploading an attachment to the blob store failed.
    #[error("{kind} upload failed: {source}")]
    Upload {
        /// Attachment slot.
        kind: AttachmentKind,
        /// Store failure.
        #[source]
        source: BlobError,
    },
    /// Publishing the claim to the event log failed.
    #[error("claim publish failed: {0}")]
    Publish(#[from] PublishError),
}

impl SubmissionError {
    /// Returns the workflow stage that failed.
    #[must_use]
    pub const fn stage(&self) -> SubmissionStage {
        match self {
            Self::Validation(_) | Self::AttachmentTooLarge { .. } => SubmissionStage::Validation,
            Self::Upload { kind, .. } => SubmissionStage::Upload(*kind),
            Self::Publish(_) => SubmissionStage::Publish,
        }
    }
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                         |
/// |-----------|-----------------|-------------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request / 413 Payload Too Large |
/// | 2000–2999 | Not Found       | 404 Not Found                       |
/// | 3000–3999 | Server          | 500 Internal Server Error           |
/// | 5000–5999 | Ledger          | 503 Service Unavailable / 502 Bad Gateway |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request could not be parsed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Claim form failed field validation.
    #[error("claim validation failed: {} field error(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// Request body or attachment is too large.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// No claim with the given id is known.
    #[error("claim not found: {0}")]
    ClaimNotFound(String),

    /// No submission with the given correlation id is tracked.
    #[error("submission not found: {0}")]
    SubmissionNotFound(String),

    /// Ledger features are unavailable (degraded mode or unreachable network).
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// The ledger rejected the operation.
    #[error("ledger rejected the request: {0}")]
    LedgerRejected(String),

    /// Attachment storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Validation(_) => 1002,
            Self::PayloadTooLarge(_) => 1003,
            Self::ClaimNotFound(_) => 2001,
            Self::SubmissionNotFound(_) => 2002,
            Self::Internal(_) => 3000,
            Self::Storage(_) => 3001,
            Self::LedgerUnavailable(_) => 5001,
            Self::LedgerRejected(_) => 5002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ClaimNotFound(_) | Self::SubmissionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::LedgerRejected(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<TransportError> for GatewayError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rejected(_) => Self::LedgerRejected(err.to_string()),
            _ => Self::LedgerUnavailable(err.to_string()),
        }
    }
}

impl From<PublishError> for GatewayError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::NoSession | PublishError::NoTopic => {
                Self::LedgerUnavailable(err.to_string())
            }
            PublishError::PayloadTooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            PublishError::Encode(_) => Self::Internal(err.to_string()),
            PublishError::Transport(inner) => inner.into(),
        }
    }
}

impl From<FetchError> for GatewayError {
    fn from(err: FetchError) -> Self {
        Self::LedgerUnavailable(err.to_string())
    }
}

impl From<SubmissionError> for GatewayError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Validation(fields) => Self::Validation(fields),
            SubmissionError::AttachmentTooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            SubmissionError::Upload { .. } => Self::Storage(err.to_string()),
            SubmissionError::Publish(inner) => inner.into(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();
        let details = match self {
            Self::Validation(fields) => Some(fields),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message,
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
