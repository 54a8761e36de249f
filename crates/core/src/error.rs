//! Error types for the transaction runtime
//!
//! We use `thiserror` for automatic `Display` and `Error` implementations.
//!
//! ## Error Model
//!
//! `TxError` is the unified error type for every public API. Each variant
//! maps to one machine-readable `ErrorKind` code:
//!
//! | Kind | Description |
//! |------|-------------|
//! | Parse | Malformed serialized expression |
//! | Type | An operation received a value it cannot use |
//! | InvariantViolation | Reserved character or empty user key |
//! | BackendTransient | Retryable backend failure (network, timeout) |
//! | BackendFatal | Non-retryable backend failure (auth, schema) |
//! | RetriesExhausted | The backoff schedule ran out |
//!
//! ## Classification
//!
//! - Pure evaluation never errors: division by zero, NaN, and regex
//!   failures produce sentinel literals, and reading a never-written key
//!   yields `none`.
//! - Commit conflicts are not errors — the database retries them.
//! - Only `BackendTransient` is retryable by the backoff schedule; fatals
//!   surface immediately.

use crate::key::KeyError;
use thiserror::Error;

/// Result type alias for runtime operations.
pub type TxResult<T> = std::result::Result<T, TxError>;

/// Machine-readable error codes.
///
/// These are the stable classification of every `TxError` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed serialized expression
    Parse,
    /// Impossible coercion or misuse of a typed operation
    Type,
    /// Reserved character or empty user key
    InvariantViolation,
    /// Retryable backend failure
    BackendTransient,
    /// Non-retryable backend failure
    BackendFatal,
    /// The backoff schedule ran out
    RetriesExhausted,
}

impl ErrorKind {
    /// Canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "Parse",
            ErrorKind::Type => "Type",
            ErrorKind::InvariantViolation => "InvariantViolation",
            ErrorKind::BackendTransient => "BackendTransient",
            ErrorKind::BackendFatal => "BackendFatal",
            ErrorKind::RetriesExhausted => "RetriesExhausted",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the transaction runtime.
#[derive(Debug, Error)]
pub enum TxError {
    /// Malformed serialized expression
    #[error("parse error: {message}")]
    Parse {
        /// What went wrong during decoding
        message: String,
    },

    /// Impossible coercion or misuse of a typed operation
    #[error("type error: {message}")]
    Type {
        /// What went wrong
        message: String,
    },

    /// Reserved character or empty user key
    #[error("invariant violation: {0}")]
    InvalidKey(#[from] KeyError),

    /// Retryable backend failure
    ///
    /// The backoff schedule retries these; everything else surfaces
    /// immediately.
    #[error("transient backend failure: {message}")]
    BackendTransient {
        /// Backend-provided description
        message: String,
    },

    /// Non-retryable backend failure
    #[error("fatal backend failure: {message}")]
    BackendFatal {
        /// Backend-provided description
        message: String,
    },

    /// The backoff schedule ran out
    #[error("retries exhausted after {attempts} attempt(s)")]
    RetriesExhausted {
        /// How many retries were scheduled
        attempts: usize,
        /// The last failure observed
        #[source]
        source: Box<TxError>,
    },
}

impl TxError {
    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        TxError::Parse {
            message: message.into(),
        }
    }

    /// Create a type error.
    pub fn type_error(message: impl Into<String>) -> Self {
        TxError::Type {
            message: message.into(),
        }
    }

    /// Create a transient backend error.
    pub fn transient(message: impl Into<String>) -> Self {
        TxError::BackendTransient {
            message: message.into(),
        }
    }

    /// Create a fatal backend error.
    pub fn fatal(message: impl Into<String>) -> Self {
        TxError::BackendFatal {
            message: message.into(),
        }
    }

    /// The machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TxError::Parse { .. } => ErrorKind::Parse,
            TxError::Type { .. } => ErrorKind::Type,
            TxError::InvalidKey(_) => ErrorKind::InvariantViolation,
            TxError::BackendTransient { .. } => ErrorKind::BackendTransient,
            TxError::BackendFatal { .. } => ErrorKind::BackendFatal,
            TxError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
        }
    }

    /// Whether the backoff schedule may retry this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, TxError::BackendTransient { .. })
    }
}
