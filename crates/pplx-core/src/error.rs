//! Error types for the query engine.

use thiserror::Error;

/// Result type alias using the engine error type.
pub type Result<T> = std::result::Result<T, Error>;

// ─────────────────────────────────────────────────────────────────────────────
// Field-Level Failures
// ─────────────────────────────────────────────────────────────────────────────

/// A parameter set broke a static rule.
///
/// `value` is empty when the failure is about a combination of fields rather
/// than one bad value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}{}: {reason}", quoted(.value))]
pub struct ValidationError {
    /// Name of the offending parameter.
    pub field: &'static str,
    /// Offending value (empty for combination failures).
    pub value: String,
    /// Human-readable reason.
    pub reason: String,
}

impl ValidationError {
    /// Create a validation error for a single bad value.
    pub fn new(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a validation error about a combination of fields.
    pub fn combination(field: &'static str, reason: impl Into<String>) -> Self {
        Self::new(field, String::new(), reason)
    }
}

/// A field passed validation but its content is not well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot compile {field} {value:?}: {reason}")]
pub struct CompileError {
    /// Name of the offending parameter.
    pub field: &'static str,
    /// Offending value.
    pub value: String,
    /// Why it could not be compiled.
    pub reason: String,
}

impl CompileError {
    /// Create a new compile error.
    pub fn new(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

fn quoted(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        format!(" {:?}", value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport Failures
// ─────────────────────────────────────────────────────────────────────────────

/// Failure reported by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The session deadline fired.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The transport is not usable (missing API key, bad base URL).
    #[error("transport configuration error: {0}")]
    Config(String),
}

impl TransportError {
    /// Returns true if the remote API rejected the credentials.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decode(err.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine Error
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for the query pipeline.
///
/// Every kind stops the pipeline where it is detected; nothing partial is
/// returned.
#[derive(Debug, Error)]
pub enum Error {
    /// A static rule was violated. Detected before any network activity.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A field could not be compiled into a directive.
    #[error("compilation failed: {0}")]
    Compilation(#[from] CompileError),

    /// The remote call failed.
    #[error("request failed: {0}")]
    Request(#[from] TransportError),

    /// The stream ended without a usable result.
    #[error("stream error: {0}")]
    Stream(String),
}

impl Error {
    /// Name of the offending parameter, for input errors.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation(e) => Some(e.field),
            Self::Compilation(e) => Some(e.field),
            _ => None,
        }
    }

    /// Returns true if the caller supplied bad input.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Compilation(_))
    }

    /// Returns true if the remote side or the stream failed.
    pub fn is_remote_error(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Stream(_))
    }
}
