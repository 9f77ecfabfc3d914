//! Error taxonomy shared across the hub.
//!
//! Every dispatcher path ends in a structured `ExecutionResponse`; these
//! types exist so the layers between an adapter and the HTTP surface can
//! tell validation failures, streaming failures and isolation faults apart
//! before that final conversion.

/// Errors raised while streaming or parsing an export payload.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The payload was not well-formed JSON.
    #[error("json parse error at byte {offset}: {message}")]
    Parse {
        /// Byte offset into the payload where parsing failed.
        offset: u64,
        /// What the tokenizer expected or found.
        message: String,
    },

    /// The byte stream ended before the document's structural end.
    ///
    /// Distinct from success: a socket that closes mid-document must not
    /// be reported as a completed export.
    #[error("payload stream closed before the document was complete")]
    PrematureClose,

    /// The underlying byte source failed (download error, closed socket).
    #[error("payload source error: {0}")]
    Source(String),
}

/// Error type for all hub operations.
///
/// Adapters return this from `execute`/`form`; the dispatcher converts any
/// variant into a failure `ExecutionResponse` rather than letting it escape.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HubError {
    /// The request is malformed or unsupported — surfaced to the caller,
    /// never retried.
    #[error("{message}")]
    Validation {
        /// Human-readable description of what failed validation.
        message: String,
    },

    /// A parameter the action declares as required was not provided.
    #[error("Required parameter {name} not provided.")]
    MissingParam {
        /// Name of the missing parameter.
        name: String,
    },

    /// The export's fields do not satisfy the action's requirement clauses.
    #[error("{message}")]
    MissingRequiredField {
        /// Message naming the unmet tag(s).
        message: String,
    },

    /// No action with the given name is registered (or it is gated out by
    /// the caller's protocol version or delegate-oauth capability).
    #[error("action not found: {name}")]
    NotFound {
        /// The action name that was looked up.
        name: String,
    },

    /// Streaming/parsing of the payload failed.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// OAuth plumbing failed (decrypt, token exchange, callback postback).
    #[error("oauth: {message}")]
    Oauth {
        /// Human-readable description of the failure.
        message: String,
    },

    /// The isolated worker crashed, timed out or could not be scheduled.
    #[error("isolation: {message}")]
    Isolation {
        /// Rendering of the underlying fault.
        message: String,
    },

    /// Anything an adapter reports that is not covered above (third-party
    /// SDK failures, formatting errors).
    #[error("{message}")]
    Other {
        /// Human-readable description of the failure.
        message: String,
    },
}

impl HubError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a missing-required-field error.
    pub fn missing_required_field(message: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            message: message.into(),
        }
    }

    /// Create an oauth error.
    pub fn oauth(message: impl Into<String>) -> Self {
        Self::Oauth {
            message: message.into(),
        }
    }

    /// Create an isolation error.
    pub fn isolation(message: impl Into<String>) -> Self {
        Self::Isolation {
            message: message.into(),
        }
    }

    /// Create an uncategorized adapter error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Returns `true` for errors the caller caused (bad request, missing
    /// params or fields) as opposed to hub-side failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::MissingParam { .. } | Self::MissingRequiredField { .. }
        )
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation {
            message: format!("invalid request body: {err}"),
        }
    }
}
