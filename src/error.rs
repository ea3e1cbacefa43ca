//! Gateway error types

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Gateway error types.
///
/// Every variant owns its data so the error can be cloned: a failed
/// coalesced call hands the same error to the leader and every follower.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("content filtered: {reason}")]
    ContentFiltered { reason: String },

    // Data errors
    #[error("JSON error: {0}")]
    Json(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("response violates schema: {0}")]
    Schema(String),

    // Configuration errors
    #[error("no provider configured")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),

    // Sink errors
    #[error("outcome sink '{sink}' failed: {message}")]
    Sink { sink: String, message: String },

    // Soft errors
    #[error("empty response from model")]
    EmptyResponse,

    /// Broken coalescer or cache bookkeeping. Never retried.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

/// Coarse failure classification carried by call outcome records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Timeout, network failure, rate limit or server-side error.
    Transient,
    /// Credentials, malformed request, content policy, configuration.
    Fatal,
    /// Response could not be repaired into the requested shape.
    Schema,
    /// Coalescer or cache inconsistency.
    Internal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Fatal => "fatal",
            ErrorClass::Schema => "schema",
            ErrorClass::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GatewayError {
    /// Classify this error for retry decisions and outcome records.
    pub fn class(&self) -> ErrorClass {
        match self {
            GatewayError::Http(_)
            | GatewayError::RateLimited { .. }
            | GatewayError::Timeout(_)
            | GatewayError::EmptyResponse => ErrorClass::Transient,
            GatewayError::Api { status, .. } if *status >= 500 || *status == 408 => {
                ErrorClass::Transient
            }
            GatewayError::Api { .. }
            | GatewayError::AuthenticationFailed
            | GatewayError::ModelNotFound(_)
            | GatewayError::InvalidRequest(_)
            | GatewayError::ContentFiltered { .. }
            | GatewayError::InvalidInput(_)
            | GatewayError::NoProvider
            | GatewayError::Configuration(_)
            | GatewayError::Sink { .. } => ErrorClass::Fatal,
            GatewayError::Json(_) | GatewayError::Schema(_) => ErrorClass::Schema,
            GatewayError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Whether the retry executor should try again after this error.
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Provider-supplied backoff hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Http(format!("request timed out: {err}"))
        } else {
            GatewayError::Http(err.to_string())
        }
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
