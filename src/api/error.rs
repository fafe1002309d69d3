//! Error taxonomy for the optimization pipeline.

use std::fmt;

use thiserror::Error;

/// Why an in-flight call was aborted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// The per-attempt timer fired.
    Timeout,
    /// The caller cancelled (newer request or teardown).
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Timeout => write!(f, "Request timed out"),
            AbortReason::Cancelled => write!(f, "Request cancelled"),
        }
    }
}

/// Coarse classification of an [`ApiError`], carried on failed results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad or missing configuration, caught before any network call.
    Validation,
    /// Non-2xx HTTP response.
    ProviderHttp,
    /// 2xx response without usable content.
    EmptyResponse,
    /// Timeout or explicit cancellation.
    Aborted,
    /// Anything else.
    Unknown,
}

/// Errors raised by provider adapters and configuration checks.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Configuration rejected before a request was attempted.
    #[error("{0}")]
    Validation(String),

    /// The provider answered with a non-success status.
    #[error("API request failed: {message}")]
    ProviderHttp {
        /// HTTP status code.
        status: u16,
        /// Best-effort message extracted from the error body.
        message: String,
    },

    /// The provider answered 2xx but no text could be extracted.
    #[error("API returned empty content")]
    EmptyResponse,

    /// The call was aborted by the timer or by the caller.
    #[error("{0}")]
    Aborted(AbortReason),

    /// Network failures and anything unclassified.
    #[error("{0}")]
    Unknown(String),
}

impl ApiError {
    /// Returns the classification used by the orchestrator's retry policy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::ProviderHttp { .. } => ErrorKind::ProviderHttp,
            ApiError::EmptyResponse => ErrorKind::EmptyResponse,
            ApiError::Aborted(_) => ErrorKind::Aborted,
            ApiError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Whether this error ends the retry loop immediately.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, ApiError::Aborted(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ApiError::Unknown(format!("Network timeout: {err}"));
        }
        ApiError::Unknown(format!("Network error: {err}"))
    }
}
