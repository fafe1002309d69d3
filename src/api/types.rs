//! Provider-agnostic request and result shapes.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::error::{ApiError, ErrorKind};

/// Credentials and routing for one LLM provider.
///
/// Owned by the configuration source; the pipeline only ever reads a clone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// Secret used for authentication.
    pub api_key: String,
    /// Provider id used to pick a wire format (e.g. "openai", "anthropic").
    pub provider_id: String,
    /// Absolute base URL of the API.
    pub endpoint: String,
    /// Model identifier sent with each request.
    pub model: String,
}

/// The common shape every provider adapter consumes.
#[derive(Clone, Debug)]
pub struct NormalizedRequest {
    /// Base URL (or full URL) of the provider API.
    pub endpoint: String,
    /// Secret used for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Strategy system prompt.
    pub system_prompt: String,
    /// User prompt with the draft substituted in.
    pub user_prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token limit.
    pub max_tokens: u32,
    /// Aborts the in-flight HTTP call when cancelled.
    pub cancel: CancellationToken,
}

/// Token accounting reported by the provider, when available.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Tokens consumed by the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    /// Tokens produced in the completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    /// Total tokens, if the provider reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// Outcome of one optimization, success or failure.
///
/// Exactly one of `optimized_text` and `error_message` is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResult {
    /// Whether the rewrite succeeded.
    pub success: bool,
    /// Rewritten prompt on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_text: Option<String>,
    /// Human-readable failure on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Failure classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Token usage, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl NormalizedResult {
    /// Builds a successful result.
    #[must_use]
    pub fn success(text: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            success: true,
            optimized_text: Some(text.into()),
            error_message: None,
            error_kind: None,
            usage,
        }
    }

    /// Builds a failed result from an error.
    #[must_use]
    pub fn failure(error: &ApiError) -> Self {
        Self {
            success: false,
            optimized_text: None,
            error_message: Some(error.to_string()),
            error_kind: Some(error.kind()),
            usage: None,
        }
    }

    /// Whether this result represents an intentional abort.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.error_kind == Some(ErrorKind::Aborted)
    }
}

/// Raw HTTP outcome of a connection test; the body is not interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawHttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl RawHttpResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
