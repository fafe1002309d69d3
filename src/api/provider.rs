//! Provider adapter trait, shared HTTP helpers and the provider registry.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{AbortReason, ApiError};
use super::types::{NormalizedRequest, NormalizedResult, RawHttpResponse};

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAiCompatibleAdapter;

/// Upper bound for a single HTTP exchange.
///
/// The orchestrator applies its own, usually shorter, per-attempt timeout;
/// this only guards against connections that never complete.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Provider ids that speak the OpenAI chat-completions dialect.
pub const OPENAI_COMPATIBLE_IDS: &[&str] = &[
    "openai",
    "aliyun-bailian",
    "modelscope",
    "siliconflow",
    "deepseek",
    "zhipu",
    "volcengine",
    "custom",
];

/// A wire-format family: turns a normalized request into an HTTP call.
pub trait ProviderAdapter: Send + Sync {
    /// Human-readable provider family name, used in logs.
    fn name(&self) -> &'static str;

    /// Sends an optimization request and normalizes the response.
    ///
    /// Never retries; aborts with [`ApiError::Aborted`] once
    /// `request.cancel` fires.
    fn call<'a>(
        &'a self,
        request: &'a NormalizedRequest,
    ) -> BoxFuture<'a, Result<NormalizedResult, ApiError>>;

    /// Sends a minimal request to check credentials; the body is not parsed.
    fn test_connection<'a>(
        &'a self,
        endpoint: &'a str,
        api_key: &'a str,
        model: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<RawHttpResponse, ApiError>>;
}

/// Maps provider ids to adapters.
///
/// Ids without a registration fall back to the OpenAI-compatible adapter,
/// so a typo in the provider id selects that dialect. A warning is logged
/// whenever the fallback is used.
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    fallback: Arc<dyn ProviderAdapter>,
}

impl ProviderRegistry {
    /// Creates an empty registry that routes everything to `fallback`.
    pub fn new(fallback: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            adapters: HashMap::new(),
            fallback,
        }
    }

    /// Creates a registry with the built-in Anthropic, Gemini and
    /// OpenAI-compatible adapters sharing one HTTP client.
    pub fn with_defaults() -> Result<Self, ApiError> {
        let client = build_http_client()?;
        Ok(Self::with_client(client))
    }

    /// Same as [`with_defaults`](Self::with_defaults) with a caller-supplied client.
    pub fn with_client(client: Client) -> Self {
        let openai: Arc<dyn ProviderAdapter> =
            Arc::new(OpenAiCompatibleAdapter::new(client.clone()));
        let mut registry = Self::new(openai.clone());
        for id in OPENAI_COMPATIBLE_IDS {
            registry.register(*id, openai.clone());
        }
        registry.register("anthropic", Arc::new(AnthropicAdapter::new(client.clone())));
        registry.register("gemini", Arc::new(GeminiAdapter::new(client)));
        registry
    }

    /// Registers (or replaces) the adapter for a provider id.
    pub fn register(&mut self, provider_id: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(provider_id.into(), adapter);
    }

    /// Whether an explicit registration exists for `provider_id`.
    #[must_use]
    pub fn is_registered(&self, provider_id: &str) -> bool {
        self.adapters.contains_key(provider_id)
    }

    /// Returns the adapter for `provider_id`, or the fallback.
    pub fn get(&self, provider_id: &str) -> Arc<dyn ProviderAdapter> {
        match self.adapters.get(provider_id) {
            Some(adapter) => adapter.clone(),
            None => {
                warn!(
                    provider_id = %provider_id,
                    fallback = self.fallback.name(),
                    "Unknown provider id, using OpenAI-compatible fallback"
                );
                self.fallback.clone()
            }
        }
    }
}

// ── Shared helpers for adapter implementations ──────────────────────

/// Builds the HTTP client shared by all adapters.
pub(crate) fn build_http_client() -> Result<Client, ApiError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ApiError::Unknown(format!("Failed to build HTTP client: {e}")))
}

/// Strips one trailing slash and appends `suffix` unless the URL already
/// contains it.
pub(crate) fn append_path_once(endpoint: &str, suffix: &str) -> String {
    let base = endpoint.strip_suffix('/').unwrap_or(endpoint);
    if base.contains(suffix) {
        base.to_string()
    } else {
        format!("{base}{suffix}")
    }
}

/// Sends a prepared request, racing it against the cancellation token.
pub(crate) async fn send_abortable(
    builder: RequestBuilder,
    cancel: &CancellationToken,
) -> Result<Response, ApiError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ApiError::Aborted(AbortReason::Cancelled)),
        response = builder.send() => response.map_err(ApiError::from),
    }
}

/// Reads a response body as text, racing it against the cancellation token.
pub(crate) async fn read_text_abortable(
    response: Response,
    cancel: &CancellationToken,
) -> Result<String, ApiError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ApiError::Aborted(AbortReason::Cancelled)),
        body = response.text() => body.map_err(ApiError::from),
    }
}

/// Checks the status and parses a success body as JSON.
///
/// Non-2xx responses become [`ApiError::ProviderHttp`]; unparseable 2xx
/// bodies become [`ApiError::EmptyResponse`].
pub(crate) async fn read_json_response(
    provider: &str,
    response: Response,
    cancel: &CancellationToken,
) -> Result<Value, ApiError> {
    let status = response.status();
    let body = read_text_abortable(response, cancel).await?;

    if !status.is_success() {
        let message = extract_error_message(&body, status.as_u16());
        debug!(provider, status = status.as_u16(), %message, "Provider returned error status");
        return Err(ApiError::ProviderHttp {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        debug!(provider, error = %e, "Failed to parse provider response body");
        ApiError::EmptyResponse
    })
}

/// Extracts `error.message` or `message` from an error body, falling back
/// to `HTTP <status>`.
pub(crate) fn extract_error_message(body: &str, status: u16) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .or_else(|| v.get("message").and_then(Value::as_str))
        })
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

/// Deserializes a parsed body into a provider-specific response shape.
pub(crate) fn decode_body<T: serde::de::DeserializeOwned>(
    provider: &str,
    body: Value,
) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| {
        debug!(provider, error = %e, "Provider response has unexpected shape");
        ApiError::EmptyResponse
    })
}

/// Trims extracted text and rejects empty content.
pub(crate) fn non_empty_text(text: Option<&str>) -> Result<String, ApiError> {
    match text.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => Err(ApiError::EmptyResponse),
    }
}

/// Logs successful text extraction from a provider response.
pub(crate) fn log_response_success(provider: &str, text: &str) {
    debug!(
        response_len = text.len(),
        "Successfully extracted text content from {} API response", provider
    );
}
