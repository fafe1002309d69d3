//! Anthropic Messages API adapter.

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    append_path_once, decode_body, log_response_success, non_empty_text, read_json_response,
    read_text_abortable, send_abortable, ProviderAdapter,
};
use crate::api::error::ApiError;
use crate::api::types::{NormalizedRequest, NormalizedResult, RawHttpResponse, Usage};

const PROVIDER: &str = "Anthropic";
const MESSAGES: &str = "/messages";

/// Value of the `anthropic-version` header.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API request message.
#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// Messages API request body.
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

/// Messages API response content block.
#[derive(Deserialize, Debug)]
struct Content {
    text: Option<String>,
}

/// Messages API usage statistics.
#[derive(Deserialize, Debug)]
struct AnthropicUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

/// Messages API response.
#[derive(Deserialize, Debug)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<Content>,
    usage: Option<AnthropicUsage>,
}

/// Adapter for the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicAdapter {
    client: Client,
}

impl AnthropicAdapter {
    /// Creates an adapter using the given HTTP client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the full messages URL.
    pub(crate) fn api_url(endpoint: &str) -> String {
        append_path_once(endpoint, MESSAGES)
    }

    fn post(&self, url: &str, api_key: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Content-Type", "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn call<'a>(
        &'a self,
        request: &'a NormalizedRequest,
    ) -> BoxFuture<'a, Result<NormalizedResult, ApiError>> {
        Box::pin(async move {
            let body = MessagesRequest {
                model: &request.model,
                max_tokens: request.max_tokens,
                temperature: Some(request.temperature),
                system: Some(&request.system_prompt),
                messages: vec![Message {
                    role: "user",
                    content: &request.user_prompt,
                }],
            };

            let url = Self::api_url(&request.endpoint);
            info!(
                url = %url,
                model = %request.model,
                max_tokens = request.max_tokens,
                "Sending request to Anthropic API"
            );

            let builder = self.post(&url, &request.api_key).json(&body);
            let response = send_abortable(builder, &request.cancel).await?;
            let value = read_json_response(PROVIDER, response, &request.cancel).await?;
            let parsed: MessagesResponse = decode_body(PROVIDER, value)?;

            debug!(
                content_count = parsed.content.len(),
                "Received Anthropic API response"
            );

            let text = non_empty_text(parsed.content.first().and_then(|c| c.text.as_deref()))?;
            log_response_success(PROVIDER, &text);

            let usage = parsed.usage.map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: None,
            });
            Ok(NormalizedResult::success(text, usage))
        })
    }

    fn test_connection<'a>(
        &'a self,
        endpoint: &'a str,
        api_key: &'a str,
        model: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<RawHttpResponse, ApiError>> {
        Box::pin(async move {
            let body = MessagesRequest {
                model,
                max_tokens: 5,
                temperature: None,
                system: None,
                messages: vec![Message {
                    role: "user",
                    content: "Hi",
                }],
            };
            let builder = self.post(&Self::api_url(endpoint), api_key).json(&body);
            let response = send_abortable(builder, cancel).await?;
            let status = response.status().as_u16();
            let body = read_text_abortable(response, cancel).await?;
            Ok(RawHttpResponse { status, body })
        })
    }
}
