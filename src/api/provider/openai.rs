//! OpenAI-compatible chat-completions adapter (OpenAI, DeepSeek, SiliconFlow, etc.).

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

const PROVIDER: &str = "OpenAI-compatible";
const CHAT_COMPLETIONS: &str = "/chat/completions";

/// Chat message in a request body.
#[derive(Serialize, Debug)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// Chat-completions request body.
#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
}

/// Response message.
#[derive(Deserialize, Debug, Default)]
struct ResponseMessage {
    content: Option<String>,
}

/// Response choice; legacy completions put the text directly on the choice.
#[derive(Deserialize, Debug, Default)]
struct Choice {
    message: Option<ResponseMessage>,
    text: Option<String>,
}

/// Usage statistics.
#[derive(Deserialize, Debug)]
struct OpenAiUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

/// Chat-completions response.
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<OpenAiUsage>,
}

impl ChatResponse {
    fn content(&self) -> Option<&str> {
        let choice = self.choices.first()?;
        choice
            .message
            .as_ref()
            .and_then(|m| m.content.as_deref())
            .or(choice.text.as_deref())
    }

    fn usage(&self) -> Option<Usage> {
        self.usage.as_ref().map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
    }
}

/// Adapter for every provider that exposes `/chat/completions`.
#[derive(Clone)]
pub struct OpenAiCompatibleAdapter {
    client: Client,
}

impl OpenAiCompatibleAdapter {
    /// Creates an adapter using the given HTTP client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the full chat-completions URL.
    pub(crate) fn api_url(endpoint: &str) -> String {
        append_path_once(endpoint, CHAT_COMPLETIONS)
    }
}

impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn call<'a>(
        &'a self,
        request: &'a NormalizedRequest,
    ) -> BoxFuture<'a, Result<NormalizedResult, ApiError>> {
        Box::pin(async move {
            let body = ChatRequest {
                model: &request.model,
                messages: vec![
                    Message {
                        role: "system",
                        content: &request.system_prompt,
                    },
                    Message {
                        role: "user",
                        content: &request.user_prompt,
                    },
                ],
                temperature: Some(request.temperature),
                max_tokens: request.max_tokens,
            };

            let url = Self::api_url(&request.endpoint);
            info!(url = %url, model = %request.model, "Sending request to OpenAI-compatible API");
            debug!(
                system_prompt_len = request.system_prompt.len(),
                user_prompt_len = request.user_prompt.len(),
                temperature = request.temperature,
                max_tokens = request.max_tokens,
                "Built OpenAI-compatible request payload"
            );

            let builder = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", request.api_key))
                .json(&body);

            let response = send_abortable(builder, &request.cancel).await?;
            let value = read_json_response(PROVIDER, response, &request.cancel).await?;
            let parsed: ChatResponse = decode_body(PROVIDER, value)?;

            debug!(
                choice_count = parsed.choices.len(),
                usage = ?parsed.usage,
                "Received OpenAI-compatible API response"
            );

            let text = non_empty_text(parsed.content())?;
            log_response_success(PROVIDER, &text);
            Ok(NormalizedResult::success(text, parsed.usage()))
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
            let body = ChatRequest {
                model,
                messages: vec![Message {
                    role: "user",
                    content: "Hi",
                }],
                temperature: None,
                max_tokens: 5,
            };
            let builder = self
                .client
                .post(Self::api_url(endpoint))
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {api_key}"))
                .json(&body);

            let response = send_abortable(builder, cancel).await?;
            let status = response.status().as_u16();
            let body = read_text_abortable(response, cancel).await?;
            Ok(RawHttpResponse { status, body })
        })
    }
}
