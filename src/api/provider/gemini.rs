//! Google Gemini `generateContent` adapter.

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    decode_body, log_response_success, non_empty_text, read_json_response, read_text_abortable,
    send_abortable, ProviderAdapter,
};
use crate::api::error::ApiError;
use crate::api::types::{NormalizedRequest, NormalizedResult, RawHttpResponse};

const PROVIDER: &str = "Gemini";
const GENERATE_CONTENT: &str = ":generateContent";

#[derive(Serialize, Deserialize, Debug)]
struct Part {
    text: Option<String>,
}

#[derive(Serialize, Debug)]
struct RequestContent {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_output_tokens: u32,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    fn text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

/// Adapter for the Gemini `generateContent` endpoint.
///
/// Gemini has no separate system role in this dialect, so the system and
/// user prompts are joined into one user part. Usage is not extracted.
#[derive(Clone)]
pub struct GeminiAdapter {
    client: Client,
}

impl GeminiAdapter {
    /// Creates an adapter using the given HTTP client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds `{endpoint}/models/{model}:generateContent?key={api_key}`
    /// unless the endpoint already names the method.
    pub(crate) fn api_url(endpoint: &str, model: &str, api_key: &str) -> String {
        let base = endpoint.strip_suffix('/').unwrap_or(endpoint);
        if base.contains(GENERATE_CONTENT) {
            base.to_string()
        } else {
            format!("{base}/models/{model}{GENERATE_CONTENT}?key={api_key}")
        }
    }

    fn single_user_turn(text: String, temperature: Option<f32>, max_tokens: u32) -> GenerateRequest {
        GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![Part { text: Some(text) }],
            }],
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens: max_tokens,
            },
        }
    }
}

impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn call<'a>(
        &'a self,
        request: &'a NormalizedRequest,
    ) -> BoxFuture<'a, Result<NormalizedResult, ApiError>> {
        Box::pin(async move {
            let body = Self::single_user_turn(
                format!("{}\n\n{}", request.system_prompt, request.user_prompt),
                Some(request.temperature),
                request.max_tokens,
            );

            let url = Self::api_url(&request.endpoint, &request.model, &request.api_key);
            // The URL carries the key, so only the model is logged.
            info!(model = %request.model, "Sending request to Gemini API");

            let builder = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&body);
            let response = send_abortable(builder, &request.cancel).await?;
            let value = read_json_response(PROVIDER, response, &request.cancel).await?;
            let parsed: GenerateResponse = decode_body(PROVIDER, value)?;

            debug!(
                candidate_count = parsed.candidates.len(),
                "Received Gemini API response"
            );

            let text = non_empty_text(parsed.text())?;
            log_response_success(PROVIDER, &text);
            Ok(NormalizedResult::success(text, None))
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
            let body = Self::single_user_turn("Hi".to_string(), None, 5);
            let builder = self
                .client
                .post(Self::api_url(endpoint, model, api_key))
                .header("Content-Type", "application/json")
                .json(&body);
            let response = send_abortable(builder, cancel).await?;
            let status = response.status().as_u16();
            let body = read_text_abortable(response, cancel).await?;
            Ok(RawHttpResponse { status, body })
        })
    }
}
