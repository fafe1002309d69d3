//! Drives one optimization: strategy resolution, per-attempt timeout,
//! linear backoff retries and cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::connection::validate_provider_config;
use super::error::{AbortReason, ApiError};
use super::provider::{ProviderAdapter, ProviderRegistry};
use super::types::{NormalizedRequest, NormalizedResult, ProviderConfig};
use crate::prompts::{self, UserPromptConfig};

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default number of extra attempts after the first failure.
pub const DEFAULT_RETRY_COUNT: u32 = 2;
/// Base unit of the linear backoff between attempts.
pub const BACKOFF_STEP: Duration = Duration::from_millis(1000);

/// Tuning knobs for one [`Optimizer::optimize`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OptimizeOptions {
    /// Upper bound for each individual attempt.
    pub timeout: Duration,
    /// Extra attempts after a non-abort failure.
    pub retry_count: u32,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry_count: DEFAULT_RETRY_COUNT,
        }
    }
}

/// Delay before the attempt following `attempt` (zero-based).
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_STEP * (attempt + 1)
}

/// Runs optimizations against the provider chosen by each config.
#[derive(Clone)]
pub struct Optimizer {
    registry: Arc<ProviderRegistry>,
}

impl Optimizer {
    /// Creates an optimizer dispatching through `registry`.
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Rewrites `text` with the selected strategy.
    ///
    /// Never fails: validation problems, provider errors, timeouts and
    /// cancellation all come back as an unsuccessful [`NormalizedResult`].
    /// Aborts (timeout or `cancel`) end the run immediately; other failures
    /// are retried up to `options.retry_count` times with linear backoff.
    pub async fn optimize(
        &self,
        text: &str,
        provider: &ProviderConfig,
        prompt_config: &UserPromptConfig,
        options: &OptimizeOptions,
        cancel: &CancellationToken,
    ) -> NormalizedResult {
        if let Err(e) = validate_provider_config(provider) {
            debug!(error = %e, "Provider config rejected before dispatch");
            return NormalizedResult::failure(&e);
        }

        let strategy = prompts::selected(prompt_config);
        let params = prompts::build_params(text, &strategy);
        let adapter = self.registry.get(&provider.provider_id);

        let span = info_span!(
            "optimize",
            provider = adapter.name(),
            strategy = %strategy.id,
            model = %provider.model
        );

        async {
            let mut last_error: Option<ApiError> = None;

            for attempt in 0..=options.retry_count {
                if cancel.is_cancelled() {
                    return NormalizedResult::failure(&ApiError::Aborted(AbortReason::Cancelled));
                }

                let request = NormalizedRequest {
                    endpoint: provider.endpoint.clone(),
                    api_key: provider.api_key.clone(),
                    model: provider.model.clone(),
                    system_prompt: params.system_prompt.clone(),
                    user_prompt: params.user_prompt.clone(),
                    temperature: strategy.temperature,
                    max_tokens: strategy.max_tokens,
                    cancel: cancel.child_token(),
                };

                debug!(attempt, "Calling provider");
                match run_attempt(adapter.as_ref(), &request, options.timeout, cancel).await {
                    Ok(result) => {
                        info!(attempt, success = result.success, "Optimization finished");
                        return result;
                    }
                    Err(e) if e.is_abort() => {
                        info!(attempt, reason = %e, "Optimization aborted");
                        return NormalizedResult::failure(&e);
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "Provider call failed");
                        last_error = Some(e);
                    }
                }

                if attempt < options.retry_count {
                    let delay = backoff_delay(attempt);
                    debug!(delay_ms = delay.as_millis() as u64, "Backing off before retry");
                    tokio::select! {
                        () = cancel.cancelled() => {
                            return NormalizedResult::failure(
                                &ApiError::Aborted(AbortReason::Cancelled),
                            );
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }

            let error = last_error.unwrap_or_else(|| {
                ApiError::Unknown("Optimization failed, please try again later".into())
            });
            NormalizedResult::failure(&error)
        }
        .instrument(span)
        .await
    }
}

/// Runs one adapter call under the per-attempt timer.
///
/// Whichever of the timer and the external token fires first cancels the
/// attempt's child token and drops the in-flight call.
async fn run_attempt(
    adapter: &dyn ProviderAdapter,
    request: &NormalizedRequest,
    timeout: Duration,
    external: &CancellationToken,
) -> Result<NormalizedResult, ApiError> {
    let outcome = tokio::select! {
        biased;
        () = external.cancelled() => Err(ApiError::Aborted(AbortReason::Cancelled)),
        () = tokio::time::sleep(timeout) => Err(ApiError::Aborted(AbortReason::Timeout)),
        result = adapter.call(request) => result,
    };
    request.cancel.cancel();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorKind;
    use crate::api::test_utils::MockAdapter;
    use crate::prompts::{set_selected, StrategyOverride};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(endpoint: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: "sk-test".into(),
            provider_id: "openai".into(),
            endpoint: endpoint.into(),
            model: "gpt-4o-mini".into(),
        }
    }

    fn server_error(message: &str) -> Result<NormalizedResult, ApiError> {
        Err(ApiError::ProviderHttp {
            status: 500,
            message: message.into(),
        })
    }

    fn optimizer(mock: MockAdapter) -> Optimizer {
        Optimizer::new(Arc::new(mock.into_registry()))
    }

    #[test]
    fn backoff_is_linear() {
        assert_eq!(backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(2), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_linear_backoff_then_reports_last_error() {
        let mock = MockAdapter::new(vec![
            server_error("first"),
            server_error("second"),
            server_error("third"),
        ]);
        let calls = mock.call_handle();

        let result = optimizer(mock)
            .optimize(
                "draft",
                &provider("https://api.example.com/v1"),
                &UserPromptConfig::default(),
                &OptimizeOptions::default(),
                &CancellationToken::new(),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("API request failed: third"));
        assert_eq!(result.error_kind, Some(ErrorKind::ProviderHttp));

        let calls = calls.calls();
        assert_eq!(calls.len(), 3);
        let first_gap = calls[1].at - calls[0].at;
        let second_gap = calls[2].at - calls[1].at;
        assert!(first_gap >= Duration::from_millis(1000) && first_gap < Duration::from_millis(1100));
        assert!(second_gap >= Duration::from_millis(2000) && second_gap < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_transient_failure() {
        let mock = MockAdapter::new(vec![
            server_error("busy"),
            Ok(NormalizedResult::success("better prompt", None)),
        ]);
        let calls = mock.call_handle();

        let result = optimizer(mock)
            .optimize(
                "draft",
                &provider("https://api.example.com/v1"),
                &UserPromptConfig::default(),
                &OptimizeOptions::default(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.optimized_text.as_deref(), Some("better prompt"));
        assert_eq!(calls.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_aborts_without_retry() {
        let mock = MockAdapter::succeeding("late", 3).with_latency(Duration::from_secs(10));
        let calls = mock.call_handle();
        let options = OptimizeOptions {
            timeout: Duration::from_millis(50),
            retry_count: 2,
        };

        let result = optimizer(mock)
            .optimize(
                "draft",
                &provider("https://api.example.com/v1"),
                &UserPromptConfig::default(),
                &options,
                &CancellationToken::new(),
            )
            .await;

        assert!(result.is_aborted());
        assert_eq!(result.error_message.as_deref(), Some("Request timed out"));
        assert_eq!(calls.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn external_cancel_aborts_in_flight_call() {
        let mock = MockAdapter::succeeding("late", 1).with_latency(Duration::from_secs(10));
        let calls = mock.call_handle();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = optimizer(mock)
            .optimize(
                "draft",
                &provider("https://api.example.com/v1"),
                &UserPromptConfig::default(),
                &OptimizeOptions::default(),
                &cancel,
            )
            .await;

        assert!(result.is_aborted());
        assert_eq!(result.error_message.as_deref(), Some("Request cancelled"));
        assert_eq!(calls.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff_stops_retrying() {
        let mock = MockAdapter::new(vec![server_error("a"), server_error("b")]);
        let calls = mock.call_handle();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let result = optimizer(mock)
            .optimize(
                "draft",
                &provider("https://api.example.com/v1"),
                &UserPromptConfig::default(),
                &OptimizeOptions::default(),
                &cancel,
            )
            .await;

        assert!(result.is_aborted());
        assert_eq!(calls.count(), 1);
    }

    #[tokio::test]
    async fn invalid_provider_config_short_circuits() {
        let mock = MockAdapter::succeeding("unused", 1);
        let calls = mock.call_handle();
        let mut config = provider("https://api.example.com/v1");
        config.api_key = String::new();

        let result = optimizer(mock)
            .optimize(
                "draft",
                &config,
                &UserPromptConfig::default(),
                &OptimizeOptions::default(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.error_kind, Some(ErrorKind::Validation));
        assert_eq!(calls.count(), 0);
    }

    #[tokio::test]
    async fn dispatches_selected_strategy_parameters() {
        let mock = MockAdapter::succeeding("ok", 1);
        let calls = mock.call_handle();
        let prompt_config = crate::prompts::set_override(
            &set_selected(&UserPromptConfig::default(), "coding"),
            "coding",
            &StrategyOverride {
                temperature: Some(0.1),
                ..Default::default()
            },
        );

        optimizer(mock)
            .optimize(
                "fix my loop",
                &provider("https://api.example.com/v1"),
                &prompt_config,
                &OptimizeOptions::default(),
                &CancellationToken::new(),
            )
            .await;

        let call = &calls.calls()[0];
        let coding = crate::prompts::resolve("coding", &prompt_config);
        assert_eq!(call.system_prompt, coding.system_prompt);
        assert!(call.user_prompt.contains("fix my loop"));
        assert_eq!(call.temperature, 0.1);
        assert_eq!(call.max_tokens, coding.max_tokens);
    }

    #[tokio::test]
    async fn end_to_end_openai_compatible() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    { "role": "system" },
                    { "role": "user", "content": "请优化以下提示词：\n\nwrite a poem" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "  Write a sonnet about autumn.  " } }],
                "usage": { "prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let optimizer = Optimizer::new(Arc::new(ProviderRegistry::with_defaults().unwrap()));
        let result = optimizer
            .optimize(
                "write a poem",
                &provider(&format!("{}/v1/", server.uri())),
                &UserPromptConfig::default(),
                &OptimizeOptions::default(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(
            result.optimized_text.as_deref(),
            Some("Write a sonnet about autumn.")
        );
        assert_eq!(result.usage.and_then(|u| u.total_tokens), Some(19));
    }

    #[tokio::test]
    async fn end_to_end_error_without_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({ "error": { "message": "bad model" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut config = provider(&server.uri());
        config.provider_id = "anthropic".into();
        let optimizer = Optimizer::new(Arc::new(ProviderRegistry::with_defaults().unwrap()));
        let result = optimizer
            .optimize(
                "draft",
                &config,
                &UserPromptConfig::default(),
                &OptimizeOptions {
                    retry_count: 0,
                    ..Default::default()
                },
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.error_message.as_deref(), Some("API request failed: bad model"));
    }

    #[tokio::test]
    async fn http_client_timeout_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .expect(2)
            .mount(&server)
            .await;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let optimizer = Optimizer::new(Arc::new(ProviderRegistry::with_client(client)));
        let result = optimizer
            .optimize(
                "draft",
                &provider(&server.uri()),
                &UserPromptConfig::default(),
                &OptimizeOptions {
                    timeout: Duration::from_secs(30),
                    retry_count: 1,
                },
                &CancellationToken::new(),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::Unknown));
        assert!(!result.is_aborted());
    }
}
