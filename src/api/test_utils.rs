//! Shared test utilities for the `api` module and its callers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::{AbortReason, ApiError};
use super::provider::{ProviderAdapter, ProviderRegistry};
use super::types::{NormalizedRequest, NormalizedResult, RawHttpResponse};

/// Mock provider adapter with a pre-programmed queue of outcomes.
///
/// Outcomes are returned in FIFO order. When the queue is exhausted,
/// subsequent calls return `ApiError::Unknown("no more mock responses")`.
///
/// Each call waits for the configured latency (racing the request's
/// cancellation token) before answering, and records the request plus the
/// tokio instant it arrived at so tests can check dispatch timing.
pub(crate) struct MockAdapter {
    responses: Arc<Mutex<VecDeque<Result<NormalizedResult, ApiError>>>>,
    latency: Duration,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

/// One request seen by a [`MockAdapter`].
#[derive(Clone, Debug)]
pub(crate) struct RecordedCall {
    pub(crate) system_prompt: String,
    pub(crate) user_prompt: String,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: u32,
    pub(crate) at: Instant,
}

impl MockAdapter {
    /// Creates a mock that answers with the given outcomes in order.
    pub(crate) fn new(responses: Vec<Result<NormalizedResult, ApiError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            latency: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Mock that always succeeds with `text`.
    pub(crate) fn succeeding(text: &str, times: usize) -> Self {
        Self::new(
            (0..times)
                .map(|_| Ok(NormalizedResult::success(text, None)))
                .collect(),
        )
    }

    /// Delays every answer by `latency`.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Returns a handle for inspecting calls after the mock has been moved
    /// into a registry.
    pub(crate) fn call_handle(&self) -> CallRecordHandle {
        CallRecordHandle {
            calls: self.calls.clone(),
        }
    }

    /// Wraps the mock in a registry that routes every provider id to it.
    pub(crate) fn into_registry(self) -> ProviderRegistry {
        ProviderRegistry::new(Arc::new(self))
    }
}

/// Shared handle to a mock adapter's call log.
#[derive(Clone)]
pub(crate) struct CallRecordHandle {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallRecordHandle {
    /// Returns all recorded calls.
    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the number of calls made.
    pub(crate) fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        "Mock"
    }

    fn call<'a>(
        &'a self,
        request: &'a NormalizedRequest,
    ) -> BoxFuture<'a, Result<NormalizedResult, ApiError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(RecordedCall {
                system_prompt: request.system_prompt.clone(),
                user_prompt: request.user_prompt.clone(),
                temperature: request.temperature,
                max_tokens: request.max_tokens,
                at: Instant::now(),
            });

            if !self.latency.is_zero() {
                tokio::select! {
                    () = request.cancel.cancelled() => {
                        return Err(ApiError::Aborted(AbortReason::Cancelled));
                    }
                    () = tokio::time::sleep(self.latency) => {}
                }
            }

            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Unknown("no more mock responses".to_string())))
        })
    }

    fn test_connection<'a>(
        &'a self,
        _endpoint: &'a str,
        _api_key: &'a str,
        _model: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<RawHttpResponse, ApiError>> {
        Box::pin(async move {
            tokio::select! {
                () = cancel.cancelled() => Err(ApiError::Aborted(AbortReason::Cancelled)),
                () = tokio::time::sleep(self.latency) => Ok(RawHttpResponse {
                    status: 200,
                    body: "{}".to_string(),
                }),
            }
        })
    }
}
