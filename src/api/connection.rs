//! Provider configuration checks and the connection test.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use super::error::ApiError;
use super::provider::{extract_error_message, ProviderRegistry};
use super::types::ProviderConfig;

/// Time allowed for a connection test before it is reported as timed out.
pub const CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of [`test_api_connection`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    /// Whether the provider accepted the request.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
}

impl ConnectionReport {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Checks that a provider config is complete enough to attempt a call.
pub fn validate_provider_config(config: &ProviderConfig) -> Result<(), ApiError> {
    if config.api_key.trim().is_empty() {
        return Err(ApiError::Validation("API key must not be empty".into()));
    }
    if config.endpoint.trim().is_empty() {
        return Err(ApiError::Validation("API endpoint must not be empty".into()));
    }
    if config.model.trim().is_empty() {
        return Err(ApiError::Validation("Model name must not be empty".into()));
    }
    Url::parse(&config.endpoint)
        .map_err(|_| ApiError::Validation("API endpoint is not a valid URL".into()))?;
    Ok(())
}

/// Sends a minimal request to the configured provider.
///
/// Never fails: every problem is folded into the returned report.
pub async fn test_api_connection(
    registry: &ProviderRegistry,
    config: &ProviderConfig,
) -> ConnectionReport {
    test_api_connection_with_timeout(registry, config, CONNECTION_TEST_TIMEOUT).await
}

pub(crate) async fn test_api_connection_with_timeout(
    registry: &ProviderRegistry,
    config: &ProviderConfig,
    timeout: Duration,
) -> ConnectionReport {
    if let Err(e) = validate_provider_config(config) {
        return ConnectionReport::failed(e.to_string());
    }

    let adapter = registry.get(&config.provider_id);
    info!(provider = adapter.name(), endpoint = %config.endpoint, "Testing API connection");

    let cancel = CancellationToken::new();
    let outcome = tokio::select! {
        () = tokio::time::sleep(timeout) => {
            cancel.cancel();
            return ConnectionReport::failed("Connection timed out");
        }
        outcome = adapter.test_connection(&config.endpoint, &config.api_key, &config.model, &cancel) => outcome,
    };

    match outcome {
        Ok(response) if response.is_success() => ConnectionReport {
            success: true,
            message: "Connection succeeded".to_string(),
        },
        Ok(response) => {
            let message = extract_error_message(&response.body, response.status);
            debug!(status = response.status, %message, "Connection test rejected");
            ConnectionReport::failed(format!("Connection failed: {message}"))
        }
        Err(ApiError::Aborted(_)) => ConnectionReport::failed("Connection timed out"),
        Err(e) => ConnectionReport::failed(format!("Connection error: {e}")),
    }
}
