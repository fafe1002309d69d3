//! Preflight validation checks for early failure detection
//!
//! Commands that call a provider run these checks first so that missing
//! credentials fail fast with a message naming the variables to set.

use anyhow::{bail, Result};

use crate::api::{validate_provider_config, ProviderConfig};
use crate::utils::settings::{Settings, API_KEY_VAR, ENDPOINT_VAR, MODEL_VAR};

/// Result of provider credential validation
#[derive(Debug)]
pub struct ProviderCredentialInfo {
    /// The wire-format family that will be used
    pub family: ProviderFamily,
    /// The resolved provider config
    pub config: ProviderConfig,
}

/// Wire-format families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    /// OpenAI chat-completions and compatible vendors
    OpenAiCompatible,
    /// Anthropic Messages API
    Anthropic,
    /// Google Gemini generateContent API
    Gemini,
}

impl ProviderFamily {
    /// Family for a provider id; unknown ids speak the OpenAI dialect.
    pub fn for_provider(provider_id: &str) -> Self {
        match provider_id {
            "anthropic" => ProviderFamily::Anthropic,
            "gemini" => ProviderFamily::Gemini,
            _ => ProviderFamily::OpenAiCompatible,
        }
    }
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderFamily::OpenAiCompatible => write!(f, "OpenAI-compatible API"),
            ProviderFamily::Anthropic => write!(f, "Anthropic API"),
            ProviderFamily::Gemini => write!(f, "Gemini API"),
        }
    }
}

/// Validate provider credentials are available before calling out
///
/// Resolves the provider config from settings plus environment overrides
/// without creating any HTTP client.
pub fn check_provider_credentials(settings: &Settings) -> Result<ProviderCredentialInfo> {
    let config = settings.provider_config();

    if config.api_key.trim().is_empty() {
        bail!(
            "API key not found.\n\
             Set the {API_KEY_VAR} environment variable or provider.apiKey in settings.json."
        );
    }
    if config.endpoint.trim().is_empty() {
        bail!(
            "API endpoint not configured.\n\
             Set the {ENDPOINT_VAR} environment variable or provider.endpoint in settings.json."
        );
    }
    if config.model.trim().is_empty() {
        bail!(
            "Model not configured.\n\
             Set the {MODEL_VAR} environment variable or provider.model in settings.json."
        );
    }
    validate_provider_config(&config)?;

    Ok(ProviderCredentialInfo {
        family: ProviderFamily::for_provider(&config.provider_id),
        config,
    })
}
