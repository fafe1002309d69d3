//! Strategy data types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::built_in::DEFAULT_STRATEGY_ID;

/// Placeholder replaced by the user's draft in every user prompt template.
pub const INPUT_PLACEHOLDER: &str = "{{input}}";

/// A named bundle of prompts and sampling parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDefinition {
    /// Stable identifier; built-ins use short names, custom entries `custom-…`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// One-line description shown in selectors.
    #[serde(default)]
    pub description: String,
    /// System prompt sent verbatim.
    pub system_prompt: String,
    /// User prompt template containing [`INPUT_PLACEHOLDER`].
    pub user_prompt_template: String,
    /// Sampling temperature in `[0, 2]`.
    pub temperature: f32,
    /// Completion token limit in `[1, 8192]`.
    pub max_tokens: u32,
    /// Whether this comes from the embedded table.
    #[serde(default)]
    pub is_built_in: bool,
    /// Whether the user may edit it.
    #[serde(default = "default_true")]
    pub is_editable: bool,
    /// Creation time, epoch milliseconds (0 for built-ins).
    #[serde(default)]
    pub created_at: i64,
    /// Last update time, epoch milliseconds (0 for built-ins).
    #[serde(default)]
    pub updated_at: i64,
}

fn default_true() -> bool {
    true
}

/// Partial patch over a [`StrategyDefinition`].
///
/// Used both as a stored override for built-ins and as an update for custom
/// entries. `None` fields leave the base untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrategyOverride {
    /// Replacement display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Replacement description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Replacement user prompt template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_prompt_template: Option<String>,
    /// Replacement temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Replacement token limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl StrategyOverride {
    /// Returns `base` with every set field of this patch applied.
    #[must_use]
    pub fn apply_to(&self, base: &StrategyDefinition) -> StrategyDefinition {
        let mut merged = base.clone();
        if let Some(ref name) = self.name {
            merged.name = name.clone();
        }
        if let Some(ref description) = self.description {
            merged.description = description.clone();
        }
        if let Some(ref system_prompt) = self.system_prompt {
            merged.system_prompt = system_prompt.clone();
        }
        if let Some(ref template) = self.user_prompt_template {
            merged.user_prompt_template = template.clone();
        }
        if let Some(temperature) = self.temperature {
            merged.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            merged.max_tokens = max_tokens;
        }
        merged
    }

    /// Layers `newer` on top of `self`; fields set in `newer` win.
    #[must_use]
    pub fn merged_with(&self, newer: &StrategyOverride) -> StrategyOverride {
        StrategyOverride {
            name: newer.name.clone().or_else(|| self.name.clone()),
            description: newer.description.clone().or_else(|| self.description.clone()),
            system_prompt: newer.system_prompt.clone().or_else(|| self.system_prompt.clone()),
            user_prompt_template: newer
                .user_prompt_template
                .clone()
                .or_else(|| self.user_prompt_template.clone()),
            temperature: newer.temperature.or(self.temperature),
            max_tokens: newer.max_tokens.or(self.max_tokens),
        }
    }
}

/// Fields a user supplies when creating a custom strategy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStrategy {
    /// Display name.
    pub name: String,
    /// One-line description.
    #[serde(default)]
    pub description: String,
    /// System prompt.
    pub system_prompt: String,
    /// User prompt template containing [`INPUT_PLACEHOLDER`].
    pub user_prompt_template: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token limit.
    pub max_tokens: u32,
}

/// The user's strategy selection, overrides and custom entries.
///
/// Treated as an immutable value: every helper in
/// [`manager`](super::manager) returns a new config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPromptConfig {
    /// Id of the strategy used by the optimize control.
    pub selected_strategy_id: String,
    /// User-defined strategies, in creation order.
    pub custom_strategies: Vec<StrategyDefinition>,
    /// Patches over built-ins keyed by built-in id.
    pub built_in_overrides: BTreeMap<String, StrategyOverride>,
}

impl Default for UserPromptConfig {
    fn default() -> Self {
        Self {
            selected_strategy_id: DEFAULT_STRATEGY_ID.to_string(),
            custom_strategies: Vec::new(),
            built_in_overrides: BTreeMap::new(),
        }
    }
}

/// Prompts ready to send, produced by [`build_params`](super::manager::build_params).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptimizationParams {
    /// System prompt, unchanged from the strategy.
    pub system_prompt: String,
    /// User prompt with the draft substituted in.
    pub user_prompt: String,
}
