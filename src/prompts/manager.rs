//! Strategy resolution and pure config transformations.
//!
//! Nothing here mutates its inputs: each helper takes a [`UserPromptConfig`]
//! by reference and returns a fresh value, so a surrounding store can swap
//! snapshots atomically.

use chrono::Utc;

use super::built_in::{built_in_strategies, built_in_strategy, default_strategy, DEFAULT_STRATEGY_ID};
use super::strategy::{
    NewStrategy, OptimizationParams, StrategyDefinition, StrategyOverride, UserPromptConfig,
    INPUT_PLACEHOLDER,
};
use crate::api::error::ApiError;

/// Lowest accepted temperature.
pub const MIN_TEMPERATURE: f32 = 0.0;
/// Highest accepted temperature.
pub const MAX_TEMPERATURE: f32 = 2.0;
/// Lowest accepted token limit.
pub const MIN_MAX_TOKENS: u32 = 1;
/// Highest accepted token limit.
pub const MAX_MAX_TOKENS: u32 = 8192;

/// Resolves a strategy id against the user's config.
///
/// Precedence: custom entry, then built-in patched by its override, then the
/// default built-in. Never fails.
pub fn resolve(strategy_id: &str, config: &UserPromptConfig) -> StrategyDefinition {
    if let Some(custom) = config.custom_strategies.iter().find(|s| s.id == strategy_id) {
        return custom.clone();
    }

    if let Some(base) = built_in_strategy(strategy_id) {
        return match config.built_in_overrides.get(strategy_id) {
            Some(patch) => patch.apply_to(base),
            None => base.clone(),
        };
    }

    tracing::debug!(strategy_id, "Unknown strategy id, using default");
    default_strategy()
}

/// Resolves the currently selected strategy.
pub fn selected(config: &UserPromptConfig) -> StrategyDefinition {
    resolve(&config.selected_strategy_id, config)
}

/// Lists built-ins (overrides applied) followed by custom strategies.
pub fn list_all(config: &UserPromptConfig) -> Vec<StrategyDefinition> {
    built_in_strategies()
        .iter()
        .map(|base| match config.built_in_overrides.get(&base.id) {
            Some(patch) => patch.apply_to(base),
            None => base.clone(),
        })
        .chain(config.custom_strategies.iter().cloned())
        .collect()
}

/// Case-insensitive search over names and descriptions.
pub fn search(config: &UserPromptConfig, keyword: &str) -> Vec<StrategyDefinition> {
    let needle = keyword.to_lowercase();
    list_all(config)
        .into_iter()
        .filter(|s| {
            s.name.to_lowercase().contains(&needle) || s.description.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Substitutes the draft into the strategy's user template.
///
/// Every occurrence of `{{input}}` is replaced verbatim; the system prompt is
/// passed through unchanged.
pub fn build_params(user_input: &str, strategy: &StrategyDefinition) -> OptimizationParams {
    OptimizationParams {
        system_prompt: strategy.system_prompt.clone(),
        user_prompt: strategy
            .user_prompt_template
            .replace(INPUT_PLACEHOLDER, user_input),
    }
}

/// Returns a config with `strategy_id` selected.
pub fn set_selected(config: &UserPromptConfig, strategy_id: &str) -> UserPromptConfig {
    UserPromptConfig {
        selected_strategy_id: strategy_id.to_string(),
        ..config.clone()
    }
}

/// Records (or extends) an override for a built-in strategy.
///
/// Ids that are not built-ins leave the config unchanged.
pub fn set_override(
    config: &UserPromptConfig,
    strategy_id: &str,
    patch: &StrategyOverride,
) -> UserPromptConfig {
    if built_in_strategy(strategy_id).is_none() {
        return config.clone();
    }

    let mut next = config.clone();
    let merged = match next.built_in_overrides.get(strategy_id) {
        Some(existing) => existing.merged_with(patch),
        None => patch.clone(),
    };
    next.built_in_overrides.insert(strategy_id.to_string(), merged);
    next
}

/// Drops the override for a built-in, restoring its embedded definition.
pub fn clear_override(config: &UserPromptConfig, strategy_id: &str) -> UserPromptConfig {
    let mut next = config.clone();
    next.built_in_overrides.remove(strategy_id);
    next
}

/// Returns a pristine copy of a built-in strategy.
pub fn reset_built_in(strategy_id: &str) -> Option<StrategyDefinition> {
    built_in_strategy(strategy_id).cloned()
}

/// Appends a custom strategy; returns the new config and the generated id.
pub fn add_custom(config: &UserPromptConfig, strategy: NewStrategy) -> (UserPromptConfig, String) {
    let now = Utc::now().timestamp_millis();
    let id = unique_custom_id(config, now);

    let definition = StrategyDefinition {
        id: id.clone(),
        name: strategy.name,
        description: strategy.description,
        system_prompt: strategy.system_prompt,
        user_prompt_template: strategy.user_prompt_template,
        temperature: strategy.temperature,
        max_tokens: strategy.max_tokens,
        is_built_in: false,
        is_editable: true,
        created_at: now,
        updated_at: now,
    };

    let mut next = config.clone();
    next.custom_strategies.push(definition);
    (next, id)
}

fn unique_custom_id(config: &UserPromptConfig, now: i64) -> String {
    let taken = |candidate: &str| config.custom_strategies.iter().any(|s| s.id == candidate);
    let mut id = format!("custom-{now}");
    let mut suffix = 1;
    while taken(&id) {
        id = format!("custom-{now}-{suffix}");
        suffix += 1;
    }
    id
}

/// Applies a patch to a custom strategy and bumps its update time.
pub fn update_custom(
    config: &UserPromptConfig,
    strategy_id: &str,
    patch: &StrategyOverride,
) -> UserPromptConfig {
    let now = Utc::now().timestamp_millis();
    UserPromptConfig {
        custom_strategies: config
            .custom_strategies
            .iter()
            .map(|s| {
                if s.id == strategy_id {
                    let mut updated = patch.apply_to(s);
                    updated.updated_at = now;
                    updated
                } else {
                    s.clone()
                }
            })
            .collect(),
        ..config.clone()
    }
}

/// Removes a custom strategy; resets the selection if it was selected.
pub fn delete_custom(config: &UserPromptConfig, strategy_id: &str) -> UserPromptConfig {
    let selected_strategy_id = if config.selected_strategy_id == strategy_id {
        DEFAULT_STRATEGY_ID.to_string()
    } else {
        config.selected_strategy_id.clone()
    };

    UserPromptConfig {
        selected_strategy_id,
        custom_strategies: config
            .custom_strategies
            .iter()
            .filter(|s| s.id != strategy_id)
            .cloned()
            .collect(),
        built_in_overrides: config.built_in_overrides.clone(),
    }
}

/// Checks a definition before it is stored or sent.
pub fn validate(strategy: &StrategyDefinition) -> Result<(), ApiError> {
    if strategy.name.trim().is_empty() {
        return Err(ApiError::Validation("Strategy name must not be empty".into()));
    }
    if strategy.system_prompt.trim().is_empty() {
        return Err(ApiError::Validation("System prompt must not be empty".into()));
    }
    if strategy.user_prompt_template.trim().is_empty() {
        return Err(ApiError::Validation(
            "User prompt template must not be empty".into(),
        ));
    }
    if !strategy.user_prompt_template.contains(INPUT_PLACEHOLDER) {
        return Err(ApiError::Validation(format!(
            "User prompt template must contain the {INPUT_PLACEHOLDER} placeholder"
        )));
    }
    if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&strategy.temperature) {
        return Err(ApiError::Validation(format!(
            "Temperature must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}"
        )));
    }
    if !(MIN_MAX_TOKENS..=MAX_MAX_TOKENS).contains(&strategy.max_tokens) {
        return Err(ApiError::Validation(format!(
            "Max tokens must be between {MIN_MAX_TOKENS} and {MAX_MAX_TOKENS}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_strategy(name: &str) -> NewStrategy {
        NewStrategy {
            name: name.to_string(),
            description: "custom strategy".to_string(),
            system_prompt: "Rewrite tersely.".to_string(),
            user_prompt_template: "Draft: {{input}}".to_string(),
            temperature: 0.2,
            max_tokens: 300,
        }
    }

    #[test]
    fn resolve_unknown_falls_back_to_general() {
        let strategy = resolve("does-not-exist", &UserPromptConfig::default());
        assert_eq!(strategy.id, "general");
    }

    #[test]
    fn resolve_prefers_custom_entry() {
        let (config, id) = add_custom(&UserPromptConfig::default(), new_strategy("Mine"));
        let strategy = resolve(&id, &config);
        assert_eq!(strategy.name, "Mine");
        assert!(!strategy.is_built_in);
    }

    #[test]
    fn override_round_trip_restores_original() {
        let config = UserPromptConfig::default();
        let original = resolve("coding", &config);

        let patch = StrategyOverride {
            system_prompt: Some("Be brief.".into()),
            temperature: Some(1.5),
            ..Default::default()
        };
        let patched_config = set_override(&config, "coding", &patch);
        let patched = resolve("coding", &patched_config);

        assert_eq!(patched, patch.apply_to(&original));
        assert_eq!(patched.system_prompt, "Be brief.");
        assert_eq!(patched.temperature, 1.5);
        assert_eq!(patched.user_prompt_template, original.user_prompt_template);

        let restored = resolve("coding", &clear_override(&patched_config, "coding"));
        assert_eq!(restored, original);
    }

    #[test]
    fn set_override_merges_with_existing_patch() {
        let first = StrategyOverride {
            name: Some("Renamed".into()),
            ..Default::default()
        };
        let second = StrategyOverride {
            max_tokens: Some(99),
            ..Default::default()
        };
        let config = set_override(&UserPromptConfig::default(), "writing", &first);
        let config = set_override(&config, "writing", &second);
        let strategy = resolve("writing", &config);
        assert_eq!(strategy.name, "Renamed");
        assert_eq!(strategy.max_tokens, 99);
    }

    #[test]
    fn set_override_ignores_non_built_in_ids() {
        let config = UserPromptConfig::default();
        let patch = StrategyOverride {
            name: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(set_override(&config, "custom-1", &patch), config);
    }

    #[test]
    fn list_all_orders_built_ins_before_custom() {
        let (config, id) = add_custom(&UserPromptConfig::default(), new_strategy("Mine"));
        let all = list_all(&config);
        assert_eq!(all.len(), built_in_strategies().len() + 1);
        assert_eq!(all.first().unwrap().id, "general");
        assert_eq!(all.last().unwrap().id, id);
    }

    #[test]
    fn list_all_applies_overrides() {
        let patch = StrategyOverride {
            name: Some("Overridden".into()),
            ..Default::default()
        };
        let config = set_override(&UserPromptConfig::default(), "general", &patch);
        assert_eq!(list_all(&config)[0].name, "Overridden");
    }

    #[test]
    fn add_custom_generates_distinct_ids() {
        let (config, first) = add_custom(&UserPromptConfig::default(), new_strategy("A"));
        let (config, second) = add_custom(&config, new_strategy("B"));
        assert_ne!(first, second);
        assert!(first.starts_with("custom-"));
        assert_eq!(config.custom_strategies.len(), 2);
    }

    #[test]
    fn add_custom_leaves_input_untouched() {
        let original = UserPromptConfig::default();
        let _ = add_custom(&original, new_strategy("A"));
        assert!(original.custom_strategies.is_empty());
    }

    #[test]
    fn update_custom_patches_only_target() {
        let (config, a) = add_custom(&UserPromptConfig::default(), new_strategy("A"));
        let (config, b) = add_custom(&config, new_strategy("B"));
        let patch = StrategyOverride {
            name: Some("A2".into()),
            ..Default::default()
        };
        let config = update_custom(&config, &a, &patch);
        assert_eq!(resolve(&a, &config).name, "A2");
        assert_eq!(resolve(&b, &config).name, "B");
    }

    #[test]
    fn delete_selected_custom_resets_selection() {
        let (config, id) = add_custom(&UserPromptConfig::default(), new_strategy("A"));
        let config = set_selected(&config, &id);
        let config = delete_custom(&config, &id);
        assert_eq!(config.selected_strategy_id, "general");
        assert!(config.custom_strategies.is_empty());
    }

    #[test]
    fn delete_other_custom_keeps_selection() {
        let (config, a) = add_custom(&UserPromptConfig::default(), new_strategy("A"));
        let (config, b) = add_custom(&config, new_strategy("B"));
        let config = set_selected(&config, &a);
        let config = delete_custom(&config, &b);
        assert_eq!(config.selected_strategy_id, a);
    }

    #[test]
    fn selected_follows_selection() {
        let config = set_selected(&UserPromptConfig::default(), "translation");
        assert_eq!(selected(&config).id, "translation");
    }

    #[test]
    fn search_matches_name_and_description() {
        let (config, _) = add_custom(&UserPromptConfig::default(), new_strategy("Email Polish"));
        let hits = search(&config, "email");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Email Polish");
        assert!(!search(&config, "翻译").is_empty());
    }

    #[test]
    fn build_params_replaces_every_placeholder() {
        let mut strategy = resolve("general", &UserPromptConfig::default());
        strategy.user_prompt_template = "{{input}} / {{input}}".into();
        let params = build_params("x", &strategy);
        assert_eq!(params.user_prompt, "x / x");
        assert_eq!(params.system_prompt, strategy.system_prompt);
    }

    #[test]
    fn build_params_does_not_escape_input() {
        let strategy = resolve("general", &UserPromptConfig::default());
        let params = build_params("$1 {{input}} <b>", &strategy);
        assert_eq!(params.user_prompt, "请优化以下提示词：\n\n$1 {{input}} <b>");
    }

    #[test]
    fn validate_rejects_missing_placeholder() {
        let mut strategy = resolve("general", &UserPromptConfig::default());
        strategy.user_prompt_template = "no placeholder here".into();
        assert!(matches!(validate(&strategy), Err(ApiError::Validation(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_numbers() {
        let mut strategy = resolve("general", &UserPromptConfig::default());
        strategy.temperature = 2.5;
        assert!(validate(&strategy).is_err());

        let mut strategy = resolve("general", &UserPromptConfig::default());
        strategy.max_tokens = 0;
        assert!(validate(&strategy).is_err());

        strategy.max_tokens = 8193;
        assert!(validate(&strategy).is_err());

        strategy.max_tokens = 8192;
        assert!(validate(&strategy).is_ok());
    }

    #[test]
    fn validate_rejects_blank_fields() {
        let mut strategy = resolve("general", &UserPromptConfig::default());
        strategy.name = "  ".into();
        assert!(validate(&strategy).is_err());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn substituted_prompt_contains_input_and_no_placeholder(
                input in "[a-zA-Z0-9 \\n\\p{Han}$\\\\]{0,200}",
                id in prop_oneof![
                    Just("general"),
                    Just("coding"),
                    Just("writing"),
                    Just("translation"),
                    Just("analysis"),
                    Just("creative"),
                ],
            ) {
                let strategy = resolve(id, &UserPromptConfig::default());
                let params = build_params(&input, &strategy);
                prop_assert!(params.user_prompt.contains(&input));
                prop_assert!(!params.user_prompt.contains(INPUT_PLACEHOLDER));
            }

            #[test]
            fn validate_requires_placeholder(
                template in "[a-zA-Z ]{1,80}",
                temperature in 0.0f32..=2.0,
                max_tokens in 1u32..=8192,
            ) {
                let mut strategy = resolve("general", &UserPromptConfig::default());
                strategy.user_prompt_template = template;
                strategy.temperature = temperature;
                strategy.max_tokens = max_tokens;
                prop_assert!(validate(&strategy).is_err());
            }
        }
    }
}
