//! Built-in strategies loaded from the embedded YAML table.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::error;

use super::manager::validate;
use super::strategy::StrategyDefinition;

/// Id of the strategy used when nothing else matches.
pub const DEFAULT_STRATEGY_ID: &str = "general";

/// Embedded strategy table.
pub const STRATEGIES_YAML: &str = include_str!("../templates/strategies.yaml");

#[derive(Deserialize)]
struct StrategyTable {
    strategies: Vec<StrategyDefinition>,
}

/// Parses and validates the embedded strategy table.
pub(crate) fn load_built_ins() -> Result<Vec<StrategyDefinition>> {
    let table: StrategyTable =
        serde_yaml::from_str(STRATEGIES_YAML).context("Failed to parse embedded strategies")?;

    table
        .strategies
        .into_iter()
        .map(|mut strategy| {
            strategy.is_built_in = true;
            strategy.is_editable = true;
            strategy.created_at = 0;
            strategy.updated_at = 0;
            validate(&strategy)
                .with_context(|| format!("Invalid built-in strategy '{}'", strategy.id))?;
            Ok(strategy)
        })
        .collect()
}

static BUILT_INS: OnceLock<Vec<StrategyDefinition>> = OnceLock::new();

/// Returns all built-in strategies in table order.
pub fn built_in_strategies() -> &'static [StrategyDefinition] {
    BUILT_INS.get_or_init(|| {
        load_built_ins().unwrap_or_else(|e| {
            error!(error = %e, "Falling back to the hard-coded strategy");
            vec![fallback_strategy()]
        })
    })
}

/// Looks up a built-in strategy by id.
pub fn built_in_strategy(id: &str) -> Option<&'static StrategyDefinition> {
    built_in_strategies().iter().find(|s| s.id == id)
}

/// Returns the default built-in strategy, or the hard-coded fallback.
pub fn default_strategy() -> StrategyDefinition {
    built_in_strategy(DEFAULT_STRATEGY_ID)
        .cloned()
        .unwrap_or_else(fallback_strategy)
}

/// Strategy compiled into the binary, independent of the YAML table.
pub(crate) fn fallback_strategy() -> StrategyDefinition {
    StrategyDefinition {
        id: DEFAULT_STRATEGY_ID.to_string(),
        name: "通用优化".to_string(),
        description: "适用于大多数场景的通用提示词优化".to_string(),
        system_prompt: "你是一位专业的提示词优化专家。请直接输出优化后的提示词，不要添加解释或额外的内容。"
            .to_string(),
        user_prompt_template: "请优化以下提示词：\n\n{{input}}".to_string(),
        temperature: 0.7,
        max_tokens: 2048,
        is_built_in: true,
        is_editable: true,
        created_at: 0,
        updated_at: 0,
    }
}
