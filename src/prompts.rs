//! Optimization strategies: built-in definitions, user overrides and the
//! resolver that merges them.

pub mod built_in;
pub mod manager;
pub mod strategy;

pub use built_in::{built_in_strategies, built_in_strategy, default_strategy, DEFAULT_STRATEGY_ID};
pub use manager::{
    add_custom, build_params, clear_override, delete_custom, list_all, reset_built_in, resolve,
    search, selected, set_override, set_selected, update_custom, validate,
};
pub use strategy::{
    NewStrategy, OptimizationParams, StrategyDefinition, StrategyOverride, UserPromptConfig,
    INPUT_PLACEHOLDER,
};
