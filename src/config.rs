//! Configuration snapshots handed to the injector.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::ProviderConfig;
use crate::prompts::UserPromptConfig;

/// Smallest accepted history capacity.
pub const MIN_HISTORY_COUNT: usize = 10;
/// Largest accepted history capacity.
pub const MAX_HISTORY_COUNT: usize = 100;
/// Default history capacity.
pub const DEFAULT_HISTORY_COUNT: usize = 50;

static TEMPLATE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").unwrap());

/// Application-level switches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Write optimized text straight into the input instead of previewing.
    pub skip_preview: bool,
    /// Capacity of the optimization history.
    pub max_history_count: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            skip_preview: false,
            max_history_count: DEFAULT_HISTORY_COUNT,
        }
    }
}

impl AppSettings {
    /// History capacity clamped to the accepted range.
    #[must_use]
    pub fn history_capacity(&self) -> usize {
        self.max_history_count
            .clamp(MIN_HISTORY_COUNT, MAX_HISTORY_COUNT)
    }
}

/// A saved prompt snippet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    /// Stable identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Free-form grouping label.
    #[serde(default)]
    pub category: String,
    /// Snippet text; `{name}` marks a fill-in slot.
    pub content: String,
    /// Creation time, epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
    /// Last update time, epoch milliseconds.
    #[serde(default)]
    pub updated_at: i64,
}

impl PromptTemplate {
    /// Content with every `{name}` slot reduced to `name`.
    #[must_use]
    pub fn insertion_text(&self) -> String {
        strip_placeholders(&self.content)
    }
}

/// Replaces `{name}` slots with their bare names.
pub fn strip_placeholders(content: &str) -> String {
    TEMPLATE_PLACEHOLDER.replace_all(content, "$1").into_owned()
}

/// Everything an injection instance needs, as one cloned snapshot.
///
/// Every part falls back to its default when missing from the source.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InjectContext {
    /// Provider credentials and routing.
    pub provider: ProviderConfig,
    /// Strategy selection, overrides and custom strategies.
    pub prompts: UserPromptConfig,
    /// Saved snippets.
    pub templates: Vec<PromptTemplate>,
    /// Write results directly instead of previewing.
    pub skip_preview: bool,
}
