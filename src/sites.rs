//! Supported chat sites: the descriptor table and per-site input access.

pub mod adapter;
pub mod registry;

use serde::{Deserialize, Serialize};

pub use adapter::SiteAdapter;
pub use registry::{all_sites, resolve_for_url, site_by_id};

/// How a site's chat input stores its text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// A form control read and written through its `value` property.
    Textarea,
    /// A rich-text node read and written through its text content.
    #[serde(rename = "contenteditable")]
    ContentEditable,
}

/// Static description of one supported site.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDescriptor {
    /// Stable identifier, e.g. `chatgpt`.
    pub site_id: String,
    /// Display name.
    pub site_name: String,
    /// Hosts (and their subdomains) served by this site.
    pub host_patterns: Vec<String>,
    /// Selector for the chat input.
    pub input_selector: String,
    /// Selector for the ancestor the control group is attached to.
    #[serde(default)]
    pub container_selector: Option<String>,
    /// Input widget flavour.
    pub input_kind: InputKind,
}

impl SiteDescriptor {
    /// Length of the longest pattern matching `host`, if any.
    pub fn match_len(&self, host: &str) -> Option<usize> {
        self.host_patterns
            .iter()
            .filter(|pattern| host_matches(host, pattern))
            .map(String::len)
            .max()
    }
}

/// Exact or subdomain match of `host` against `pattern`.
pub fn host_matches(host: &str, pattern: &str) -> bool {
    let pattern = pattern.trim_start_matches('.');
    host == pattern
        || host
            .strip_suffix(pattern)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_matching_respects_label_boundaries() {
        assert!(host_matches("chatgpt.com", "chatgpt.com"));
        assert!(host_matches("www.chatgpt.com", "chatgpt.com"));
        assert!(!host_matches("notchatgpt.com", "chatgpt.com"));
        assert!(!host_matches("qwen.ai", "z.ai"));
        assert!(host_matches("chat.z.ai", "z.ai"));
    }

    #[test]
    fn input_kind_serde_names() {
        let kind: InputKind = serde_yaml::from_str("contenteditable").unwrap();
        assert_eq!(kind, InputKind::ContentEditable);
        let kind: InputKind = serde_yaml::from_str("textarea").unwrap();
        assert_eq!(kind, InputKind::Textarea);
    }
}
