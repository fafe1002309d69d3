//! CSS selector parsing, backed by `scraper`.

use scraper::Selector;

use super::DomError;

/// Parses a CSS selector list.
pub fn parse_selector(source: &str) -> Result<Selector, DomError> {
    Selector::parse(source).map_err(|e| DomError::InvalidSelector(format!("{source}: {e}")))
}
