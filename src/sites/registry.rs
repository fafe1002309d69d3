//! URL to site resolution over the embedded site table.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

use super::SiteDescriptor;
use crate::dom::parse_selector;

/// Embedded site table.
pub const SITES_YAML: &str = include_str!("../templates/sites.yaml");

#[derive(Deserialize)]
struct SiteTable {
    sites: Vec<SiteDescriptor>,
}

/// Parses the embedded table and checks every selector.
pub(crate) fn load_sites() -> Result<Vec<SiteDescriptor>> {
    let table: SiteTable =
        serde_yaml::from_str(SITES_YAML).context("Failed to parse embedded site table")?;

    for site in &table.sites {
        parse_selector(&site.input_selector)
            .with_context(|| format!("Invalid input selector for site '{}'", site.site_id))?;
        if let Some(ref container) = site.container_selector {
            parse_selector(container)
                .with_context(|| format!("Invalid container selector for site '{}'", site.site_id))?;
        }
    }

    Ok(table.sites)
}

static SITES: OnceLock<Vec<SiteDescriptor>> = OnceLock::new();

/// All supported sites in table order.
pub fn all_sites() -> &'static [SiteDescriptor] {
    SITES.get_or_init(|| {
        load_sites().unwrap_or_else(|e| {
            error!(error = %e, "Site table unavailable, no site will match");
            Vec::new()
        })
    })
}

/// Looks up a site by id.
pub fn site_by_id(site_id: &str) -> Option<&'static SiteDescriptor> {
    all_sites().iter().find(|s| s.site_id == site_id)
}

/// Resolves the site serving `url`.
///
/// Hosts are compared case-insensitively; the most specific (longest)
/// matching pattern wins. Unparseable URLs and URLs without a host resolve
/// to `None`.
pub fn resolve_for_url(url: &str) -> Option<&'static SiteDescriptor> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();

    let site = all_sites()
        .iter()
        .filter_map(|site| site.match_len(&host).map(|len| (len, site)))
        .max_by_key(|(len, _)| *len)
        .map(|(_, site)| site);

    match site {
        Some(site) => debug!(host = %host, site_id = %site.site_id, "Matched site"),
        None => debug!(host = %host, "No site matched"),
    }
    site
}
