//! Site table commands.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::sites::{all_sites, resolve_for_url, InputKind, SiteDescriptor};

/// Site operations.
#[derive(Parser)]
pub struct SitesCommand {
    /// Sites subcommand to execute.
    #[command(subcommand)]
    pub command: SitesSubcommands,
}

/// Sites subcommands.
#[derive(Subcommand)]
pub enum SitesSubcommands {
    /// Lists every supported site.
    List(ListCommand),
    /// Shows which site serves a URL.
    Resolve(ResolveCommand),
}

/// List command options.
#[derive(Parser)]
pub struct ListCommand {}

/// Resolve command options.
#[derive(Parser)]
pub struct ResolveCommand {
    /// Page URL.
    pub url: String,
}

impl SitesCommand {
    /// Executes the sites command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            SitesSubcommands::List(cmd) => cmd.execute(),
            SitesSubcommands::Resolve(cmd) => cmd.execute(),
        }
    }
}

impl ListCommand {
    /// Executes the list command.
    pub fn execute(self) -> Result<()> {
        for site in all_sites() {
            println!("{:<15} {:<12} {}", site.site_id, site.site_name, site.host_patterns.join(", "));
        }
        Ok(())
    }
}

impl ResolveCommand {
    /// Executes the resolve command.
    pub fn execute(self) -> Result<()> {
        match resolve_for_url(&self.url) {
            Some(site) => print!("{}", describe(site)),
            None => println!("No supported site matches {}", self.url),
        }
        Ok(())
    }
}

fn describe(site: &SiteDescriptor) -> String {
    let kind = match site.input_kind {
        InputKind::Textarea => "textarea",
        InputKind::ContentEditable => "contenteditable",
    };
    format!(
        "site:      {} ({})\ninput:     {}\ncontainer: {}\nkind:      {}\n",
        site.site_id,
        site.site_name,
        site.input_selector,
        site.container_selector.as_deref().unwrap_or("(input parent)"),
        kind
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_claude() {
        let site = resolve_for_url("https://claude.ai/new").unwrap();
        insta::assert_snapshot!(describe(site), @r###"
        site:      claude (Claude)
        input:     div[contenteditable="true"][data-testid="chat-input"]
        container: div[class*="chat-input-container"]
        kind:      contenteditable
        "###);
    }
}
