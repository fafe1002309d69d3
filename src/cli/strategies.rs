//! Strategy listing commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::prompts::{self, StrategyDefinition};
use crate::utils::settings::Settings;

/// Strategy operations.
#[derive(Parser)]
pub struct StrategiesCommand {
    /// Strategies subcommand to execute.
    #[command(subcommand)]
    pub command: StrategiesSubcommands,
}

/// Strategies subcommands.
#[derive(Subcommand)]
pub enum StrategiesSubcommands {
    /// Lists built-in and custom strategies.
    List(ListCommand),
    /// Shows one strategy with overrides applied.
    Show(ShowCommand),
}

/// List command options.
#[derive(Parser)]
pub struct ListCommand {
    /// Only strategies whose name or description contains this keyword.
    #[arg(long)]
    pub search: Option<String>,
}

/// Show command options.
#[derive(Parser)]
pub struct ShowCommand {
    /// Strategy id (defaults to the saved selection).
    pub id: Option<String>,
}

impl StrategiesCommand {
    /// Executes the strategies command.
    pub fn execute(self) -> Result<()> {
        let settings = Settings::load()?;
        match self.command {
            StrategiesSubcommands::List(cmd) => cmd.execute(&settings),
            StrategiesSubcommands::Show(cmd) => cmd.execute(&settings),
        }
    }
}

impl ListCommand {
    /// Executes the list command.
    pub fn execute(self, settings: &Settings) -> Result<()> {
        let strategies = match self.search {
            Some(ref keyword) => prompts::search(&settings.prompts, keyword),
            None => prompts::list_all(&settings.prompts),
        };
        let selected = prompts::selected(&settings.prompts).id;
        for strategy in &strategies {
            println!("{}", format_row(strategy, strategy.id == selected));
        }
        Ok(())
    }
}

impl ShowCommand {
    /// Executes the show command.
    pub fn execute(self, settings: &Settings) -> Result<()> {
        let strategy = match self.id {
            Some(ref id) => prompts::resolve(id, &settings.prompts),
            None => prompts::selected(&settings.prompts),
        };
        let yaml = serde_yaml::to_string(&strategy).context("Failed to render strategy")?;
        print!("{yaml}");
        Ok(())
    }
}

fn format_row(strategy: &StrategyDefinition, selected: bool) -> String {
    let marker = if selected { "*" } else { " " };
    let origin = if strategy.is_built_in { "built-in" } else { "custom" };
    format!(
        "{marker} {:<20} {:<10} t={:.1} max={:<5} {}",
        strategy.id, origin, strategy.temperature, strategy.max_tokens, strategy.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::UserPromptConfig;

    #[test]
    fn row_format() {
        let general = prompts::resolve("general", &UserPromptConfig::default());
        insta::assert_snapshot!(format_row(&general, true), @"* general              built-in   t=0.7 max=2048  通用优化");
    }
}
