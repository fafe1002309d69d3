//! CLI interface for autoprompt.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod config;
pub mod optimize;
pub mod sites;
pub mod strategies;

/// autoprompt: rewrites prompts for LLM chat front-ends.
#[derive(Parser)]
#[command(name = "autoprompt")]
#[command(about = "Prompt optimization for LLM chat front-ends", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// Optimizes a prompt with the configured provider.
    Optimize(optimize::OptimizeCommand),
    /// Lists and inspects optimization strategies.
    Strategies(strategies::StrategiesCommand),
    /// Supported chat sites.
    Sites(sites::SitesCommand),
    /// Settings file and provider connection.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Optimize(cmd) => cmd.execute().await,
            Commands::Strategies(cmd) => cmd.execute(),
            Commands::Sites(cmd) => cmd.execute(),
            Commands::Config(cmd) => cmd.execute().await,
        }
    }
}
