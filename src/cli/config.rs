//! Configuration-related CLI commands.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use crate::api::{test_api_connection, ProviderRegistry};
use crate::utils::preflight::check_provider_credentials;
use crate::utils::settings::Settings;

/// Configuration operations.
#[derive(Parser)]
pub struct ConfigCommand {
    /// Configuration subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Sends a minimal request to the configured provider.
    TestConnection(TestConnectionCommand),
    /// Prints the settings file location.
    Path(PathCommand),
}

/// Test-connection command options.
#[derive(Parser)]
pub struct TestConnectionCommand {}

/// Path command options.
#[derive(Parser)]
pub struct PathCommand {}

impl ConfigCommand {
    /// Executes the config command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            ConfigSubcommands::TestConnection(cmd) => cmd.execute().await,
            ConfigSubcommands::Path(cmd) => cmd.execute(),
        }
    }
}

impl TestConnectionCommand {
    /// Executes the test-connection command.
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::load()?;
        let credentials = check_provider_credentials(&settings)?;
        eprintln!(
            "Testing {} at {} (model: {})",
            credentials.family, credentials.config.endpoint, credentials.config.model
        );

        let registry = ProviderRegistry::with_defaults()?;
        let report = test_api_connection(&registry, &credentials.config).await;
        if !report.success {
            bail!("{}", report.message);
        }
        println!("{}", report.message);
        Ok(())
    }
}

impl PathCommand {
    /// Executes the path command.
    pub fn execute(self) -> Result<()> {
        println!("{}", Settings::get_settings_path()?.display());
        Ok(())
    }
}
