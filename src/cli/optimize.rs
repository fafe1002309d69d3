//! The `optimize` command.

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{OptimizeOptions, Optimizer, ProviderRegistry};
use crate::history::{append_bounded, HistoryItem};
use crate::prompts::{self, built_in_strategy};
use crate::utils::preflight::check_provider_credentials;
use crate::utils::settings::Settings;

/// Site id recorded for optimizations run from the command line.
const CLI_SITE_ID: &str = "cli";

/// Optimizes a prompt with the configured provider.
#[derive(Parser)]
pub struct OptimizeCommand {
    /// Prompt to optimize (read from stdin when omitted).
    pub text: Option<String>,

    /// Strategy id to use instead of the saved selection.
    #[arg(long, short = 's')]
    pub strategy: Option<String>,

    /// Per-attempt timeout in milliseconds.
    #[arg(long, default_value_t = 60_000)]
    pub timeout_ms: u64,

    /// Extra attempts after a failed call.
    #[arg(long, default_value_t = 2)]
    pub retries: u32,

    /// Prints only the optimized text and records it in the history.
    #[arg(long)]
    pub apply: bool,
}

impl OptimizeCommand {
    /// Executes the optimize command.
    pub async fn execute(self) -> Result<()> {
        let settings_path = Settings::get_settings_path()?;
        let mut settings = Settings::load_from_path(&settings_path)?;
        let credentials = check_provider_credentials(&settings)?;

        let text = match self.text {
            Some(ref text) => text.clone(),
            None => read_stdin()?,
        };
        if text.trim().is_empty() {
            bail!("Please enter a prompt to optimize");
        }

        let mut prompt_config = settings.prompts.clone();
        if let Some(ref id) = self.strategy {
            let known = built_in_strategy(id).is_some()
                || prompt_config.custom_strategies.iter().any(|s| &s.id == id);
            if !known {
                bail!("Unknown strategy '{id}'. Run `autoprompt strategies list` to see available ids.");
            }
            prompt_config = prompts::set_selected(&prompt_config, id);
        }

        eprintln!(
            "Optimizing with {} (model: {}, strategy: {})",
            credentials.family,
            credentials.config.model,
            prompts::selected(&prompt_config).name
        );

        let registry = ProviderRegistry::with_defaults()?;
        let optimizer = Optimizer::new(Arc::new(registry));
        let options = OptimizeOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            retry_count: self.retries,
        };

        let cancel = CancellationToken::new();
        let ctrl_c = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    debug!("Interrupt received, cancelling optimization");
                    cancel.cancel();
                }
            })
        };

        let result = optimizer
            .optimize(&text, &credentials.config, &prompt_config, &options, &cancel)
            .await;
        ctrl_c.abort();

        if cancel.is_cancelled() {
            bail!("Optimization cancelled");
        }
        let optimized = match result.optimized_text {
            Some(optimized) if result.success => optimized,
            _ => bail!(
                "{}",
                result
                    .error_message
                    .unwrap_or_else(|| "Optimization failed".to_string())
            ),
        };

        if let Some(usage) = result.usage {
            debug!(?usage, "Token usage");
        }

        if self.apply {
            let capacity = settings.app.history_capacity();
            settings.history = append_bounded(
                &settings.history,
                HistoryItem::now(text.trim(), optimized.as_str(), CLI_SITE_ID),
                capacity,
            );
            settings.save_to_path(&settings_path)?;
            println!("{optimized}");
        } else {
            println!("Original:\n{}\n", text.trim());
            println!("Optimized:\n{optimized}");
        }

        Ok(())
    }
}

fn read_stdin() -> Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        bail!("No prompt given. Pass it as an argument or pipe it on stdin.");
    }
    let mut buffer = String::new();
    stdin
        .lock()
        .read_to_string(&mut buffer)
        .context("Failed to read prompt from stdin")?;
    Ok(buffer)
}
