use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use inquire::{CustomType, Text};
use tracing::info;
use weather_core::{GatewayConfig, RawParameters, RuleCatalog, Validator, server};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-gateway", version, about = "Validating weather API gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP gateway.
    Serve {
        /// Config file; defaults to the platform config directory.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the listen address, e.g. "0.0.0.0:8080".
        #[arg(long)]
        bind: Option<String>,
    },

    /// Interactively edit the gateway configuration.
    Configure {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate a raw query string offline and print the sanitized form.
    Check {
        /// Query string without the leading '?', e.g. "key=...&unitGroup=US".
        query: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve { config, bind } => {
                let path = config_path(config)?;
                let mut cfg = GatewayConfig::load_from(&path)?;
                if let Some(bind) = bind {
                    cfg.server.bind = bind;
                }
                cfg.validate().context("Invalid gateway configuration")?;

                info!(config = %path.display(), "configuration loaded");
                server::serve(&cfg).await
            }
            Command::Configure { config } => {
                let path = config_path(config)?;
                let cfg = prompt_config(GatewayConfig::load_from(&path)?)?;
                cfg.save_to(&path)?;
                println!("Configuration saved to {}", path.display());
                Ok(())
            }
            Command::Check { query } => {
                let catalog = RuleCatalog::standard().context("Failed to build parameter catalog")?;
                let validator = Validator::new(Arc::new(catalog));

                let query = query.trim_start_matches('?');
                let sanitized = validator
                    .validate(&RawParameters::from_query(query))
                    .map_err(|e| anyhow!("Rejected: {e}"))?;

                println!("{}", sanitized.redacted_query());
                Ok(())
            }
        }
    }
}

fn config_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => GatewayConfig::config_file_path(),
    }
}

fn prompt_config(mut cfg: GatewayConfig) -> anyhow::Result<GatewayConfig> {
    let bind = Text::new("Listen address:")
        .with_default(&cfg.server.bind)
        .prompt()
        .context("Failed to read listen address")?;
    cfg.server.bind = bind;

    let base_url = Text::new("Upstream base URL:")
        .with_default(&cfg.upstream.base_url)
        .prompt()
        .context("Failed to read upstream base URL")?;
    cfg.upstream.base_url = base_url;

    cfg.upstream.timeout_secs = CustomType::<u64>::new("Upstream timeout (seconds):")
        .with_default(cfg.upstream.timeout_secs)
        .with_error_message("Please enter a whole number of seconds")
        .prompt()
        .context("Failed to read upstream timeout")?;

    cfg.validate()?;
    Ok(cfg)
}
