//! Rule-based trading CLI application.

mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use rulebook_config::{load_config, load_config_str, AppConfig, LogFormat};
use rulebook_monitor::{setup_logging, FileLogging};

/// Load the configuration file, or defaults plus environment when it is absent.
fn load_settings(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        load_config(path).with_context(|| format!("Failed to load config {}", path.display()))
    } else {
        load_config_str("").context("Failed to load default config")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_settings(&cli.config)?;

    // Setup logging
    let level = cli
        .log_level
        .map(|l| l.as_str().to_string())
        .unwrap_or_else(|| config.logging.level.clone());
    let json = cli.json_logs || config.logging.format == LogFormat::Json;
    let file = config.logging.directory.as_ref().map(|dir| FileLogging {
        directory: dir.into(),
        prefix: config.logging.file_prefix.clone(),
    });
    let _guard = setup_logging(&level, json, file.as_ref())?;

    // Execute command
    match cli.command {
        Commands::Backtest(args) => cli::commands::backtest::run(args, &config).await,
        Commands::Hurst(args) => cli::commands::hurst::run(args).await,
        Commands::Strategies => cli::commands::strategies::run(&config),
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config, &config),
    }
}
