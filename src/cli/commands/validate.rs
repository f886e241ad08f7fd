//! Validate configuration command.

use std::path::Path;

use anyhow::Result;
use rulebook_config::AppConfig;
use rulebook_strategies::{merge_config, StrategyRegistry};

pub fn run(config_path: &Path, config: &AppConfig) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);
    if !config_path.exists() {
        println!("File not found, using built-in defaults");
    }

    // Every strategy table must name a known strategy and build
    let registry = StrategyRegistry::new();
    let mut names: Vec<&String> = config.strategies.keys().collect();
    names.sort();
    for name in &names {
        let info = registry.get(name).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown strategy '{}' in [strategies]. Available: {}",
                name,
                registry.names().join(", ")
            )
        })?;
        let merged = merge_config(&info.default_config, config.strategy_config(name));
        registry
            .create(name, merged, vec!["CHECK".to_string()])
            .map_err(|e| anyhow::anyhow!("Invalid [strategies.{}]: {}", name, e))?;
    }

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!("Initial capital: {}", config.backtest.default_capital);
    println!("Commission: {}", config.backtest.commission);
    println!("Slippage: {}%", config.backtest.slippage_pct);
    println!("Position size: {}%", config.backtest.position_pct);
    println!("Timeframe: {}", config.backtest.timeframe);
    println!(
        "Strategy overrides: {}",
        if names.is_empty() {
            "none".to_string()
        } else {
            names.iter().map(|n| n.as_str()).collect::<Vec<_>>().join(", ")
        }
    );
    println!();
    println!("{}", config.to_toml()?);

    Ok(())
}
