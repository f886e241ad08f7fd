//! List strategies command.

use anyhow::Result;
use rulebook_config::AppConfig;
use rulebook_strategies::{merge_config, StrategyRegistry};

pub fn run(config: &AppConfig) -> Result<()> {
    let registry = StrategyRegistry::new();

    println!("Available Strategies");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for info in registry.list() {
        let effective = merge_config(&info.default_config, config.strategy_config(&info.key));

        println!("  {} ({})", info.name, info.key);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        println!("  Config: {}", serde_json::to_string(&effective)?);
        println!();
    }

    println!("Use --strategy <name> to select a strategy.");
    println!();
    println!("Strategy names: {}", registry.names().join(", "));

    Ok(())
}
