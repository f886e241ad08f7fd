//! Strategy registry for dynamic strategy loading.

use std::collections::BTreeMap;

use rulebook_core::{error::StrategyError, traits::Strategy, traits::StrategyConfig};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    HmmRegimeConfig, HmmRegimeStrategy, HurstTrendConfig, HurstTrendStrategy, KalmanFilterConfig,
    KalmanFilterStrategy, VhfTrendConfig, VhfTrendStrategy,
};

/// Information about a registered strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Registry key
    pub key: String,
    /// Display name
    pub name: String,
    pub description: String,
    /// Default configuration as JSON
    pub default_config: serde_json::Value,
}

/// Registry for available trading strategies.
pub struct StrategyRegistry {
    strategies: BTreeMap<String, StrategyInfo>,
}

fn info<C: Serialize + Default>(key: &str, name: &str, description: &str) -> StrategyInfo {
    StrategyInfo {
        key: key.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        default_config: serde_json::to_value(C::default()).unwrap_or_default(),
    }
}

/// Overlay `overrides` onto `defaults`, key by key, so partial configs work.
pub fn merge_config(
    defaults: &serde_json::Value,
    overrides: serde_json::Value,
) -> serde_json::Value {
    match (defaults, overrides) {
        (defaults, serde_json::Value::Null) => defaults.clone(),
        (serde_json::Value::Object(base), serde_json::Value::Object(patch)) => {
            let mut merged = base.clone();
            for (key, value) in patch {
                let value = match merged.get(&key) {
                    Some(existing) => merge_config(existing, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            serde_json::Value::Object(merged)
        }
        (_, overrides) => overrides,
    }
}

fn parse<C>(config: serde_json::Value, symbols: Vec<String>) -> Result<C, StrategyError>
where
    C: StrategyConfig + DeserializeOwned + WithSymbols,
{
    let mut config: C = serde_json::from_value(config)
        .map_err(|e| StrategyError::InvalidConfig(e.to_string()))?;
    config.set_symbols(symbols);
    config.validate()?;
    Ok(config)
}

/// Configs that carry their own symbol list.
trait WithSymbols {
    fn set_symbols(&mut self, symbols: Vec<String>);
}

macro_rules! with_symbols {
    ($($config:ty),*) => {
        $(impl WithSymbols for $config {
            fn set_symbols(&mut self, symbols: Vec<String>) {
                self.symbols = symbols;
            }
        })*
    };
}

with_symbols!(HurstTrendConfig, KalmanFilterConfig, VhfTrendConfig, HmmRegimeConfig);

impl StrategyRegistry {
    /// Create a new strategy registry with all built-in strategies.
    pub fn new() -> Self {
        let strategies = [
            info::<HurstTrendConfig>(
                "hurst_trend",
                "Hurst Trend",
                "Follows the SMA direction while the Hurst exponent signals a persistent trend",
            ),
            info::<KalmanFilterConfig>(
                "kalman_filter",
                "Kalman Filter",
                "Trades closes crossing a Kalman-filtered price estimate",
            ),
            info::<VhfTrendConfig>(
                "vhf_trend",
                "VHF Trend",
                "Trades the SMA direction only when the Vertical Horizontal Filter shows a trend",
            ),
            info::<HmmRegimeConfig>(
                "hmm_regime",
                "HMM Regime",
                "Holds the exposure matching the Viterbi-decoded bullish/neutral/bearish regime",
            ),
        ]
        .into_iter()
        .map(|info| (info.key.clone(), info))
        .collect();

        Self { strategies }
    }

    /// List all available strategies, ordered by key.
    pub fn list(&self) -> Vec<&StrategyInfo> {
        self.strategies.values().collect()
    }

    /// Get strategy info by key.
    pub fn get(&self, name: &str) -> Option<&StrategyInfo> {
        self.strategies.get(name)
    }

    /// Check if a strategy exists.
    pub fn exists(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Get all strategy keys.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    /// Create a strategy instance from configuration.
    ///
    /// `config` may be partial; missing fields keep their defaults. The
    /// `symbols` argument always replaces whatever symbols the config lists.
    pub fn create(
        &self,
        name: &str,
        config: serde_json::Value,
        symbols: Vec<String>,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        let info = self
            .get(name)
            .ok_or_else(|| StrategyError::NotFound(name.to_string()))?;
        let config = merge_config(&info.default_config, config);

        match name {
            "hurst_trend" => Ok(Box::new(HurstTrendStrategy::new(parse(config, symbols)?))),
            "kalman_filter" => Ok(Box::new(KalmanFilterStrategy::new(parse(
                config, symbols,
            )?))),
            "vhf_trend" => Ok(Box::new(VhfTrendStrategy::new(parse(config, symbols)?))),
            "hmm_regime" => Ok(Box::new(HmmRegimeStrategy::new(parse(config, symbols)?)?)),
            _ => Err(StrategyError::NotFound(name.to_string())),
        }
    }

    /// Create a strategy with default configuration.
    pub fn create_default(
        &self,
        name: &str,
        symbols: Vec<String>,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        self.create(name, serde_json::Value::Null, symbols)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aapl() -> Vec<String> {
        vec!["AAPL".to_string()]
    }

    #[test]
    fn test_registry_list() {
        let registry = StrategyRegistry::new();
        assert_eq!(registry.list().len(), 4);
        assert_eq!(
            registry.names(),
            vec!["hmm_regime", "hurst_trend", "kalman_filter", "vhf_trend"]
        );
    }

    #[test]
    fn test_registry_get() {
        let registry = StrategyRegistry::new();

        let info = registry.get("hurst_trend").unwrap();
        assert_eq!(info.name, "Hurst Trend");
        assert_eq!(info.default_config["hurst_threshold"], 0.55);
        assert!(registry.exists("vhf_trend"));
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_create_every_default() {
        let registry = StrategyRegistry::new();

        for name in registry.names() {
            let strategy = registry.create_default(name, aapl()).unwrap();
            assert_eq!(strategy.name(), registry.get(name).unwrap().name);
            assert_eq!(strategy.symbols(), &["AAPL".to_string()]);
        }
    }

    #[test]
    fn test_create_with_partial_config() {
        let registry = StrategyRegistry::new();

        let config = serde_json::json!({
            "hurst_period": 128,
            "protection": { "take_profit_pct": 4.0 }
        });
        let strategy = registry.create("hurst_trend", config, aapl()).unwrap();
        assert_eq!(strategy.warmup_period(), 128);
        assert_eq!(strategy.state().custom["hurst_threshold"], 0.55);
    }

    #[test]
    fn test_create_rejects_invalid_config() {
        let registry = StrategyRegistry::new();

        let config = serde_json::json!({ "vhf_threshold": 2.0 });
        assert!(matches!(
            registry.create("vhf_trend", config, aapl()),
            Err(StrategyError::InvalidConfig(_))
        ));

        let config = serde_json::json!({ "window": 1 });
        assert!(matches!(
            registry.create("hmm_regime", config, aapl()),
            Err(StrategyError::Indicator(_))
        ));

        assert!(registry.create_default("hurst_trend", vec![]).is_err());
    }

    #[test]
    fn test_create_unknown_strategy() {
        let registry = StrategyRegistry::new();

        let result = registry.create_default("unknown", aapl());
        assert!(matches!(result, Err(StrategyError::NotFound(_))));
    }

    #[test]
    fn test_merge_config_layers() {
        let defaults = serde_json::json!({
            "period": 100,
            "protection": { "stop_loss_pct": 2.0, "take_profit_pct": null }
        });

        let merged = merge_config(
            &defaults,
            serde_json::json!({ "protection": { "take_profit_pct": 4.0 } }),
        );
        assert_eq!(merged["period"], 100);
        assert_eq!(merged["protection"]["stop_loss_pct"], 2.0);
        assert_eq!(merged["protection"]["take_profit_pct"], 4.0);

        assert_eq!(merge_config(&defaults, serde_json::Value::Null), defaults);
    }
}
