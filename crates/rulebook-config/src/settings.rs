//! Application settings structures.

use std::collections::HashMap;

use config::ConfigError;
use rulebook_core::types::Timeframe;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub backtest: BacktestSettings,
    /// Per-strategy overrides, keyed by registry name
    #[serde(default)]
    pub strategies: HashMap<String, serde_json::Value>,
}

impl AppConfig {
    /// Check values the deserialiser cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.validate()?;
        self.backtest.validate()?;

        for (name, value) in &self.strategies {
            if !value.is_object() {
                return Err(ConfigError::Message(format!(
                    "strategies.{} must be a table",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Configured overrides for `name`, `Null` when there are none.
    pub fn strategy_config(&self, name: &str) -> serde_json::Value {
        self.strategies
            .get(name)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_environment(),
        }
    }
}

fn default_app_name() -> String {
    "rulebook".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for daily-rotated log files; console only when unset
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            directory: None,
            file_prefix: default_file_prefix(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::Message(
                "logging.level must not be empty".to_string(),
            ));
        }
        if self.file_prefix.trim().is_empty() {
            return Err(ConfigError::Message(
                "logging.file_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "rulebook.log".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    #[serde(default = "default_capital")]
    pub default_capital: Decimal,
    /// Flat commission per fill
    #[serde(default)]
    pub commission: Decimal,
    #[serde(default = "default_slippage")]
    pub slippage_pct: Decimal,
    /// Percentage of equity committed per entry
    #[serde(default = "default_position_pct")]
    pub position_pct: Decimal,
    #[serde(default = "default_timeframe")]
    pub timeframe: Timeframe,
    #[serde(default = "default_true")]
    pub close_at_end: bool,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            default_capital: default_capital(),
            commission: Decimal::ZERO,
            slippage_pct: default_slippage(),
            position_pct: default_position_pct(),
            timeframe: default_timeframe(),
            close_at_end: true,
        }
    }
}

impl BacktestSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_capital <= Decimal::ZERO {
            return Err(ConfigError::Message(
                "backtest.default_capital must be positive".to_string(),
            ));
        }
        if self.commission < Decimal::ZERO || self.slippage_pct < Decimal::ZERO {
            return Err(ConfigError::Message(
                "backtest.commission and backtest.slippage_pct must not be negative".to_string(),
            ));
        }
        if self.slippage_pct >= dec!(100) {
            return Err(ConfigError::Message(
                "backtest.slippage_pct must be below 100".to_string(),
            ));
        }
        if self.position_pct <= Decimal::ZERO || self.position_pct > dec!(100) {
            return Err(ConfigError::Message(
                "backtest.position_pct must be in (0, 100]".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_capital() -> Decimal {
    dec!(100000)
}

fn default_slippage() -> Decimal {
    dec!(0.05)
}

fn default_position_pct() -> Decimal {
    dec!(95)
}

fn default_timeframe() -> Timeframe {
    Timeframe::Daily
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.app.name, "rulebook");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.backtest.position_pct, dec!(95));
        assert_eq!(config.backtest.timeframe, Timeframe::Daily);
    }

    #[test]
    fn test_invalid_backtest_settings() {
        let mut config = AppConfig::default();
        config.backtest.position_pct = dec!(150);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.backtest.default_capital = Decimal::ZERO;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.backtest.slippage_pct = dec!(-1);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.backtest.slippage_pct = dec!(100);
        assert!(config.validate().is_err());

        config.backtest.slippage_pct = dec!(99.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_strategy_overrides_must_be_tables() {
        let mut config = AppConfig::default();
        config
            .strategies
            .insert("hurst_trend".to_string(), serde_json::json!(5));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_strategy_config_lookup() {
        let mut config = AppConfig::default();
        config.strategies.insert(
            "hurst_trend".to_string(),
            serde_json::json!({ "hurst_period": 128 }),
        );

        assert_eq!(config.strategy_config("hurst_trend")["hurst_period"], 128);
        assert!(config.strategy_config("vhf_trend").is_null());
    }

    #[test]
    fn test_to_toml() {
        let rendered = AppConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[backtest]"));
        assert!(rendered.contains("timeframe = \"1d\""));
    }
}
