//! Configuration management.
//!
//! Settings are layered: a TOML file first, then `RULEBOOK__*` environment
//! variables (`RULEBOOK__BACKTEST__COMMISSION=1` sets `backtest.commission`).

pub mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat, Source};

pub use settings::{AppConfig, AppSettings, BacktestSettings, LogFormat, LoggingConfig};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "RULEBOOK";

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

fn build<S>(file: S, env: Environment) -> Result<AppConfig, ConfigError>
where
    S: Source + Send + Sync + 'static,
{
    let config: AppConfig = Config::builder()
        .add_source(file)
        .add_source(env)
        .build()?
        .try_deserialize()?;

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file, with environment overrides.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    build(File::from(path).required(true), environment())
}

/// Load configuration from TOML text, with environment overrides.
pub fn load_config_str(toml: &str) -> Result<AppConfig, ConfigError> {
    build(File::from_str(toml, FileFormat::Toml), environment())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rulebook_core::types::Timeframe;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
[app]
name = "rulebook-test"

[logging]
level = "debug"
format = "json"

[backtest]
default_capital = 50000
commission = 1.5
timeframe = "1h"

[strategies.hurst_trend]
hurst_period = 128
hurst_threshold = 0.6
"#;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn test_load_from_toml() {
        let config = build(File::from_str(SAMPLE, FileFormat::Toml), env(&[])).unwrap();

        assert_eq!(config.app.name, "rulebook-test");
        assert_eq!(config.app.environment, "development");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.backtest.default_capital, dec!(50000));
        assert_eq!(config.backtest.commission, dec!(1.5));
        assert_eq!(config.backtest.timeframe, Timeframe::Hour1);
        assert_eq!(config.backtest.position_pct, dec!(95));

        let hurst = config.strategy_config("hurst_trend");
        assert_eq!(hurst["hurst_period"], 128);
        assert_eq!(hurst["hurst_threshold"], 0.6);
    }

    #[test]
    fn test_environment_overrides_file() {
        let config = build(
            File::from_str(SAMPLE, FileFormat::Toml),
            env(&[
                ("RULEBOOK__LOGGING__LEVEL", "warn"),
                ("RULEBOOK__BACKTEST__POSITION_PCT", "50"),
                ("RULEBOOK__STRATEGIES__HURST_TREND__HURST_PERIOD", "64"),
            ]),
        )
        .unwrap();

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.backtest.position_pct, dec!(50));
        assert_eq!(config.strategy_config("hurst_trend")["hurst_period"], 64);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = build(File::from_str("", FileFormat::Toml), env(&[])).unwrap();
        assert_eq!(config.backtest.default_capital, dec!(100000));
        assert!(config.strategies.is_empty());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = build(
            File::from_str("[backtest]\nposition_pct = 0\n", FileFormat::Toml),
            env(&[]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(load_config(Path::new("/nonexistent/rulebook.toml")).is_err());
    }
}
