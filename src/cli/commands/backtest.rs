//! Backtest command implementation.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rulebook_backtest::{BacktestConfig, BacktestEngine};
use rulebook_config::AppConfig;
use rulebook_core::traits::DataSource;
use rulebook_core::types::{Bar, Timeframe};
use rulebook_data::CsvDataSource;
use rulebook_strategies::{merge_config, StrategyRegistry};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::cli::{BacktestArgs, OutputFormat};

pub async fn run(args: BacktestArgs, config: &AppConfig) -> Result<()> {
    info!("Starting backtest for strategy: {}", args.strategy);

    let registry = StrategyRegistry::new();
    if !registry.exists(&args.strategy) {
        anyhow::bail!(
            "Unknown strategy '{}'. Available: {}",
            args.strategy,
            registry.names().join(", ")
        );
    }

    let source = CsvDataSource::new(&args.data).with_context(|| {
        format!(
            "Data path '{}' does not exist. Provide a CSV file or directory containing CSV files",
            args.data.display()
        )
    })?;
    let symbols = resolve_symbols(&source, &args.symbols)?;

    // Strategy config: registry defaults, then config file, then command line
    let overrides = match &args.strategy_config {
        Some(raw) => parse_strategy_config(raw)?,
        None => serde_json::Value::Null,
    };
    let strategy_config = merge_config(&config.strategy_config(&args.strategy), overrides);
    let mut strategy = registry
        .create(&args.strategy, strategy_config, symbols.clone())
        .context("Failed to create strategy")?;

    let timeframe = match &args.timeframe {
        Some(tf) => Timeframe::from_str(tf)?,
        None => config.backtest.timeframe,
    };
    let data = load_data(&source, &symbols, timeframe, &args).await?;

    let initial_capital = match args.capital {
        Some(capital) => Decimal::try_from(capital).context("Invalid capital")?,
        None => config.backtest.default_capital,
    };
    let backtest_config = BacktestConfig {
        initial_capital,
        commission: config.backtest.commission,
        slippage_pct: config.backtest.slippage_pct,
        position_pct: config.backtest.position_pct,
        timeframe,
        close_at_end: config.backtest.close_at_end,
        ..BacktestConfig::default()
    };

    let engine = BacktestEngine::new(backtest_config);
    let report = engine.run(strategy.as_mut(), data);

    match args.output {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => println!("{}", report.summary()),
    }

    if let Some(save_path) = &args.save {
        std::fs::write(save_path, report.to_json()?)
            .with_context(|| format!("Failed to write {}", save_path.display()))?;
        info!("Results saved to {:?}", save_path);
    }

    if let Some(csv_path) = &args.equity_csv {
        std::fs::write(csv_path, report.equity_to_csv())
            .with_context(|| format!("Failed to write {}", csv_path.display()))?;
        info!("Equity curve saved to {:?}", csv_path);
    }

    Ok(())
}

/// Symbols from the command line, or every CSV in a data directory, or the
/// file stem of a single data file.
fn resolve_symbols(source: &CsvDataSource, requested: &[String]) -> Result<Vec<String>> {
    if !requested.is_empty() {
        return Ok(requested.to_vec());
    }

    let available = source.available_symbols()?;
    if !available.is_empty() {
        return Ok(available);
    }

    source
        .path()
        .file_stem()
        .map(|stem| vec![stem.to_string_lossy().to_uppercase()])
        .context("No symbols given and none found in the data path")
}

/// Inline JSON, or the contents of a JSON file.
fn parse_strategy_config(raw: &str) -> Result<serde_json::Value> {
    let path = Path::new(raw);
    let text = if path.is_file() {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read strategy config {}", path.display()))?
    } else {
        raw.to_string()
    };
    serde_json::from_str(&text).context("Strategy config is not valid JSON")
}

fn parse_date(date: &str, time: NaiveTime) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", date))?;
    Ok(date.and_time(time).and_utc())
}

async fn load_data(
    source: &CsvDataSource,
    symbols: &[String],
    timeframe: Timeframe,
    args: &BacktestArgs,
) -> Result<HashMap<String, Vec<Bar>>> {
    let start = match &args.start {
        Some(date) => parse_date(date, NaiveTime::MIN)?,
        None => DateTime::UNIX_EPOCH,
    };
    let end = match &args.end {
        Some(date) => {
            let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
                .context("Invalid end-of-day time")?;
            parse_date(date, end_of_day)?
        }
        None => DateTime::<Utc>::MAX_UTC,
    };

    let mut data = HashMap::new();
    for symbol in symbols {
        let bars = source
            .get_historical_bars(symbol, timeframe, start, end)
            .await
            .with_context(|| format!("Failed to load data for {}", symbol))?;
        if bars.is_empty() {
            warn!(symbol = %symbol, "Skipping symbol without data");
            continue;
        }
        data.insert(symbol.clone(), bars);
    }

    if data.is_empty() {
        anyhow::bail!("No data loaded");
    }

    info!("Loaded data for {} symbols", data.len());
    Ok(data)
}
