//! Rolling Hurst exponent command.

use anyhow::{Context, Result};
use rulebook_data::CsvDataSource;
use rulebook_indicators::HurstEstimator;
use serde::Serialize;
use tracing::info;

use crate::cli::{HurstArgs, OutputFormat};

#[derive(Debug, Serialize)]
struct HurstRow {
    timestamp: i64,
    close: f64,
    /// `None` while the window is filling
    hurst: Option<f64>,
    regime: &'static str,
}

/// Label an estimate against `threshold`.
fn regime(hurst: f64, threshold: f64) -> &'static str {
    if hurst > threshold {
        "trending"
    } else if hurst < threshold {
        "mean-reverting"
    } else {
        "random walk"
    }
}

pub async fn run(args: HurstArgs) -> Result<()> {
    let source = CsvDataSource::new(&args.data)
        .with_context(|| format!("Data path '{}' does not exist", args.data.display()))?;
    let symbol = match &args.symbol {
        Some(symbol) => symbol.clone(),
        None if args.data.is_dir() => anyhow::bail!("--symbol is required when --data is a directory"),
        None => args
            .data
            .file_stem()
            .map(|s| s.to_string_lossy().to_uppercase())
            .unwrap_or_default(),
    };

    let bars = source.load_all(&symbol).await?;
    let mut estimator = HurstEstimator::try_new(args.period)?;
    info!(symbol = %symbol, bars = bars.len(), period = args.period, "Estimating Hurst exponent");

    let rows: Vec<HurstRow> = bars
        .iter()
        .map(|bar| {
            let hurst = estimator.push_price(bar.close);
            let ready = estimator.len() == estimator.capacity();
            HurstRow {
                timestamp: bar.timestamp,
                close: bar.close,
                hurst: ready.then_some(hurst),
                regime: if ready {
                    regime(hurst, args.threshold)
                } else {
                    "warming up"
                },
            }
        })
        .collect();

    let skip = args
        .tail
        .map_or(0, |tail| rows.len().saturating_sub(tail));
    let shown = &rows[skip..];

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(shown)?),
        OutputFormat::Text => {
            println!("Hurst exponent: {} (window {}, threshold {})", symbol, args.period, args.threshold);
            println!("═══════════════════════════════════════════════════════════");
            println!("  {:<12} {:>12} {:>8}  {}", "date", "close", "hurst", "regime");
            for row in shown {
                let date = chrono::DateTime::from_timestamp_millis(row.timestamp)
                    .map(|dt| dt.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| row.timestamp.to_string());
                let hurst = row
                    .hurst
                    .map_or_else(|| "-".to_string(), |h| format!("{:.4}", h));
                println!("  {:<12} {:>12.4} {:>8}  {}", date, row.close, hurst, row.regime);
            }
        }
    }

    Ok(())
}
