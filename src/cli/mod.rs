//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rulebook")]
#[command(author, version, about = "Rule-based trading strategies driven by regime indicators")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level, overriding the configured one
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run backtesting simulation
    Backtest(BacktestArgs),
    /// Print the rolling Hurst exponent of a price series
    Hurst(HurstArgs),
    /// List available strategies
    Strategies,
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct BacktestArgs {
    /// Strategy to backtest
    #[arg(short, long)]
    pub strategy: String,

    /// Symbols to trade (comma-separated); defaults to every CSV in --data
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Data file or directory of <SYMBOL>.csv files
    #[arg(long)]
    pub data: PathBuf,

    /// Start date (YYYY-MM-DD), inclusive
    #[arg(long)]
    pub start: Option<String>,

    /// End date (YYYY-MM-DD), inclusive
    #[arg(long)]
    pub end: Option<String>,

    /// Initial capital, overriding the configured one
    #[arg(long)]
    pub capital: Option<f64>,

    /// Timeframe of the data, overriding the configured one
    #[arg(short, long)]
    pub timeframe: Option<String>,

    /// Strategy configuration as inline JSON or a path to a JSON file
    #[arg(long)]
    pub strategy_config: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Save the JSON report to file
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Save the equity curve as CSV
    #[arg(long)]
    pub equity_csv: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct HurstArgs {
    /// Data file or directory of <SYMBOL>.csv files
    #[arg(long)]
    pub data: PathBuf,

    /// Symbol to read when --data is a directory
    #[arg(short = 'S', long)]
    pub symbol: Option<String>,

    /// Window of closing prices
    #[arg(short, long, default_value_t = 100)]
    pub period: usize,

    /// Estimates above this are labelled trending, below mean-reverting
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f64,

    /// Only print the last N bars
    #[arg(long)]
    pub tail: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}
