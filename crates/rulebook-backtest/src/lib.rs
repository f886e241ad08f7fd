//! Backtesting engine.

mod account;
mod engine;
mod report;
mod statistics;

pub use account::{Account, Fill, Holding};
pub use engine::{BacktestConfig, BacktestEngine};
pub use report::BacktestReport;
pub use statistics::{sharpe, sortino, BacktestStats, TradeRecord};
