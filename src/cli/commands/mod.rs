//! CLI command implementations.

pub mod backtest;
pub mod hurst;
pub mod strategies;
pub mod validate;
