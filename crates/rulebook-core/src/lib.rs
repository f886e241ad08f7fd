//! Core types and traits shared by every trading rule.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Bar, BarSeries, Timeframe)
//! - Trading signals and the strategy-local position side
//! - Core traits for strategies, indicators and data sources

pub mod error;
pub mod traits;
pub mod types;

pub use error::{TradingError, TradingResult};
pub use traits::*;
pub use types::*;
