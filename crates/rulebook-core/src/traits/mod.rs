//! Core traits.

mod data_source;
mod indicator;
mod strategy;

pub use data_source::DataSource;
pub use indicator::{Indicator, StreamingIndicator};
pub use strategy::{Strategy, StrategyConfig, StrategyState};
