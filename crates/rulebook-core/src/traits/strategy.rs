//! Strategy trait definitions.

use crate::error::StrategyError;
use crate::types::{BarSeries, PositionSide, Signal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration trait for strategies.
pub trait StrategyConfig: Send + Sync + Clone + 'static {
    /// Validate the configuration.
    fn validate(&self) -> Result<(), StrategyError>;
}

/// Snapshot of a strategy for monitoring and serialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyState {
    pub name: String,
    /// Whether every indicator the rule depends on is formed
    pub is_warmed_up: bool,
    pub bars_processed: usize,
    pub signals_generated: usize,
    pub position: PositionSide,
    /// Latest indicator values
    pub indicators: HashMap<String, f64>,
    /// Strategy-specific extras
    pub custom: serde_json::Value,
}

/// A trading rule.
///
/// A rule receives every new bar of the symbols it trades and may answer
/// with a signal. Rules own their indicators and track their own position
/// side; turning signals into fills is left to the caller.
pub trait Strategy: Send + Sync {
    /// Unique display name.
    fn name(&self) -> &str;

    /// Process a new bar and optionally generate a signal.
    ///
    /// Called once per bar, after the bar has been appended to `series`.
    fn on_bar(&mut self, series: &BarSeries) -> Option<Signal>;

    /// Reset all state, including indicators and position.
    fn reset(&mut self);

    fn state(&self) -> StrategyState;

    /// Number of bars needed before signals can be generated.
    fn warmup_period(&self) -> usize;

    fn symbols(&self) -> &[String];

    fn is_warmed_up(&self, bars_available: usize) -> bool {
        bars_available >= self.warmup_period()
    }

    fn description(&self) -> &str {
        ""
    }
}
