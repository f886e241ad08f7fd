//! Trading signals emitted by strategies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::Bar;

/// What a strategy wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// Open (or flip into) a long position
    Buy,
    /// Open (or flip into) a short position
    Sell,
    /// Flatten an open long
    CloseLong,
    /// Flatten an open short
    CloseShort,
    /// No action
    Hold,
}

impl SignalType {
    /// True for signals that open exposure.
    pub fn is_entry(&self) -> bool {
        matches!(self, SignalType::Buy | SignalType::Sell)
    }

    /// True for signals that only flatten exposure.
    pub fn is_exit(&self) -> bool {
        matches!(self, SignalType::CloseLong | SignalType::CloseShort)
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
            SignalType::CloseLong => "CLOSE_LONG",
            SignalType::CloseShort => "CLOSE_SHORT",
            SignalType::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

/// Coarse conviction bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
}

/// Context attached to a signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalMetadata {
    /// Name of the strategy that produced the signal
    pub strategy_name: String,
    /// Indicator snapshot at signal time
    pub indicators: HashMap<String, f64>,
    /// Human readable explanation
    pub reason: String,
    /// Suggested protective stop price
    pub stop_loss: Option<f64>,
    /// Suggested profit target price
    pub take_profit: Option<f64>,
}

/// A trading signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub signal_type: SignalType,
    pub strength: SignalStrength,
    /// Reference price (the bar close the decision was taken on)
    pub price: f64,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub metadata: SignalMetadata,
}

impl Signal {
    /// Build a signal priced at `bar`'s close.
    pub fn at_bar(
        symbol: impl Into<String>,
        signal_type: SignalType,
        strength: SignalStrength,
        bar: &Bar,
        confidence: f64,
        metadata: SignalMetadata,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            signal_type,
            strength,
            price: bar.close,
            timestamp: bar.timestamp,
            confidence: confidence.clamp(0.0, 1.0),
            metadata,
        }
    }
}

/// Position as seen by a single strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    #[default]
    Flat,
    Long,
    Short,
}

impl PositionSide {
    pub fn is_flat(&self) -> bool {
        *self == PositionSide::Flat
    }

    /// The signal that flattens this side, if any.
    pub fn close_signal(&self) -> Option<SignalType> {
        match self {
            PositionSide::Flat => None,
            PositionSide::Long => Some(SignalType::CloseLong),
            PositionSide::Short => Some(SignalType::CloseShort),
        }
    }

    /// Position after `signal` is filled.
    pub fn after(&self, signal: SignalType) -> PositionSide {
        match signal {
            SignalType::Buy => PositionSide::Long,
            SignalType::Sell => PositionSide::Short,
            SignalType::CloseLong | SignalType::CloseShort => PositionSide::Flat,
            SignalType::Hold => *self,
        }
    }
}
