//! Core data types.

mod ohlcv;
mod signal;
mod timeframe;

pub use ohlcv::{Bar, BarSeries};
pub use signal::{PositionSide, Signal, SignalMetadata, SignalStrength, SignalType};
pub use timeframe::Timeframe;
