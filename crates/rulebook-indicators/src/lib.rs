//! Regime and trend indicators.
//!
//! This crate provides the numeric routines the rules are built on:
//! - Hurst exponent via rescaled-range analysis
//! - Scalar Kalman filter
//! - Vertical Horizontal Filter
//! - Three-state Hidden Markov Model decoded with Viterbi
//! - Moving averages (SMA, EMA)
//!
//! Indicators come in a batch form (`Indicator`) and a streaming form
//! (`StreamingIndicator`) where it makes sense to feed one close at a time.

pub mod hmm;
pub mod hurst;
pub mod kalman;
pub mod moving_average;
pub mod vhf;

pub use hmm::{HmmParams, HmmRegimeDecoder, MarketState, Observation};
pub use hurst::{hurst_exponent, Hurst, HurstEstimator, NEUTRAL_HURST, SCALES};
pub use kalman::KalmanFilter;
pub use moving_average::{Ema, Sma, StreamingEma, StreamingSma};
pub use vhf::{vertical_horizontal_filter, StreamingVhf, Vhf};
