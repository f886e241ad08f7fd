//! Trading rule implementations.
//!
//! Each rule pairs one regime indicator with a simple entry condition:
//! - Hurst Trend (Hurst exponent + SMA direction)
//! - Kalman Filter (price crossing a Kalman estimate)
//! - VHF Trend (Vertical Horizontal Filter + SMA direction)
//! - HMM Regime (Viterbi-decoded market state)
//!
//! All rules share percentage stop-loss / take-profit protection.

mod hmm_regime;
mod hurst_trend;
mod kalman_filter;
mod position;
mod protection;
mod registry;
mod vhf_trend;

pub use hmm_regime::{HmmRegimeConfig, HmmRegimeStrategy};
pub use hurst_trend::{HurstTrendConfig, HurstTrendStrategy};
pub use kalman_filter::{KalmanFilterConfig, KalmanFilterStrategy};
pub use protection::{Protection, ProtectionConfig, ProtectionTrigger};
pub use registry::{merge_config, StrategyInfo, StrategyRegistry};
pub use vhf_trend::{VhfTrendConfig, VhfTrendStrategy};
