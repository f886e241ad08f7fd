//! Hurst exponent via rescaled-range (R/S) analysis.
//!
//! The Hurst exponent H characterises the long-term memory of a series:
//!
//! - H > 0.5: trending / persistent
//! - H = 0.5: random walk
//! - H < 0.5: mean-reverting
//!
//! The estimate is taken over the simple returns of a price window:
//!
//! 1. For each scale n in [`SCALES`] below the return count, split the returns
//!    into non-overlapping chunks of n (a trailing partial chunk is dropped).
//! 2. Per chunk, R/S = range of the cumulative mean-deviation divided by the
//!    population standard deviation (R/S = 1 for a zero-deviation chunk).
//! 3. Average R/S per scale and regress log10(mean R/S) on log10(n).
//! 4. The slope, clamped to [0, 1], is H.
//!
//! Callers tune thresholds against this exact formula, so the scale set and
//! the two-point minimum are part of the contract.

use std::collections::VecDeque;

use rulebook_core::error::IndicatorError;
use rulebook_core::traits::{Indicator, StreamingIndicator};
use tracing::trace;

/// Chunk sizes used for the multi-scale R/S computation.
pub const SCALES: [usize; 4] = [8, 16, 32, 64];

/// Value reported when there is not enough information for an estimate.
pub const NEUTRAL_HURST: f64 = 0.5;

/// Estimate the Hurst exponent of a price window.
///
/// Total over its input: too few prices, too few usable scales, a degenerate
/// regression or non-finite arithmetic all yield [`NEUTRAL_HURST`].
pub fn hurst_exponent(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return NEUTRAL_HURST;
    }

    let returns: Vec<f64> = prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect();

    let points: Vec<(f64, f64)> = SCALES
        .iter()
        .filter(|&&scale| scale < returns.len())
        .map(|&scale| {
            let mean_rs = mean_rescaled_range(&returns, scale);
            ((scale as f64).log10(), mean_rs.log10())
        })
        .collect();

    if points.len() < 2 {
        trace!(
            returns = returns.len(),
            scales = points.len(),
            "Hurst: not enough scales for regression"
        );
        return NEUTRAL_HURST;
    }

    match ols_slope(&points) {
        Some(slope) if slope.is_finite() => {
            let hurst = slope.clamp(0.0, 1.0);
            trace!(hurst, points = points.len(), "Hurst exponent computed");
            hurst
        }
        _ => {
            trace!("Hurst: degenerate regression");
            NEUTRAL_HURST
        }
    }
}

/// Mean R/S over all full chunks of `scale` returns.
fn mean_rescaled_range(returns: &[f64], scale: usize) -> f64 {
    let chunks = returns.chunks_exact(scale);
    let count = chunks.len();
    let total: f64 = chunks.map(rescaled_range).sum();
    total / count as f64
}

/// R/S statistic of one chunk.
fn rescaled_range(chunk: &[f64]) -> f64 {
    let n = chunk.len() as f64;
    let mean = chunk.iter().sum::<f64>() / n;

    let mut cumulative = 0.0_f64;
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    let mut squares = 0.0_f64;

    for &value in chunk {
        let deviation = value - mean;
        cumulative += deviation;
        max = max.max(cumulative);
        min = min.min(cumulative);
        squares += deviation * deviation;
    }

    let std_dev = (squares / n).sqrt();
    if std_dev == 0.0 {
        1.0
    } else {
        (max - min) / std_dev
    }
}

/// Least-squares slope of y on x. `None` when x has no variance.
fn ols_slope(points: &[(f64, f64)]) -> Option<f64> {
    let n = points.len() as f64;
    let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (numerator, denominator) = points.iter().fold((0.0, 0.0), |(num, den), (x, y)| {
        let dx = x - x_mean;
        (num + dx * (y - y_mean), den + dx * dx)
    });

    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Rolling Hurst estimator fed one price at a time.
///
/// Keeps the most recent `capacity` prices. Until the window is full every
/// call reports [`NEUTRAL_HURST`].
#[derive(Debug, Clone)]
pub struct HurstEstimator {
    capacity: usize,
    prices: VecDeque<f64>,
    last: Option<f64>,
}

impl HurstEstimator {
    /// Create an estimator over a window of `capacity` prices.
    ///
    /// # Panics
    /// If `capacity` is below 2.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "Capacity must be at least 2");
        Self {
            capacity,
            prices: VecDeque::with_capacity(capacity),
            last: None,
        }
    }

    /// Fallible constructor for capacities coming from configuration.
    pub fn try_new(capacity: usize) -> Result<Self, IndicatorError> {
        if capacity < 2 {
            return Err(IndicatorError::InvalidParameter(format!(
                "Hurst capacity must be at least 2, got {}",
                capacity
            )));
        }
        Ok(Self::new(capacity))
    }

    /// Add a price and return the current estimate.
    ///
    /// Returns [`NEUTRAL_HURST`] while the window is filling.
    pub fn push_price(&mut self, price: f64) -> f64 {
        if self.prices.len() == self.capacity {
            self.prices.pop_front();
        }
        self.prices.push_back(price);

        if self.prices.len() < self.capacity {
            return NEUTRAL_HURST;
        }

        let hurst = hurst_exponent(self.prices.make_contiguous());
        self.last = Some(hurst);
        hurst
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buffered prices.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl StreamingIndicator for HurstEstimator {
    type Output = f64;

    fn update(&mut self, value: f64) -> Option<f64> {
        let hurst = self.push_price(value);
        self.is_ready().then_some(hurst)
    }

    fn current(&self) -> Option<f64> {
        self.last
    }

    fn reset(&mut self) {
        self.prices.clear();
        self.last = None;
    }

    fn is_ready(&self) -> bool {
        self.prices.len() == self.capacity
    }

    fn period(&self) -> usize {
        self.capacity
    }

    fn name(&self) -> &str {
        "Hurst"
    }
}

/// Batch Hurst exponent over rolling windows of `period` prices.
#[derive(Debug, Clone)]
pub struct Hurst {
    period: usize,
}

impl Hurst {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "Period must be at least 2");
        Self { period }
    }
}

impl Indicator for Hurst {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        data.windows(self.period).map(hurst_exponent).collect()
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "Hurst"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alternating(len: usize, pct: f64) -> Vec<f64> {
        let mut price = 100.0;
        (0..len)
            .map(|i| {
                if i > 0 {
                    price *= if i % 2 == 1 { 1.0 + pct } else { 1.0 - pct };
                }
                price
            })
            .collect()
    }

    /// xorshift walk, deterministic across runs.
    fn pseudorandom_walk(len: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        let mut price = 100.0;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let r = (state as f64 / u64::MAX as f64) - 0.5;
                price *= 1.0 + r * 0.02;
                price
            })
            .collect()
    }

    #[test]
    fn test_neutral_until_full() {
        let mut estimator = HurstEstimator::new(10);
        for i in 0..9 {
            assert_eq!(estimator.push_price(100.0 + i as f64 * 3.7), 0.5);
        }
        assert!(!estimator.is_ready());
        assert_eq!(estimator.current(), None);
    }

    #[test]
    fn test_monotonic_series_is_trending() {
        let mut estimator = HurstEstimator::new(65);
        let mut last = 0.0;
        for price in 100..=164 {
            last = estimator.push_price(price as f64);
        }
        assert!(estimator.is_ready());
        assert!(last > 0.5, "expected trending estimate, got {}", last);
        assert!(last <= 1.0);
    }

    #[test]
    fn test_single_scale_window_is_neutral() {
        // 9 prices -> 8 returns: no scale is strictly below 8.
        let mut estimator = HurstEstimator::new(9);
        let mut last = 0.0;
        for i in 0..9 {
            last = estimator.push_price(100.0 * 1.01_f64.powi(i));
        }
        assert!(estimator.is_ready());
        assert_eq!(last, 0.5);
    }

    #[test]
    fn test_window_with_one_usable_scale_is_neutral() {
        // 17 prices -> 16 returns: only scale 8 qualifies.
        let prices: Vec<f64> = (0..17).map(|i| 100.0 + i as f64).collect();
        assert_eq!(hurst_exponent(&prices), 0.5);
    }

    #[test]
    fn test_oscillating_differs_from_monotonic() {
        let trending: Vec<f64> = (0..129).map(|i| 100.0 + i as f64).collect();
        let oscillating = alternating(129, 0.01);

        let h_trend = hurst_exponent(&trending);
        let h_osc = hurst_exponent(&oscillating);

        assert!(h_trend > 0.5);
        assert!(h_osc < 0.5, "oscillating series gave {}", h_osc);
        assert!(h_trend - h_osc > 0.3);
    }

    #[test]
    fn test_output_in_unit_interval() {
        let mut estimator = HurstEstimator::new(100);
        for price in pseudorandom_walk(400, 0x9E37_79B9_7F4A_7C15) {
            let h = estimator.push_price(price);
            assert!((0.0..=1.0).contains(&h), "H={} out of [0,1]", h);
        }
    }

    #[test]
    fn test_degenerate_inputs_stay_total() {
        assert_eq!(hurst_exponent(&[]), 0.5);
        assert_eq!(hurst_exponent(&[42.0]), 0.5);

        // Flat prices: every chunk has zero deviation, R/S = 1 everywhere.
        let flat = vec![50.0; 80];
        assert_eq!(hurst_exponent(&flat), 0.0);

        // Zero price produces infinite returns.
        let mut with_zero: Vec<f64> = (0..80).map(|i| 10.0 + i as f64).collect();
        with_zero[10] = 0.0;
        let h = hurst_exponent(&with_zero);
        assert!((0.0..=1.0).contains(&h));
    }

    #[test]
    fn test_independent_instances_are_identical() {
        let prices = pseudorandom_walk(300, 42);
        let mut a = HurstEstimator::new(128);
        let mut b = HurstEstimator::new(128);

        for &price in &prices {
            assert_eq!(a.push_price(price).to_bits(), b.push_price(price).to_bits());
        }
    }

    #[test]
    fn test_streaming_matches_batch() {
        let prices = pseudorandom_walk(200, 7);
        let batch = Hurst::new(70).calculate(&prices);

        let mut estimator = HurstEstimator::new(70);
        let streamed: Vec<f64> = prices
            .iter()
            .filter_map(|&p| estimator.update(p))
            .collect();

        assert_eq!(batch, streamed);
    }

    #[test]
    fn test_reset_clears_window() {
        let mut estimator = HurstEstimator::new(20);
        for i in 0..25 {
            estimator.update(100.0 + i as f64);
        }
        assert!(estimator.is_ready());
        assert!(estimator.current().is_some());

        estimator.reset();
        assert!(estimator.is_empty());
        assert!(!estimator.is_ready());
        assert_eq!(estimator.current(), None);
        assert_eq!(estimator.push_price(1.0), 0.5);
    }

    #[test]
    fn test_invalid_capacity_rejected() {
        assert!(HurstEstimator::try_new(1).is_err());
        assert_eq!(HurstEstimator::try_new(2).unwrap().capacity(), 2);
    }
}
