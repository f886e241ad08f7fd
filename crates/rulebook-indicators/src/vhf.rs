//! Vertical Horizontal Filter.
//!
//! VHF compares how far price travelled net (the vertical range) with the
//! total distance it covered bar to bar (the horizontal path):
//!
//! ```text
//! VHF = (max(close) - min(close)) / sum(|close[i] - close[i-1]|)
//! ```
//!
//! over `period` differences, i.e. `period + 1` closes. A straight line gives
//! 1.0, pure chop tends toward 0.

use std::collections::VecDeque;

use rulebook_core::traits::{Indicator, StreamingIndicator};

/// VHF of a single window of closes. Zero when the path length is zero.
pub fn vertical_horizontal_filter(window: &[f64]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }

    let highest = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lowest = window.iter().copied().fold(f64::INFINITY, f64::min);
    let path: f64 = window.windows(2).map(|w| (w[1] - w[0]).abs()).sum();

    if path == 0.0 {
        0.0
    } else {
        (highest - lowest) / path
    }
}

/// Batch VHF.
#[derive(Debug, Clone)]
pub struct Vhf {
    period: usize,
}

impl Vhf {
    /// Common period is 28.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self { period }
    }
}

impl Indicator for Vhf {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        data.windows(self.period + 1)
            .map(vertical_horizontal_filter)
            .collect()
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "VHF"
    }
}

/// Streaming VHF over the last `period + 1` closes.
#[derive(Debug, Clone)]
pub struct StreamingVhf {
    period: usize,
    closes: VecDeque<f64>,
    current: Option<f64>,
}

impl StreamingVhf {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self {
            period,
            closes: VecDeque::with_capacity(period + 1),
            current: None,
        }
    }
}

impl StreamingIndicator for StreamingVhf {
    type Output = f64;

    fn update(&mut self, value: f64) -> Option<f64> {
        if self.closes.len() == self.period + 1 {
            self.closes.pop_front();
        }
        self.closes.push_back(value);

        if self.is_ready() {
            self.current = Some(vertical_horizontal_filter(self.closes.make_contiguous()));
        }
        self.current
    }

    fn current(&self) -> Option<f64> {
        self.current
    }

    fn reset(&mut self) {
        self.closes.clear();
        self.current = None;
    }

    fn is_ready(&self) -> bool {
        self.closes.len() == self.period + 1
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "VHF"
    }
}
