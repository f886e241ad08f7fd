//! Simplified Hidden Markov Model for market regimes.
//!
//! Three hidden states (bearish, neutral, bullish) emit one of three
//! observations derived from close-to-close returns (down, flat, up). The
//! model parameters are fixed; the most likely state path over a rolling
//! window is recovered with the Viterbi algorithm in log space.

use std::collections::VecDeque;
use std::fmt;

use rulebook_core::error::IndicatorError;
use rulebook_core::traits::StreamingIndicator;
use serde::{Deserialize, Serialize};
use tracing::trace;

const STATES: usize = 3;

/// Hidden market state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketState {
    Bearish,
    Neutral,
    Bullish,
}

impl MarketState {
    const ALL: [MarketState; STATES] = [
        MarketState::Bearish,
        MarketState::Neutral,
        MarketState::Bullish,
    ];
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Bullish => write!(f, "BULLISH"),
        }
    }
}

/// Discretised return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Observation {
    Down,
    Flat,
    Up,
}

impl Observation {
    /// Bucket a simple return; `|r| <= flat_threshold` counts as flat.
    pub fn from_return(ret: f64, flat_threshold: f64) -> Self {
        if ret > flat_threshold {
            Observation::Up
        } else if ret < -flat_threshold {
            Observation::Down
        } else {
            Observation::Flat
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Model parameters, indexed `[Bearish, Neutral, Bullish]` for states and
/// `[Down, Flat, Up]` for observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HmmParams {
    pub initial: [f64; STATES],
    pub transition: [[f64; STATES]; STATES],
    pub emission: [[f64; STATES]; STATES],
}

impl Default for HmmParams {
    fn default() -> Self {
        Self {
            initial: [1.0 / 3.0; STATES],
            transition: [[0.8, 0.1, 0.1], [0.1, 0.8, 0.1], [0.1, 0.1, 0.8]],
            emission: [[0.7, 0.2, 0.1], [0.15, 0.7, 0.15], [0.1, 0.2, 0.7]],
        }
    }
}

impl HmmParams {
    const ROW_TOLERANCE: f64 = 1e-6;

    /// Check every distribution is a valid probability vector.
    pub fn validate(&self) -> Result<(), IndicatorError> {
        check_distribution("initial", &self.initial)?;
        for (i, row) in self.transition.iter().enumerate() {
            check_distribution(&format!("transition[{}]", i), row)?;
        }
        for (i, row) in self.emission.iter().enumerate() {
            check_distribution(&format!("emission[{}]", i), row)?;
        }
        Ok(())
    }
}

fn check_distribution(label: &str, row: &[f64; STATES]) -> Result<(), IndicatorError> {
    if row.iter().any(|p| !(0.0..=1.0).contains(p)) {
        return Err(IndicatorError::InvalidParameter(format!(
            "{} has a probability outside [0, 1]: {:?}",
            label, row
        )));
    }
    let sum: f64 = row.iter().sum();
    if (sum - 1.0).abs() > HmmParams::ROW_TOLERANCE {
        return Err(IndicatorError::InvalidParameter(format!(
            "{} sums to {} instead of 1",
            label, sum
        )));
    }
    Ok(())
}

/// Rolling HMM regime decoder.
///
/// Keeps the last `window` closes; once full, each update decodes the whole
/// window and reports the state of the most recent bar.
#[derive(Debug, Clone)]
pub struct HmmRegimeDecoder {
    window: usize,
    flat_threshold: f64,
    log_initial: [f64; STATES],
    log_transition: [[f64; STATES]; STATES],
    log_emission: [[f64; STATES]; STATES],
    closes: VecDeque<f64>,
    current: Option<MarketState>,
}

impl HmmRegimeDecoder {
    /// Build a decoder. `window` counts closes and must be at least 2.
    pub fn new(
        params: &HmmParams,
        window: usize,
        flat_threshold: f64,
    ) -> Result<Self, IndicatorError> {
        params.validate()?;
        if window < 2 {
            return Err(IndicatorError::InvalidParameter(format!(
                "HMM window must be at least 2 closes, got {}",
                window
            )));
        }
        if flat_threshold.is_nan() || flat_threshold < 0.0 {
            return Err(IndicatorError::InvalidParameter(format!(
                "HMM flat threshold must be non-negative, got {}",
                flat_threshold
            )));
        }

        let log_row = |row: &[f64; STATES]| row.map(f64::ln);
        Ok(Self {
            window,
            flat_threshold,
            log_initial: log_row(&params.initial),
            log_transition: params.transition.map(|row| log_row(&row)),
            log_emission: params.emission.map(|row| log_row(&row)),
            closes: VecDeque::with_capacity(window),
            current: None,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Discretise consecutive closes into observations.
    pub fn observe(&self, closes: &[f64]) -> Vec<Observation> {
        closes
            .windows(2)
            .map(|w| Observation::from_return(w[1] / w[0] - 1.0, self.flat_threshold))
            .collect()
    }

    /// Most likely state sequence for `observations` (Viterbi).
    ///
    /// Ties go to the lower state index, so an all-impossible path decodes
    /// as bearish rather than panicking.
    pub fn decode(&self, observations: &[Observation]) -> Vec<MarketState> {
        let Some(first) = observations.first() else {
            return Vec::new();
        };

        let mut score: [f64; STATES] =
            std::array::from_fn(|s| self.log_initial[s] + self.log_emission[s][first.index()]);
        let mut backpointers: Vec<[usize; STATES]> = Vec::with_capacity(observations.len() - 1);

        for obs in &observations[1..] {
            let mut next = [f64::NEG_INFINITY; STATES];
            let mut from = [0usize; STATES];
            for to in 0..STATES {
                let (best_prev, best_score) =
                    argmax((0..STATES).map(|prev| score[prev] + self.log_transition[prev][to]));
                next[to] = best_score + self.log_emission[to][obs.index()];
                from[to] = best_prev;
            }
            score = next;
            backpointers.push(from);
        }

        let (mut state, _) = argmax(score.iter().copied());
        let mut path = vec![MarketState::ALL[state]; observations.len()];
        for (t, from) in backpointers.iter().enumerate().rev() {
            state = from[state];
            path[t] = MarketState::ALL[state];
        }
        path
    }

    fn decode_window(&mut self) -> Option<MarketState> {
        self.closes.make_contiguous();
        let (closes, _) = self.closes.as_slices();
        let observations = self.observe(closes);
        self.decode(&observations).last().copied()
    }
}

/// Index and value of the largest element; first wins on ties.
fn argmax(values: impl Iterator<Item = f64>) -> (usize, f64) {
    values
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_i, best), (i, v)| {
            if v > best {
                (i, v)
            } else {
                (best_i, best)
            }
        })
}

impl StreamingIndicator for HmmRegimeDecoder {
    type Output = MarketState;

    fn update(&mut self, value: f64) -> Option<MarketState> {
        if self.closes.len() == self.window {
            self.closes.pop_front();
        }
        self.closes.push_back(value);

        if !self.is_ready() {
            return None;
        }

        let state = self.decode_window();
        if state != self.current {
            trace!(?state, previous = ?self.current, "HMM regime changed");
        }
        self.current = state;
        state
    }

    fn current(&self) -> Option<MarketState> {
        self.current
    }

    fn reset(&mut self) {
        self.closes.clear();
        self.current = None;
    }

    fn is_ready(&self) -> bool {
        self.closes.len() == self.window
    }

    fn period(&self) -> usize {
        self.window
    }

    fn name(&self) -> &str {
        "HMM"
    }
}
