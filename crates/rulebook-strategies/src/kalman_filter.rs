//! Kalman Filter strategy.
//!
//! Smooths closes with a scalar Kalman filter and trades price crossing the
//! filtered estimate: crossing above goes long, crossing below goes short
//! (or just closes the long when shorting is disabled).

use std::collections::HashMap;

use rulebook_core::{
    error::StrategyError,
    traits::{Strategy, StrategyConfig, StrategyState},
    types::{BarSeries, PositionSide, Signal, SignalStrength},
};
use rulebook_indicators::KalmanFilter;
use serde::{Deserialize, Serialize};

use crate::position::{Bias, PositionTracker, SignalContext};
use crate::protection::ProtectionConfig;

/// Configuration for the Kalman Filter strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KalmanFilterConfig {
    /// Symbols to trade
    pub symbols: Vec<String>,
    /// How fast the hidden price is expected to drift (q)
    pub process_noise: f64,
    /// How noisy observed closes are (r)
    pub measurement_noise: f64,
    /// Bars to let the filter settle before trading
    pub warmup_bars: usize,
    pub allow_short: bool,
    #[serde(default)]
    pub protection: ProtectionConfig,
}

impl Default for KalmanFilterConfig {
    fn default() -> Self {
        Self {
            symbols: vec![],
            process_noise: 0.01,
            measurement_noise: 0.1,
            warmup_bars: 20,
            allow_short: true,
            protection: ProtectionConfig::stop_loss(2.0),
        }
    }
}

impl StrategyConfig for KalmanFilterConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        KalmanFilter::try_new(self.process_noise, self.measurement_noise)?;
        if self.warmup_bars == 0 {
            return Err(StrategyError::InvalidConfig(
                "Warmup must be at least one bar".into(),
            ));
        }
        if self.symbols.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "At least one symbol required".into(),
            ));
        }
        self.protection.validate()
    }
}

#[derive(Debug, Clone)]
struct SymbolBook {
    filter: KalmanFilter,
    tracker: PositionTracker,
    bars: usize,
    estimate: Option<f64>,
    /// close - estimate on the previous bar
    last_diff: Option<f64>,
}

impl SymbolBook {
    fn new(config: &KalmanFilterConfig) -> Self {
        Self {
            filter: KalmanFilter::new(config.process_noise, config.measurement_noise),
            tracker: PositionTracker::new(config.protection.clone()),
            bars: 0,
            estimate: None,
            last_diff: None,
        }
    }
}

fn classify_strength(distance_pct: f64) -> SignalStrength {
    if distance_pct > 1.0 {
        SignalStrength::Strong
    } else if distance_pct > 0.5 {
        SignalStrength::Moderate
    } else {
        SignalStrength::Weak
    }
}

/// Price versus Kalman estimate crossover.
pub struct KalmanFilterStrategy {
    config: KalmanFilterConfig,
    books: HashMap<String, SymbolBook>,
    last_symbol: Option<String>,
    bars_processed: usize,
    signals_generated: usize,
}

impl KalmanFilterStrategy {
    pub fn new(config: KalmanFilterConfig) -> Self {
        Self {
            config,
            books: HashMap::new(),
            last_symbol: None,
            bars_processed: 0,
            signals_generated: 0,
        }
    }

    fn last_book(&self) -> Option<&SymbolBook> {
        self.last_symbol.as_ref().and_then(|s| self.books.get(s))
    }
}

impl Strategy for KalmanFilterStrategy {
    fn name(&self) -> &str {
        "Kalman Filter"
    }

    fn description(&self) -> &str {
        "Trades closes crossing a Kalman-filtered price estimate"
    }

    fn on_bar(&mut self, series: &BarSeries) -> Option<Signal> {
        self.bars_processed += 1;
        let bar = *series.last()?;

        let config = &self.config;
        let book = self
            .books
            .entry(series.symbol.clone())
            .or_insert_with(|| SymbolBook::new(config));
        self.last_symbol = Some(series.symbol.clone());

        let estimate = book.filter.filter(bar.close);
        let diff = bar.close - estimate;
        let prev_diff = book.last_diff.replace(diff);
        book.estimate = Some(estimate);
        book.bars += 1;

        let indicators = [("kalman", estimate), ("kalman_gain", book.filter.gain())];
        let ctx = SignalContext {
            strategy: "Kalman Filter",
            symbol: &series.symbol,
            bar: &bar,
            indicators: &indicators,
        };

        if let Some(signal) = book.tracker.protect(&ctx) {
            self.signals_generated += 1;
            return Some(signal);
        }

        if book.bars <= config.warmup_bars {
            return None;
        }
        let prev_diff = prev_diff?;

        let (bias, reason) = if prev_diff <= 0.0 && diff > 0.0 {
            (
                Bias::Long,
                format!("Close crossed above Kalman estimate {:.4}", estimate),
            )
        } else if prev_diff >= 0.0 && diff < 0.0 {
            (
                Bias::Short,
                format!("Close crossed below Kalman estimate {:.4}", estimate),
            )
        } else {
            return None;
        };

        let distance_pct = diff.abs() / estimate.abs().max(f64::EPSILON) * 100.0;
        let signal = book.tracker.act(
            &ctx,
            bias,
            config.allow_short,
            classify_strength(distance_pct),
            (0.5 + distance_pct / 2.0).min(1.0),
            reason,
        )?;
        self.signals_generated += 1;
        Some(signal)
    }

    fn reset(&mut self) {
        self.books.clear();
        self.last_symbol = None;
        self.bars_processed = 0;
        self.signals_generated = 0;
    }

    fn state(&self) -> StrategyState {
        let book = self.last_book();
        let mut indicators = HashMap::new();
        if let Some(estimate) = book.and_then(|b| b.estimate) {
            indicators.insert("kalman".to_string(), estimate);
        }

        StrategyState {
            name: self.name().to_string(),
            is_warmed_up: book.is_some_and(|b| b.bars > self.config.warmup_bars),
            bars_processed: self.bars_processed,
            signals_generated: self.signals_generated,
            position: book.map_or(PositionSide::Flat, |b| b.tracker.side()),
            indicators,
            custom: serde_json::json!({
                "process_noise": self.config.process_noise,
                "measurement_noise": self.config.measurement_noise,
                "error_covariance": book.map(|b| b.filter.error_covariance()),
            }),
        }
    }

    fn warmup_period(&self) -> usize {
        self.config.warmup_bars + 1
    }

    fn symbols(&self) -> &[String] {
        &self.config.symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rulebook_core::types::{Bar, SignalType, Timeframe};

    fn config() -> KalmanFilterConfig {
        KalmanFilterConfig {
            symbols: vec!["TEST".to_string()],
            warmup_bars: 5,
            protection: ProtectionConfig::default(),
            ..Default::default()
        }
    }

    fn run(strategy: &mut KalmanFilterStrategy, prices: &[f64]) -> Vec<Signal> {
        let mut series = BarSeries::new("TEST", Timeframe::Daily);
        let mut signals = Vec::new();
        for (i, &price) in prices.iter().enumerate() {
            series.push(Bar::flat(i as i64 * 86_400_000, price));
            if let Some(signal) = strategy.on_bar(&series) {
                signals.push(signal);
            }
        }
        signals
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());

        let mut bad = config();
        bad.measurement_noise = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.symbols.clear();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_crossovers() {
        let mut strategy = KalmanFilterStrategy::new(config());
        let mut prices = vec![100.0; 10];
        prices.push(110.0);
        prices.push(90.0);

        let signals = run(&mut strategy, &prices);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].signal_type, SignalType::Buy);
        assert_eq!(signals[1].signal_type, SignalType::Sell);
        assert_eq!(strategy.state().position, PositionSide::Short);
    }

    #[test]
    fn test_long_only_closes_instead_of_shorting() {
        let mut cfg = config();
        cfg.allow_short = false;
        let mut strategy = KalmanFilterStrategy::new(cfg);
        let mut prices = vec![100.0; 10];
        prices.extend([110.0, 90.0, 80.0]);

        let signals = run(&mut strategy, &prices);
        let types: Vec<_> = signals.iter().map(|s| s.signal_type).collect();
        assert_eq!(types, vec![SignalType::Buy, SignalType::CloseLong]);
    }

    #[test]
    fn test_no_signals_during_warmup() {
        let mut strategy = KalmanFilterStrategy::new(config());
        assert!(run(&mut strategy, &[100.0, 101.0, 99.0, 102.0, 98.0]).is_empty());
    }

    #[test]
    fn test_reset() {
        let mut strategy = KalmanFilterStrategy::new(config());
        let mut prices = vec![100.0; 10];
        prices.push(110.0);
        run(&mut strategy, &prices);
        assert_eq!(strategy.state().position, PositionSide::Long);

        strategy.reset();
        let state = strategy.state();
        assert!(state.position.is_flat());
        assert_eq!(state.bars_processed, 0);
        assert!(state.indicators.is_empty());
    }
}
