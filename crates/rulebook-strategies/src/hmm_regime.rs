//! HMM Regime strategy.
//!
//! Decodes the hidden market state of the latest bar with a three-state HMM
//! and holds the matching exposure: long in a bullish regime, short (or flat
//! when shorting is disabled) in a bearish one, flat when neutral.

use std::collections::HashMap;

use rulebook_core::{
    error::StrategyError,
    traits::{Strategy, StrategyConfig, StrategyState, StreamingIndicator},
    types::{BarSeries, PositionSide, Signal, SignalStrength},
};
use rulebook_indicators::{HmmParams, HmmRegimeDecoder, MarketState};
use serde::{Deserialize, Serialize};

use crate::position::{Bias, PositionTracker, SignalContext};
use crate::protection::ProtectionConfig;

/// Configuration for the HMM Regime strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HmmRegimeConfig {
    /// Symbols to trade
    pub symbols: Vec<String>,
    /// Closes decoded on every bar
    pub window: usize,
    /// Absolute return at or below which a bar counts as flat
    pub flat_threshold: f64,
    #[serde(default)]
    pub params: HmmParams,
    pub allow_short: bool,
    #[serde(default)]
    pub protection: ProtectionConfig,
}

impl Default for HmmRegimeConfig {
    fn default() -> Self {
        Self {
            symbols: vec![],
            window: 50,
            flat_threshold: 0.001,
            params: HmmParams::default(),
            allow_short: true,
            protection: ProtectionConfig::stop_loss(2.0),
        }
    }
}

impl HmmRegimeConfig {
    fn decoder(&self) -> Result<HmmRegimeDecoder, StrategyError> {
        Ok(HmmRegimeDecoder::new(
            &self.params,
            self.window,
            self.flat_threshold,
        )?)
    }
}

impl StrategyConfig for HmmRegimeConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        self.decoder()?;
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
    decoder: HmmRegimeDecoder,
    tracker: PositionTracker,
    /// Consecutive bars decoded as the current state
    regime_bars: usize,
}

fn classify_strength(regime_bars: usize) -> SignalStrength {
    if regime_bars >= 10 {
        SignalStrength::Strong
    } else if regime_bars >= 3 {
        SignalStrength::Moderate
    } else {
        SignalStrength::Weak
    }
}

/// Regime following driven by Viterbi-decoded HMM states.
pub struct HmmRegimeStrategy {
    config: HmmRegimeConfig,
    prototype: HmmRegimeDecoder,
    books: HashMap<String, SymbolBook>,
    last_symbol: Option<String>,
    bars_processed: usize,
    signals_generated: usize,
}

impl HmmRegimeStrategy {
    /// Fails when the model parameters or window are invalid.
    pub fn new(config: HmmRegimeConfig) -> Result<Self, StrategyError> {
        let prototype = config.decoder()?;
        Ok(Self {
            config,
            prototype,
            books: HashMap::new(),
            last_symbol: None,
            bars_processed: 0,
            signals_generated: 0,
        })
    }

    fn last_book(&self) -> Option<&SymbolBook> {
        self.last_symbol.as_ref().and_then(|s| self.books.get(s))
    }
}

impl Strategy for HmmRegimeStrategy {
    fn name(&self) -> &str {
        "HMM Regime"
    }

    fn description(&self) -> &str {
        "Holds the exposure matching the Viterbi-decoded bullish/neutral/bearish regime"
    }

    fn on_bar(&mut self, series: &BarSeries) -> Option<Signal> {
        self.bars_processed += 1;
        let bar = *series.last()?;

        let (config, prototype) = (&self.config, &self.prototype);
        let book = self
            .books
            .entry(series.symbol.clone())
            .or_insert_with(|| SymbolBook {
                decoder: prototype.clone(),
                tracker: PositionTracker::new(config.protection.clone()),
                regime_bars: 0,
            });
        self.last_symbol = Some(series.symbol.clone());

        let previous = book.decoder.current();
        let state = book.decoder.update(bar.close)?;
        book.regime_bars = if previous == Some(state) {
            book.regime_bars + 1
        } else {
            1
        };

        let indicators = [
            ("hmm_state", state as u8 as f64),
            ("regime_bars", book.regime_bars as f64),
        ];
        let ctx = SignalContext {
            strategy: "HMM Regime",
            symbol: &series.symbol,
            bar: &bar,
            indicators: &indicators,
        };

        if let Some(signal) = book.tracker.protect(&ctx) {
            self.signals_generated += 1;
            return Some(signal);
        }

        let bias = match state {
            MarketState::Bullish => Bias::Long,
            MarketState::Bearish => Bias::Short,
            MarketState::Neutral => Bias::Flat,
        };
        let confidence = 0.5 + (book.regime_bars as f64 / 20.0).min(0.5);
        let reason = format!("Regime {} for {} bar(s)", state, book.regime_bars);

        let signal = book.tracker.act(
            &ctx,
            bias,
            config.allow_short,
            classify_strength(book.regime_bars),
            confidence,
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
        let regime = book.and_then(|b| b.decoder.current());

        StrategyState {
            name: self.name().to_string(),
            is_warmed_up: book.is_some_and(|b| b.decoder.is_ready()),
            bars_processed: self.bars_processed,
            signals_generated: self.signals_generated,
            position: book.map_or(PositionSide::Flat, |b| b.tracker.side()),
            indicators: regime
                .map(|s| ("hmm_state".to_string(), s as u8 as f64))
                .into_iter()
                .collect(),
            custom: serde_json::json!({
                "regime": regime,
                "regime_bars": book.map_or(0, |b| b.regime_bars),
                "window": self.config.window,
                "flat_threshold": self.config.flat_threshold,
            }),
        }
    }

    fn warmup_period(&self) -> usize {
        self.config.window
    }

    fn symbols(&self) -> &[String] {
        &self.config.symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rulebook_core::types::{Bar, SignalType, Timeframe};

    fn config() -> HmmRegimeConfig {
        HmmRegimeConfig {
            symbols: vec!["TEST".to_string()],
            window: 10,
            protection: ProtectionConfig::default(),
            ..Default::default()
        }
    }

    fn run(strategy: &mut HmmRegimeStrategy, prices: &[f64]) -> Vec<Signal> {
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

    fn path(start: f64, steps: &[(usize, f64)]) -> Vec<f64> {
        let mut prices = vec![start];
        let mut price = start;
        for &(count, factor) in steps {
            for _ in 0..count {
                price *= factor;
                prices.push(price);
            }
        }
        prices
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());

        let mut bad = config();
        bad.params.initial = [0.5, 0.5, 0.5];
        assert!(bad.validate().is_err());
        assert!(HmmRegimeStrategy::new(bad).is_err());

        let mut bad = config();
        bad.window = 1;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_regimes_drive_positions() {
        let mut strategy = HmmRegimeStrategy::new(config()).unwrap();
        let prices = path(100.0, &[(15, 1.01), (15, 0.99), (15, 1.0)]);

        let signals = run(&mut strategy, &prices);
        let types: Vec<_> = signals.iter().map(|s| s.signal_type).collect();
        assert_eq!(
            types,
            vec![SignalType::Buy, SignalType::Sell, SignalType::CloseShort]
        );
        assert_eq!(signals[0].timestamp, 9 * 86_400_000);
        assert!(strategy.state().position.is_flat());
    }

    #[test]
    fn test_bearish_without_shorting_only_closes() {
        let mut cfg = config();
        cfg.allow_short = false;
        let mut strategy = HmmRegimeStrategy::new(cfg).unwrap();
        let prices = path(100.0, &[(15, 1.01), (15, 0.99)]);

        let types: Vec<_> = run(&mut strategy, &prices)
            .iter()
            .map(|s| s.signal_type)
            .collect();
        assert_eq!(types, vec![SignalType::Buy, SignalType::CloseLong]);
    }

    #[test]
    fn test_state_reports_regime() {
        let mut strategy = HmmRegimeStrategy::new(config()).unwrap();
        run(&mut strategy, &path(100.0, &[(12, 1.01)]));

        let state = strategy.state();
        assert!(state.is_warmed_up);
        assert_eq!(state.position, PositionSide::Long);
        assert_eq!(state.custom["regime"], "bullish");
        assert_eq!(state.custom["regime_bars"], 4);

        strategy.reset();
        assert!(!strategy.state().is_warmed_up);
        assert!(strategy.state().custom["regime"].is_null());
    }
}
