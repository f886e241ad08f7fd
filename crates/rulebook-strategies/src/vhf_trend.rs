//! VHF Trend strategy.
//!
//! The Vertical Horizontal Filter decides whether there is a trend worth
//! following; the SMA decides its direction. Below the VHF threshold the
//! market is considered congested and positions are closed.

use std::collections::HashMap;

use rulebook_core::{
    error::StrategyError,
    traits::{Strategy, StrategyConfig, StrategyState, StreamingIndicator},
    types::{BarSeries, PositionSide, Signal, SignalStrength},
};
use rulebook_indicators::{StreamingSma, StreamingVhf};
use serde::{Deserialize, Serialize};

use crate::position::{Bias, PositionTracker, SignalContext};
use crate::protection::ProtectionConfig;

/// Configuration for the VHF Trend strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VhfTrendConfig {
    /// Symbols to trade
    pub symbols: Vec<String>,
    /// VHF lookback in bar-to-bar differences
    pub vhf_period: usize,
    /// VHF above this value counts as trending
    pub vhf_threshold: f64,
    /// SMA period used for direction
    pub ma_period: usize,
    pub allow_short: bool,
    #[serde(default)]
    pub protection: ProtectionConfig,
}

impl Default for VhfTrendConfig {
    fn default() -> Self {
        Self {
            symbols: vec![],
            vhf_period: 28,
            vhf_threshold: 0.35,
            ma_period: 20,
            allow_short: true,
            protection: ProtectionConfig::stop_loss(2.0),
        }
    }
}

impl StrategyConfig for VhfTrendConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.vhf_period == 0 {
            return Err(StrategyError::InvalidConfig(
                "VHF period must be greater than 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.vhf_threshold) {
            return Err(StrategyError::InvalidConfig(
                "VHF threshold must be between 0 and 1".into(),
            ));
        }
        if self.ma_period == 0 {
            return Err(StrategyError::InvalidConfig(
                "MA period must be greater than 0".into(),
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
    vhf: StreamingVhf,
    sma: StreamingSma,
    tracker: PositionTracker,
}

impl SymbolBook {
    fn new(config: &VhfTrendConfig) -> Self {
        Self {
            vhf: StreamingVhf::new(config.vhf_period),
            sma: StreamingSma::new(config.ma_period),
            tracker: PositionTracker::new(config.protection.clone()),
        }
    }

    fn is_formed(&self) -> bool {
        self.vhf.is_ready() && self.sma.is_ready()
    }
}

fn classify_strength(vhf: f64) -> SignalStrength {
    if vhf > 0.6 {
        SignalStrength::Strong
    } else if vhf > 0.45 {
        SignalStrength::Moderate
    } else {
        SignalStrength::Weak
    }
}

/// VHF-gated trend following.
pub struct VhfTrendStrategy {
    config: VhfTrendConfig,
    books: HashMap<String, SymbolBook>,
    last_symbol: Option<String>,
    bars_processed: usize,
    signals_generated: usize,
}

impl VhfTrendStrategy {
    pub fn new(config: VhfTrendConfig) -> Self {
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

impl Strategy for VhfTrendStrategy {
    fn name(&self) -> &str {
        "VHF Trend"
    }

    fn description(&self) -> &str {
        "Trades the SMA direction only when the Vertical Horizontal Filter shows a trend"
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

        let vhf = book.vhf.update(bar.close);
        let sma = book.sma.update(bar.close);
        let (Some(vhf), Some(sma)) = (vhf, sma) else {
            return None;
        };

        let indicators = [("vhf", vhf), ("sma", sma)];
        let ctx = SignalContext {
            strategy: "VHF Trend",
            symbol: &series.symbol,
            bar: &bar,
            indicators: &indicators,
        };

        if let Some(signal) = book.tracker.protect(&ctx) {
            self.signals_generated += 1;
            return Some(signal);
        }

        let (bias, reason) = if vhf <= config.vhf_threshold {
            (
                Bias::Flat,
                format!("VHF {:.3} shows congestion, standing aside", vhf),
            )
        } else if bar.close > sma {
            (
                Bias::Long,
                format!("VHF {:.3} trending, close above SMA {:.4}", vhf, sma),
            )
        } else if bar.close < sma {
            (
                Bias::Short,
                format!("VHF {:.3} trending, close below SMA {:.4}", vhf, sma),
            )
        } else {
            return None;
        };

        let signal = book.tracker.act(
            &ctx,
            bias,
            config.allow_short,
            classify_strength(vhf),
            vhf,
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
        if let Some(book) = book {
            if let Some(vhf) = book.vhf.current() {
                indicators.insert("vhf".to_string(), vhf);
            }
            if let Some(sma) = book.sma.current() {
                indicators.insert("sma".to_string(), sma);
            }
        }

        StrategyState {
            name: self.name().to_string(),
            is_warmed_up: book.is_some_and(SymbolBook::is_formed),
            bars_processed: self.bars_processed,
            signals_generated: self.signals_generated,
            position: book.map_or(PositionSide::Flat, |b| b.tracker.side()),
            indicators,
            custom: serde_json::json!({
                "vhf_period": self.config.vhf_period,
                "vhf_threshold": self.config.vhf_threshold,
                "ma_period": self.config.ma_period,
            }),
        }
    }

    fn warmup_period(&self) -> usize {
        (self.config.vhf_period + 1).max(self.config.ma_period)
    }

    fn symbols(&self) -> &[String] {
        &self.config.symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rulebook_core::types::{Bar, SignalType, Timeframe};

    fn config() -> VhfTrendConfig {
        VhfTrendConfig {
            symbols: vec!["TEST".to_string()],
            vhf_period: 10,
            vhf_threshold: 0.35,
            ma_period: 5,
            allow_short: true,
            protection: ProtectionConfig::default(),
        }
    }

    fn run(strategy: &mut VhfTrendStrategy, prices: &[f64]) -> Vec<Signal> {
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
        bad.vhf_threshold = -0.1;
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.ma_period = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_uptrend_then_congestion() {
        let mut cfg = config();
        cfg.allow_short = false;
        let mut strategy = VhfTrendStrategy::new(cfg);
        let mut prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        // 115, 114, 115, 114, ... drives VHF toward 0.1
        prices.extend((0..20).map(|i| 115.0 - (i % 2) as f64));

        let signals = run(&mut strategy, &prices);
        assert_eq!(signals.first().map(|s| s.signal_type), Some(SignalType::Buy));
        assert_eq!(signals.first().map(|s| s.timestamp), Some(10 * 86_400_000));
        assert_eq!(
            signals.last().map(|s| s.signal_type),
            Some(SignalType::CloseLong)
        );
        assert!(strategy.state().position.is_flat());
    }

    #[test]
    fn test_downtrend_goes_short() {
        let mut strategy = VhfTrendStrategy::new(config());
        let prices: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();

        let signals = run(&mut strategy, &prices);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, SignalType::Sell);
        assert_eq!(signals[0].strength, SignalStrength::Strong);
    }

    #[test]
    fn test_reset() {
        let mut strategy = VhfTrendStrategy::new(config());
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        run(&mut strategy, &prices);
        assert!(strategy.state().is_warmed_up);

        strategy.reset();
        assert!(!strategy.state().is_warmed_up);
        assert_eq!(strategy.state().signals_generated, 0);
    }
}
