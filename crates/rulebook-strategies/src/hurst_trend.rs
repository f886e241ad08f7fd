//! Hurst Trend strategy.
//!
//! Trades only while the rolling Hurst exponent says the market is
//! persistent. In that regime price above its SMA means long and price below
//! means short; once the series turns random or mean-reverting any open
//! position is closed.

use std::collections::HashMap;

use rulebook_core::{
    error::StrategyError,
    traits::{Strategy, StrategyConfig, StrategyState, StreamingIndicator},
    types::{BarSeries, PositionSide, Signal, SignalStrength},
};
use rulebook_indicators::{HurstEstimator, StreamingSma};
use serde::{Deserialize, Serialize};

use crate::position::{Bias, PositionTracker, SignalContext};
use crate::protection::ProtectionConfig;

/// Configuration for the Hurst Trend strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HurstTrendConfig {
    /// Symbols to trade
    pub symbols: Vec<String>,
    /// Number of closes in the Hurst window
    pub hurst_period: usize,
    /// Hurst value above which the market is treated as trending
    pub hurst_threshold: f64,
    /// SMA period used for direction
    pub sma_period: usize,
    /// Go short in a down-trend instead of only closing longs
    pub allow_short: bool,
    #[serde(default)]
    pub protection: ProtectionConfig,
}

impl Default for HurstTrendConfig {
    fn default() -> Self {
        Self {
            symbols: vec![],
            hurst_period: 100,
            hurst_threshold: 0.55,
            sma_period: 50,
            allow_short: true,
            protection: ProtectionConfig::stop_loss(2.0),
        }
    }
}

impl StrategyConfig for HurstTrendConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.hurst_period < 2 {
            return Err(StrategyError::InvalidConfig(
                "Hurst period must be at least 2".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.hurst_threshold) {
            return Err(StrategyError::InvalidConfig(
                "Hurst threshold must be between 0 and 1".into(),
            ));
        }
        if self.sma_period == 0 {
            return Err(StrategyError::InvalidConfig(
                "SMA period must be greater than 0".into(),
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

/// Indicator and position state for one symbol.
#[derive(Debug, Clone)]
struct SymbolBook {
    hurst: HurstEstimator,
    sma: StreamingSma,
    tracker: PositionTracker,
    last_hurst: f64,
    last_sma: Option<f64>,
}

impl SymbolBook {
    fn new(config: &HurstTrendConfig) -> Self {
        Self {
            hurst: HurstEstimator::new(config.hurst_period),
            sma: StreamingSma::new(config.sma_period),
            tracker: PositionTracker::new(config.protection.clone()),
            last_hurst: 0.5,
            last_sma: None,
        }
    }

    fn is_formed(&self) -> bool {
        self.hurst.is_ready() && self.sma.is_ready()
    }
}

/// Further above the threshold = stronger trend.
fn classify_strength(hurst: f64, threshold: f64) -> SignalStrength {
    let excess = hurst - threshold;
    if excess > 0.2 {
        SignalStrength::Strong
    } else if excess > 0.1 {
        SignalStrength::Moderate
    } else {
        SignalStrength::Weak
    }
}

/// Hurst-filtered trend following.
pub struct HurstTrendStrategy {
    config: HurstTrendConfig,
    books: HashMap<String, SymbolBook>,
    last_symbol: Option<String>,
    bars_processed: usize,
    signals_generated: usize,
}

impl HurstTrendStrategy {
    pub fn new(config: HurstTrendConfig) -> Self {
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

impl Strategy for HurstTrendStrategy {
    fn name(&self) -> &str {
        "Hurst Trend"
    }

    fn description(&self) -> &str {
        "Follows the SMA direction while the Hurst exponent signals a persistent trend"
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

        book.last_hurst = book.hurst.push_price(bar.close);
        book.last_sma = book.sma.update(bar.close);

        let hurst = book.last_hurst;
        let sma = book.last_sma?;
        let indicators = [("hurst", hurst), ("sma", sma)];
        let ctx = SignalContext {
            strategy: "Hurst Trend",
            symbol: &series.symbol,
            bar: &bar,
            indicators: &indicators,
        };

        if let Some(signal) = book.tracker.protect(&ctx) {
            self.signals_generated += 1;
            return Some(signal);
        }

        if !book.is_formed() {
            return None;
        }

        let trending = hurst > config.hurst_threshold;
        let (bias, reason) = if !trending {
            (
                Bias::Flat,
                format!(
                    "Hurst {:.3} at or below {:.3}, no persistent trend",
                    hurst, config.hurst_threshold
                ),
            )
        } else if bar.close > sma {
            (
                Bias::Long,
                format!("Trending (H={:.3}) with close above SMA {:.4}", hurst, sma),
            )
        } else if bar.close < sma {
            (
                Bias::Short,
                format!("Trending (H={:.3}) with close below SMA {:.4}", hurst, sma),
            )
        } else {
            (Bias::Stay, String::new())
        };

        let strength = if trending {
            classify_strength(hurst, config.hurst_threshold)
        } else {
            SignalStrength::Moderate
        };
        let signal = book
            .tracker
            .act(&ctx, bias, config.allow_short, strength, hurst, reason)?;
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
            indicators.insert("hurst".to_string(), book.last_hurst);
            if let Some(sma) = book.last_sma {
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
                "hurst_period": self.config.hurst_period,
                "hurst_threshold": self.config.hurst_threshold,
                "sma_period": self.config.sma_period,
            }),
        }
    }

    fn warmup_period(&self) -> usize {
        self.config.hurst_period.max(self.config.sma_period)
    }

    fn symbols(&self) -> &[String] {
        &self.config.symbols
    }
}
