//! Bar-replay backtesting engine.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use rulebook_core::traits::Strategy;
use rulebook_core::types::{Bar, BarSeries, PositionSide, Signal, SignalType, Timeframe};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::account::{Account, Fill};
use crate::report::BacktestReport;
use crate::statistics::{BacktestStats, TradeRecord};

/// Backtest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: Decimal,
    /// Flat commission charged per fill
    pub commission: Decimal,
    /// Slippage percentage applied against every signal fill
    pub slippage_pct: Decimal,
    /// Percentage of current equity committed to each entry
    pub position_pct: Decimal,
    /// Bar interval, used to annualise ratios
    pub timeframe: Timeframe,
    /// Close positions still open after the last bar
    pub close_at_end: bool,
    /// Bars kept per symbol in the series handed to the strategy
    pub history: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(100000),
            commission: Decimal::ZERO,
            slippage_pct: dec!(0.05),
            position_pct: dec!(95),
            timeframe: Timeframe::Daily,
            close_at_end: true,
            history: 500,
        }
    }
}

/// Backtesting engine.
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Replay `data` through `strategy` and simulate its signals.
    ///
    /// Bars of all symbols are merged in timestamp order (ties by symbol)
    /// and equity is recorded once per distinct timestamp.
    pub fn run(
        &self,
        strategy: &mut dyn Strategy,
        data: HashMap<String, Vec<Bar>>,
    ) -> BacktestReport {
        let mut account = Account::new(
            self.config.initial_capital,
            self.config.commission,
            self.config.slippage_pct,
        );
        let mut stats = BacktestStats::new(self.config.initial_capital);

        let mut series_map: HashMap<String, BarSeries> = data
            .keys()
            .map(|symbol| {
                (
                    symbol.clone(),
                    BarSeries::with_capacity(symbol.clone(), self.config.timeframe, self.config.history),
                )
            })
            .collect();

        let mut events: Vec<(i64, &str, Bar)> = data
            .iter()
            .flat_map(|(symbol, bars)| bars.iter().map(move |bar| (bar.timestamp, symbol.as_str(), *bar)))
            .collect();
        events.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        info!(
            strategy = strategy.name(),
            symbols = data.len(),
            bars = events.len(),
            "Starting backtest"
        );

        for (i, &(timestamp, symbol, bar)) in events.iter().enumerate() {
            stats.record_bar();

            match Decimal::try_from(bar.close)
                .ok()
                .filter(|close| *close > Decimal::ZERO)
            {
                Some(close) => {
                    account.mark(symbol, close);

                    if let Some(series) = series_map.get_mut(symbol) {
                        series.push(bar);
                        if let Some(signal) = strategy.on_bar(series) {
                            self.execute(&mut account, &mut stats, &signal, symbol, close, timestamp);
                        }
                    }
                }
                None => {
                    warn!(symbol, timestamp, close = bar.close, "Skipping bar with unusable close");
                }
            }

            let last_of_timestamp = events.get(i + 1).map_or(true, |next| next.0 != timestamp);
            if last_of_timestamp {
                stats.record_equity(timestamp, account.equity());
            }
        }

        if self.config.close_at_end {
            for symbol in account.open_symbols() {
                let Some(price) = account.last_price(&symbol) else {
                    continue;
                };
                let timestamp = data
                    .get(&symbol)
                    .and_then(|bars| bars.last())
                    .map_or(0, |b| b.timestamp);
                let side = account.side(&symbol);
                if let (Some(fill), Some(signal_type)) =
                    (account.close(&symbol, price, false), side.close_signal())
                {
                    record_fill(&mut stats, &symbol, signal_type, fill, timestamp);
                }
            }
        }

        stats.finalize(account.equity(), self.config.timeframe.bars_per_year());

        info!(
            strategy = strategy.name(),
            trades = stats.total_trades,
            total_return_pct = %stats.total_return_pct.round_dp(2),
            "Backtest finished"
        );

        BacktestReport {
            strategy: strategy.name().to_string(),
            config: self.config.clone(),
            stats,
            final_state: strategy.state(),
        }
    }

    /// Turn a signal into fills. Entries flip an opposite position first.
    fn execute(
        &self,
        account: &mut Account,
        stats: &mut BacktestStats,
        signal: &Signal,
        symbol: &str,
        price: Decimal,
        timestamp: i64,
    ) {
        let current = account.side(symbol);
        let (close_first, open) = match signal.signal_type {
            SignalType::Buy => (current == PositionSide::Short, current != PositionSide::Long),
            SignalType::Sell => (current == PositionSide::Long, current != PositionSide::Short),
            SignalType::CloseLong => (current == PositionSide::Long, false),
            SignalType::CloseShort => (current == PositionSide::Short, false),
            SignalType::Hold => (false, false),
        };

        if close_first {
            if let Some(fill) = account.close(symbol, price, true) {
                let close_type = current.close_signal().unwrap_or(signal.signal_type);
                record_fill(stats, symbol, close_type, fill, timestamp);
            }
        }

        if open {
            let side = PositionSide::Flat.after(signal.signal_type);
            let fill_price = account.slipped(price, side == PositionSide::Long);
            if fill_price <= Decimal::ZERO {
                warn!(symbol, %price, %fill_price, "Entry skipped: non-positive fill price");
            } else {
                let budget = account.equity() * self.config.position_pct / dec!(100);
                let quantity = (budget / fill_price).floor();

                match account.open(symbol, side, quantity, price) {
                    Some(fill) => record_fill(stats, symbol, signal.signal_type, fill, timestamp),
                    None => warn!(symbol, %quantity, "Entry skipped: nothing to buy with current equity"),
                }
            }
        }

        if !close_first && !open {
            debug!(symbol, signal = %signal.signal_type, position = ?current, "Signal ignored");
        }
    }
}

fn record_fill(
    stats: &mut BacktestStats,
    symbol: &str,
    signal_type: SignalType,
    fill: Fill,
    timestamp: i64,
) {
    debug!(
        symbol,
        signal = %signal_type,
        price = %fill.price,
        quantity = %fill.quantity,
        pnl = ?fill.pnl,
        "Fill"
    );
    stats.add_trade(TradeRecord {
        symbol: symbol.to_string(),
        side: fill.side,
        signal_type,
        quantity: fill.quantity,
        price: fill.price,
        commission: fill.commission,
        timestamp: DateTime::from_timestamp_millis(timestamp).unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        pnl: fill.pnl,
    });
}
