//! Backtest statistics.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use rulebook_core::types::{PositionSide, SignalType};
use serde::{Deserialize, Serialize};

/// Record of a single fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    /// Side of the position this fill opened or closed
    pub side: PositionSide,
    /// Signal that caused the fill
    pub signal_type: SignalType,
    pub quantity: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Realised P&L, set on closing fills only
    pub pnl: Option<Decimal>,
}

/// Backtest statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestStats {
    pub initial_capital: Decimal,
    pub final_equity: Decimal,
    pub total_return_pct: Decimal,
    pub annualized_return_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    /// Sharpe ratio (risk-free rate of 0)
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Number of fills
    pub total_trades: usize,
    /// Fills that closed a position
    pub closed_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    pub win_rate_pct: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    /// Gross profit / gross loss
    pub profit_factor: Decimal,
    pub total_commission: Decimal,
    pub bars_processed: usize,
    pub equity_curve: Vec<(i64, Decimal)>,
    pub trades: Vec<TradeRecord>,
    #[serde(skip)]
    peak_equity: Decimal,
    #[serde(skip)]
    returns: Vec<f64>,
}

impl BacktestStats {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            final_equity: initial_capital,
            total_return_pct: Decimal::ZERO,
            annualized_return_pct: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            total_trades: 0,
            closed_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            breakeven_trades: 0,
            win_rate_pct: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            profit_factor: Decimal::ZERO,
            total_commission: Decimal::ZERO,
            bars_processed: 0,
            equity_curve: Vec::new(),
            trades: Vec::new(),
            peak_equity: initial_capital,
            returns: Vec::new(),
        }
    }

    /// Record a bar processed by the engine.
    pub fn record_bar(&mut self) {
        self.bars_processed += 1;
    }

    /// Record equity at a timestamp.
    pub fn record_equity(&mut self, timestamp: i64, equity: Decimal) {
        if let Some((_, prev_equity)) = self.equity_curve.last() {
            if *prev_equity > Decimal::ZERO {
                let ret = ((equity - *prev_equity) / *prev_equity)
                    .to_f64()
                    .unwrap_or(0.0);
                self.returns.push(ret);
            }
        }

        self.equity_curve.push((timestamp, equity));

        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if self.peak_equity > Decimal::ZERO {
            let drawdown = (self.peak_equity - equity) / self.peak_equity * dec!(100);
            if drawdown > self.max_drawdown_pct {
                self.max_drawdown_pct = drawdown;
            }
        }
    }

    pub fn add_trade(&mut self, trade: TradeRecord) {
        self.total_commission += trade.commission;
        self.trades.push(trade);
        self.total_trades += 1;
    }

    /// Calculate final statistics. `periods_per_year` annualises per-sample
    /// returns (252 for daily bars).
    pub fn finalize(&mut self, final_equity: Decimal, periods_per_year: f64) {
        self.final_equity = final_equity;

        if self.initial_capital > Decimal::ZERO {
            self.total_return_pct =
                (self.final_equity - self.initial_capital) / self.initial_capital * dec!(100);
        }

        if !self.returns.is_empty() {
            let periods = self.returns.len() as f64;
            let total_return = self.total_return_pct.to_f64().unwrap_or(0.0) / 100.0;
            let annualized = ((1.0 + total_return).powf(periods_per_year / periods) - 1.0) * 100.0;
            self.annualized_return_pct = Decimal::try_from(annualized).unwrap_or(Decimal::ZERO);
        }

        let mut total_profit = Decimal::ZERO;
        let mut total_loss = Decimal::ZERO;

        for pnl in self.trades.iter().filter_map(|t| t.pnl) {
            self.closed_trades += 1;
            if pnl > Decimal::ZERO {
                self.winning_trades += 1;
                total_profit += pnl;
            } else if pnl < Decimal::ZERO {
                self.losing_trades += 1;
                total_loss += pnl.abs();
            } else {
                self.breakeven_trades += 1;
            }
        }

        if self.closed_trades > 0 {
            self.win_rate_pct =
                Decimal::from(self.winning_trades * 100) / Decimal::from(self.closed_trades);
        }
        if self.winning_trades > 0 {
            self.avg_win = total_profit / Decimal::from(self.winning_trades);
        }
        if self.losing_trades > 0 {
            self.avg_loss = total_loss / Decimal::from(self.losing_trades);
        }
        if total_loss > Decimal::ZERO {
            self.profit_factor = total_profit / total_loss;
        }

        self.sharpe_ratio = sharpe(&self.returns, periods_per_year);
        self.sortino_ratio = sortino(&self.returns, periods_per_year);
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Annualised Sharpe ratio; 0 without dispersion.
pub fn sharpe(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mean = mean(returns);
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std_dev = variance.sqrt();

    if std_dev > 0.0 {
        mean * periods_per_year.sqrt() / std_dev
    } else {
        0.0
    }
}

/// Annualised Sortino ratio over downside deviation; 0 without losses.
pub fn sortino(returns: &[f64], periods_per_year: f64) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if downside.is_empty() {
        return 0.0;
    }
    let downside_dev = (downside.iter().map(|r| r.powi(2)).sum::<f64>() / downside.len() as f64).sqrt();

    if downside_dev > 0.0 {
        mean(returns) * periods_per_year.sqrt() / downside_dev
    } else {
        0.0
    }
}
