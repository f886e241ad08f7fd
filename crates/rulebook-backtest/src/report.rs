//! Backtest report generation.

use rulebook_core::traits::StrategyState;
use serde::{Deserialize, Serialize};

use crate::{BacktestConfig, BacktestStats};

const RULE: &str = "───────────────────────────────────────────────────────────\n";
const BANNER: &str = "═══════════════════════════════════════════════════════════\n";

/// Complete backtest report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Strategy display name
    pub strategy: String,
    pub config: BacktestConfig,
    pub stats: BacktestStats,
    /// Strategy snapshot after the last bar
    pub final_state: StrategyState,
}

impl BacktestReport {
    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let stats = &self.stats;
        let mut s = String::new();

        s.push_str(BANNER);
        s.push_str(&format!("  BACKTEST REPORT: {}\n", self.strategy));
        s.push_str(BANNER);
        s.push('\n');

        s.push_str("PERFORMANCE\n");
        s.push_str(RULE);
        s.push_str(&format!("  Initial Capital:     ${:.2}\n", stats.initial_capital));
        s.push_str(&format!("  Final Equity:        ${:.2}\n", stats.final_equity));
        s.push_str(&format!("  Total Return:        {:.2}%\n", stats.total_return_pct));
        s.push_str(&format!("  Annualized Return:   {:.2}%\n", stats.annualized_return_pct));
        s.push_str(&format!("  Max Drawdown:        {:.2}%\n", stats.max_drawdown_pct));
        s.push('\n');

        s.push_str("RISK METRICS\n");
        s.push_str(RULE);
        s.push_str(&format!("  Sharpe Ratio:        {:.2}\n", stats.sharpe_ratio));
        s.push_str(&format!("  Sortino Ratio:       {:.2}\n", stats.sortino_ratio));
        s.push_str(&format!("  Profit Factor:       {:.2}\n", stats.profit_factor));
        s.push('\n');

        s.push_str("TRADE STATISTICS\n");
        s.push_str(RULE);
        s.push_str(&format!("  Fills:               {}\n", stats.total_trades));
        s.push_str(&format!("  Closed Trades:       {}\n", stats.closed_trades));
        s.push_str(&format!("  Winning Trades:      {}\n", stats.winning_trades));
        s.push_str(&format!("  Losing Trades:       {}\n", stats.losing_trades));
        s.push_str(&format!("  Breakeven Trades:    {}\n", stats.breakeven_trades));
        s.push_str(&format!("  Win Rate:            {:.2}%\n", stats.win_rate_pct));
        s.push_str(&format!("  Avg Win:             ${:.2}\n", stats.avg_win));
        s.push_str(&format!("  Avg Loss:            ${:.2}\n", stats.avg_loss));
        s.push_str(&format!("  Commission Paid:     ${:.2}\n", stats.total_commission));
        s.push('\n');

        s.push_str("EXECUTION\n");
        s.push_str(RULE);
        s.push_str(&format!("  Bars Processed:      {}\n", stats.bars_processed));
        s.push_str(&format!("  Equity Points:       {}\n", stats.equity_curve.len()));
        s.push_str(&format!(
            "  Signals Generated:   {}\n",
            self.final_state.signals_generated
        ));
        s.push('\n');

        s.push_str(BANNER);
        s
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export the equity curve as CSV.
    pub fn equity_to_csv(&self) -> String {
        let mut csv = String::from("timestamp,equity\n");
        for (ts, equity) in &self.stats.equity_curve {
            csv.push_str(&format!("{},{}\n", ts, equity));
        }
        csv
    }
}
