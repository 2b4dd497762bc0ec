//! Backtest report generation.

use serde::{Deserialize, Serialize};

use strata_runtime::{MetricsSummary, ReplaySummary};

use crate::{BacktestConfig, BacktestStats};

/// Runtime counters of one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub metrics: MetricsSummary,
}

/// Complete backtest report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub strategy: String,
    pub config: BacktestConfig,
    pub stats: BacktestStats,
    /// Runtime counters summed over all symbols
    pub totals: MetricsSummary,
    pub per_symbol: Vec<SymbolReport>,
    pub replay: ReplaySummary,
}

const RULE: &str = "═══════════════════════════════════════════════════════════\n";
const THIN: &str = "───────────────────────────────────────────────────────────\n";

impl BacktestReport {
    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let st = &self.stats;
        let mut s = String::new();

        s.push_str(RULE);
        s.push_str(&format!("  BACKTEST REPORT: {}\n", self.strategy));
        s.push_str(RULE);
        s.push('\n');

        s.push_str("PERFORMANCE\n");
        s.push_str(THIN);
        s.push_str(&format!("  Initial Capital:     ${:.2}\n", st.initial_capital));
        s.push_str(&format!("  Final Equity:        ${:.2}\n", st.final_equity));
        s.push_str(&format!("  Total Return:        {:.2}%\n", st.total_return_pct));
        s.push_str(&format!("  Max Drawdown:        {:.2}%\n", st.max_drawdown_pct));
        s.push_str(&format!("  Sharpe Ratio:        {:.2}\n", st.sharpe_ratio));
        s.push_str(&format!("  Sortino Ratio:       {:.2}\n", st.sortino_ratio));
        s.push_str(&format!("  Profit Factor:       {:.2}\n", st.profit_factor));
        s.push('\n');

        s.push_str("TRADE STATISTICS\n");
        s.push_str(THIN);
        s.push_str(&format!("  Total Trades:        {}\n", st.total_trades));
        s.push_str(&format!("  Winning Trades:      {}\n", st.winning_trades));
        s.push_str(&format!("  Losing Trades:       {}\n", st.losing_trades));
        s.push_str(&format!("  Breakeven Trades:    {}\n", st.breakeven_trades));
        s.push_str(&format!("  Time Stops:          {}\n", st.time_stops));
        s.push_str(&format!("  Win Rate:            {:.2}%\n", st.win_rate_pct));
        s.push_str(&format!("  Avg Win:             ${:.2}\n", st.avg_win));
        s.push_str(&format!("  Avg Loss:            ${:.2}\n", st.avg_loss));
        s.push_str(&format!("  Avg Hold:            {:.1} min\n", st.avg_hold_minutes));
        s.push('\n');

        s.push_str("SYMBOLS\n");
        s.push_str(THIN);
        for r in &self.per_symbol {
            s.push_str(&format!(
                "  {:<8} days {:>4}  trades {:>4}  win {:>6.2}%  pnl {:>10.2}\n",
                r.symbol,
                r.metrics.days_run,
                r.metrics.trades,
                r.metrics.win_rate() * 100.0,
                r.metrics.profit
            ));
        }
        s.push('\n');

        s.push_str("EXECUTION\n");
        s.push_str(THIN);
        s.push_str(&format!("  Bars Processed:      {}\n", st.bars_processed));
        s.push_str(&format!("  Readers:             {}\n", self.replay.readers));
        s.push_str(&format!("  Barrier Rounds:      {}\n", self.replay.rounds));
        s.push_str(&format!("  Samples:             {}\n", st.samples));
        s.push('\n');
        s.push_str(RULE);
        s
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV (equity curve only).
    pub fn equity_to_csv(&self) -> String {
        let mut csv = String::from("timestamp,equity\n");
        for (ts, equity) in &self.stats.equity_curve {
            csv.push_str(&format!("{ts},{equity}\n"));
        }
        csv
    }
}
