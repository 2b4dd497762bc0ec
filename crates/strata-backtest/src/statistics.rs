//! Backtest statistics.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use strata_core::Side;
use strata_runtime::TradeEvent;

fn to_decimal(x: f64) -> Decimal {
    Decimal::try_from(x).unwrap_or(Decimal::ZERO)
}

fn to_time(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Record of a single round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// PnL for `quantity` shares
    pub pnl: Decimal,
    pub time_stop: bool,
}

impl TradeRecord {
    pub fn from_event(event: &TradeEvent, quantity: Decimal) -> Self {
        Self {
            symbol: event.symbol_name.clone(),
            side: event.side,
            quantity,
            entry_price: to_decimal(event.entry_price),
            exit_price: to_decimal(event.exit_price),
            entry_time: to_time(event.entry_time),
            exit_time: to_time(event.exit_time),
            pnl: to_decimal(event.pnl) * quantity,
            time_stop: event.time_stop,
        }
    }
}

/// Backtest statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestStats {
    pub initial_capital: Decimal,
    pub final_equity: Decimal,
    pub total_return_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    /// Annualized, over daily returns of days with exits
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub breakeven_trades: usize,
    pub time_stops: usize,
    pub win_rate_pct: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    /// Gross profit / gross loss; zero without losses
    pub profit_factor: Decimal,
    pub avg_hold_minutes: f64,
    pub bars_processed: usize,
    /// Sequence samples handed off during the run
    pub samples: usize,
    /// Equity after each exit
    pub equity_curve: Vec<(i64, Decimal)>,
    pub trades: Vec<TradeRecord>,
}

impl BacktestStats {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            final_equity: initial_capital,
            total_return_pct: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            breakeven_trades: 0,
            time_stops: 0,
            win_rate_pct: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            profit_factor: Decimal::ZERO,
            avg_hold_minutes: 0.0,
            bars_processed: 0,
            samples: 0,
            equity_curve: Vec::new(),
            trades: Vec::new(),
        }
    }

    /// Compute statistics from the trade log of a run. Events are ordered
    /// by exit time before the equity curve is built.
    pub fn from_events(initial_capital: Decimal, quantity: Decimal, events: &[TradeEvent]) -> Self {
        let mut stats = Self::new(initial_capital);
        let mut ordered: Vec<&TradeEvent> = events.iter().collect();
        ordered.sort_by_key(|e| (e.exit_time, e.symbol));

        let mut equity = initial_capital;
        let mut peak = initial_capital;
        let mut hold_ms = 0i64;
        for event in ordered {
            let trade = TradeRecord::from_event(event, quantity);
            equity += trade.pnl;
            stats.equity_curve.push((event.exit_time, equity));
            if equity > peak {
                peak = equity;
            }
            if peak > Decimal::ZERO {
                let drawdown = (peak - equity) / peak * dec!(100);
                if drawdown > stats.max_drawdown_pct {
                    stats.max_drawdown_pct = drawdown;
                }
            }
            hold_ms += event.duration_ms();
            stats.trades.push(trade);
        }
        stats.total_trades = stats.trades.len();
        if stats.total_trades > 0 {
            stats.avg_hold_minutes = hold_ms as f64 / 60_000.0 / stats.total_trades as f64;
        }
        stats.finalize(equity);
        stats
    }

    fn finalize(&mut self, final_equity: Decimal) {
        self.final_equity = final_equity;
        if self.initial_capital > Decimal::ZERO {
            self.total_return_pct =
                (self.final_equity - self.initial_capital) / self.initial_capital * dec!(100);
        }

        let mut total_profit = Decimal::ZERO;
        let mut total_loss = Decimal::ZERO;
        for trade in &self.trades {
            if trade.pnl > Decimal::ZERO {
                self.winning_trades += 1;
                total_profit += trade.pnl;
            } else if trade.pnl < Decimal::ZERO {
                self.losing_trades += 1;
                total_loss += trade.pnl.abs();
            } else {
                self.breakeven_trades += 1;
            }
            if trade.time_stop {
                self.time_stops += 1;
            }
        }

        if self.total_trades > 0 {
            self.win_rate_pct =
                Decimal::from(self.winning_trades * 100) / Decimal::from(self.total_trades);
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

        let returns = self.daily_returns();
        if returns.is_empty() {
            return;
        }
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        if std_dev > 0.0 {
            self.sharpe_ratio = mean * 252.0_f64.sqrt() / std_dev;
        }

        let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        if !downside.is_empty() {
            let downside_dev =
                (downside.iter().map(|r| r.powi(2)).sum::<f64>() / downside.len() as f64).sqrt();
            if downside_dev > 0.0 {
                self.sortino_ratio = mean * 252.0_f64.sqrt() / downside_dev;
            }
        }
    }

    /// Returns between the closing equity of consecutive exit days, the
    /// first measured from the initial capital.
    fn daily_returns(&self) -> Vec<f64> {
        let mut closes: Vec<(NaiveDate, Decimal)> = Vec::new();
        for &(ts, equity) in &self.equity_curve {
            let day = to_time(ts).date_naive();
            match closes.last_mut() {
                Some((d, e)) if *d == day => *e = equity,
                _ => closes.push((day, equity)),
            }
        }

        let mut prev = self.initial_capital;
        let mut returns = Vec::with_capacity(closes.len());
        for (_, equity) in closes {
            if prev > Decimal::ZERO {
                let r = (equity - prev) / prev;
                returns.push(r.to_f64().unwrap_or(0.0));
            }
            prev = equity;
        }
        returns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::SymbolId;

    const DAY: i64 = 86_400_000;

    fn event(exit_time: i64, pnl: f64, time_stop: bool) -> TradeEvent {
        TradeEvent {
            symbol: SymbolId(0),
            symbol_name: "AAPL".into(),
            side: Side::Long,
            entry_time: exit_time - 30 * 60_000,
            entry_price: 100.0,
            exit_time,
            exit_price: 100.0 + pnl,
            stop_price: 98.0,
            target_price: 103.0,
            pnl,
            time_stop,
        }
    }

    #[test]
    fn test_trade_counts_and_equity() {
        let events = vec![
            event(3 * DAY, -1.0, true),
            event(DAY, 2.0, false),
            event(2 * DAY, 0.0, true),
        ];
        let stats = BacktestStats::from_events(dec!(10000), dec!(100), &events);

        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.winning_trades, 1);
        assert_eq!(stats.losing_trades, 1);
        assert_eq!(stats.breakeven_trades, 1);
        assert_eq!(stats.time_stops, 2);
        assert_eq!(stats.final_equity, dec!(10100));
        assert_eq!(stats.total_return_pct, dec!(1));
        assert_eq!(stats.profit_factor, dec!(2));
        assert!((stats.avg_hold_minutes - 30.0).abs() < 1e-9);

        // Sorted by exit: +200, 0, -100
        let curve: Vec<Decimal> = stats.equity_curve.iter().map(|(_, e)| *e).collect();
        assert_eq!(curve, vec![dec!(10200), dec!(10200), dec!(10100)]);
        assert!(stats.max_drawdown_pct > Decimal::ZERO);
    }

    #[test]
    fn test_empty_run() {
        let stats = BacktestStats::from_events(dec!(10000), dec!(1), &[]);
        assert_eq!(stats.total_trades, 0);
        assert_eq!(stats.final_equity, dec!(10000));
        assert_eq!(stats.win_rate_pct, Decimal::ZERO);
        assert_eq!(stats.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_sharpe_sign() {
        let events: Vec<TradeEvent> = (1..=5)
            .map(|d| event(d * DAY, if d % 2 == 0 { 1.0 } else { 3.0 }, false))
            .collect();
        let stats = BacktestStats::from_events(dec!(1000), dec!(1), &events);
        assert!(stats.sharpe_ratio > 0.0);
        // No losing days
        assert_eq!(stats.sortino_ratio, 0.0);
    }
}
