//! Per-symbol run metrics.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use strata_core::{ExitRecord, PerSymbol, SymbolId, SymbolRegistry, SymbolSlots};

/// Counters for one symbol, or summed over all symbols.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub days_run: i64,
    pub trades: i64,
    pub wins: i64,
    pub losses: i64,
    pub time_wins: i64,
    pub time_losses: i64,
    pub time_stops: i64,
    pub profit: f64,
}

impl MetricsSummary {
    /// Fraction of trades that were wins. Zero without trades.
    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.trades as f64
        }
    }

    fn add(&mut self, other: &MetricsSummary) {
        self.days_run += other.days_run;
        self.trades += other.trades;
        self.wins += other.wins;
        self.losses += other.losses;
        self.time_wins += other.time_wins;
        self.time_losses += other.time_losses;
        self.time_stops += other.time_stops;
        self.profit += other.profit;
    }
}

/// Metric containers, registered with the runtime so they persist in
/// snapshots and reset with the symbol.
#[derive(Debug)]
pub struct Metrics {
    days_run: Arc<PerSymbol<i64>>,
    trades: Arc<PerSymbol<i64>>,
    wins: Arc<PerSymbol<i64>>,
    losses: Arc<PerSymbol<i64>>,
    time_wins: Arc<PerSymbol<i64>>,
    time_losses: Arc<PerSymbol<i64>>,
    time_stops: Arc<PerSymbol<i64>>,
    profit: Arc<PerSymbol<f64>>,
}

fn counter(name: &str, symbols: &SymbolRegistry) -> Arc<PerSymbol<i64>> {
    Arc::new(PerSymbol::named(format!("metric.{name}"), symbols, 0))
}

impl Metrics {
    pub(crate) fn new(symbols: &SymbolRegistry) -> Self {
        Self {
            days_run: counter("days_run", symbols),
            trades: counter("trades", symbols),
            wins: counter("wins", symbols),
            losses: counter("losses", symbols),
            time_wins: counter("time_wins", symbols),
            time_losses: counter("time_losses", symbols),
            time_stops: counter("time_stops", symbols),
            profit: Arc::new(PerSymbol::named("metric.profit", symbols, 0.0)),
        }
    }

    pub(crate) fn containers(&self) -> Vec<Arc<dyn SymbolSlots>> {
        vec![
            self.days_run.clone(),
            self.trades.clone(),
            self.wins.clone(),
            self.losses.clone(),
            self.time_wins.clone(),
            self.time_losses.clone(),
            self.time_stops.clone(),
            self.profit.clone(),
        ]
    }

    pub(crate) fn record_day(&self, sym: SymbolId) {
        self.days_run.with_mut(sym, |d| *d += 1);
    }

    /// Count a closed trade and add the consumed PnL to the profit.
    pub(crate) fn record_exit(&self, sym: SymbolId, rec: &ExitRecord, consumed_pnl: f64) {
        let win = rec.is_win();
        self.trades.with_mut(sym, |v| *v += 1);
        if win {
            self.wins.with_mut(sym, |v| *v += 1);
        } else {
            self.losses.with_mut(sym, |v| *v += 1);
        }
        if rec.time_stop {
            self.time_stops.with_mut(sym, |v| *v += 1);
            let bucket = if win { &self.time_wins } else { &self.time_losses };
            bucket.with_mut(sym, |v| *v += 1);
        }
        self.profit.with_mut(sym, |p| *p += consumed_pnl);
    }

    pub fn summary(&self, sym: SymbolId) -> MetricsSummary {
        MetricsSummary {
            days_run: self.days_run.get(sym),
            trades: self.trades.get(sym),
            wins: self.wins.get(sym),
            losses: self.losses.get(sym),
            time_wins: self.time_wins.get(sym),
            time_losses: self.time_losses.get(sym),
            time_stops: self.time_stops.get(sym),
            profit: self.profit.get(sym),
        }
    }

    /// Sum over every symbol.
    pub fn totals(&self) -> MetricsSummary {
        let mut total = MetricsSummary::default();
        for i in 0..self.trades.len() {
            total.add(&self.summary(SymbolId::from(i)));
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::Side;

    fn record(pnl: f64, time_stop: bool) -> ExitRecord {
        ExitRecord {
            side: Side::Long,
            entry_price: 10.0,
            entry_time: 0,
            exit_price: 10.0 + pnl,
            exit_time: 1,
            stop_price: 9.0,
            target_price: 12.0,
            pnl,
            time_stop,
        }
    }

    #[test]
    fn test_record_exit() {
        let reg = SymbolRegistry::new(["A", "B"]).unwrap();
        let m = Metrics::new(&reg);
        let a = SymbolId(0);
        m.record_exit(a, &record(2.0, false), 2.0);
        m.record_exit(a, &record(-1.0, true), -1.0);
        m.record_exit(SymbolId(1), &record(0.5, true), 0.5);

        let s = m.summary(a);
        assert_eq!((s.trades, s.wins, s.losses), (2, 1, 1));
        assert_eq!((s.time_stops, s.time_wins, s.time_losses), (1, 0, 1));
        assert!((s.profit - 1.0).abs() < 1e-12);
        assert!((s.win_rate() - 0.5).abs() < 1e-12);

        let t = m.totals();
        assert_eq!(t.trades, 3);
        assert_eq!(t.time_wins, 1);
        assert!((t.profit - 1.5).abs() < 1e-12);
    }
}
