//! Moving averages.

use strata_core::{
    Bar, ChartPoint, Indicator, PerSymbol, Resettable, Steppable, SymbolId, SymbolRegistry,
};

use crate::chart::ChartBuffer;

#[derive(Debug, Clone, Copy, Default)]
struct EmaState {
    seen: usize,
    seed_sum: f64,
    ema: f64,
}

/// Exponential Moving Average of the close.
///
/// Seeded with the SMA of the first `period` closes, then
/// `ema = close * k + ema * (1 - k)` with `k = 2 / (period + 1)`.
#[derive(Debug)]
pub struct Ema {
    period: usize,
    multiplier: f64,
    state: PerSymbol<EmaState>,
    chart: ChartBuffer,
}

impl Ema {
    pub fn new(symbols: &SymbolRegistry, period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            multiplier: 2.0 / (period as f64 + 1.0),
            state: PerSymbol::new(symbols, EmaState::default()),
            chart: ChartBuffer::new(symbols),
        }
    }
}

impl Steppable for Ema {
    fn step(&self, bar: &Bar, sym: SymbolId, charting: bool) {
        let value = self.state.with_mut(sym, |s| {
            s.seen += 1;
            if s.seen < self.period {
                s.seed_sum += bar.close;
                return f64::NAN;
            }
            if s.seen == self.period {
                s.ema = (s.seed_sum + bar.close) / self.period as f64;
            } else {
                s.ema = bar.close * self.multiplier + s.ema * (1.0 - self.multiplier);
            }
            s.ema
        });
        if charting {
            self.chart.record(sym, bar.timestamp, value);
        }
    }
}

impl Resettable for Ema {
    fn reset_all(&self) {
        self.state.reset_all();
    }

    fn reset_sym(&self, sym: SymbolId) {
        self.state.reset(sym);
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        "EMA"
    }

    fn value(&self, sym: SymbolId) -> f64 {
        self.state
            .with(sym, |s| if s.seen >= self.period { s.ema } else { f64::NAN })
    }

    fn chart(&self, sym: SymbolId) -> Vec<ChartPoint> {
        self.chart.points(sym)
    }

    fn clear_chart(&self) {
        self.chart.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_calculation() {
        let reg = SymbolRegistry::new(["SPY"]).unwrap();
        let sym = SymbolId(0);
        let ema = Ema::new(&reg, 3);
        for (i, c) in [1.0, 2.0, 3.0, 4.0, 5.0].into_iter().enumerate() {
            ema.step(&Bar::new(i as i64, c, c, c, c, 1.0), sym, false);
        }
        // Seed SMA(1,2,3) = 2, k = 0.5: 3.0, then 4.0
        assert!((ema.value(sym) - 4.0).abs() < 1e-9);
    }
}
