//! Volatility indicators.

use strata_core::{
    Bar, ChartPoint, Indicator, PerSymbol, Resettable, Steppable, SymbolId, SymbolRegistry,
};

use crate::chart::ChartBuffer;

#[derive(Debug, Clone, Copy, Default)]
struct AtrState {
    prev_close: Option<f64>,
    seen: usize,
    seed_sum: f64,
    atr: f64,
}

/// Average True Range.
///
/// Seeded with the mean of the first `period` true ranges, then smoothed
/// with Wilder's formula `atr = (atr * (period - 1) + tr) / period`. The
/// first bar of a symbol has no previous close and uses its high-low range.
#[derive(Debug)]
pub struct Atr {
    period: usize,
    state: PerSymbol<AtrState>,
    chart: ChartBuffer,
}

impl Atr {
    /// Common period is 14. A zero period is treated as one.
    pub fn new(symbols: &SymbolRegistry, period: usize) -> Self {
        Self {
            period: period.max(1),
            state: PerSymbol::new(symbols, AtrState::default()),
            chart: ChartBuffer::new(symbols),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Whether the symbol has seen enough bars for a value.
    pub fn is_ready(&self, sym: SymbolId) -> bool {
        self.state.with(sym, |s| s.seen >= self.period)
    }
}

impl Steppable for Atr {
    fn step(&self, bar: &Bar, sym: SymbolId, charting: bool) {
        let period = self.period as f64;
        let value = self.state.with_mut(sym, |s| {
            let tr = bar.true_range(s.prev_close);
            s.prev_close = Some(bar.close);
            s.seen += 1;
            if s.seen < self.period {
                s.seed_sum += tr;
                return f64::NAN;
            }
            if s.seen == self.period {
                s.atr = (s.seed_sum + tr) / period;
            } else {
                s.atr = (s.atr * (period - 1.0) + tr) / period;
            }
            s.atr
        });
        if charting {
            self.chart.record(sym, bar.timestamp, value);
        }
    }
}

impl Resettable for Atr {
    fn reset_all(&self) {
        self.state.reset_all();
    }

    fn reset_sym(&self, sym: SymbolId) {
        self.state.reset(sym);
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        "ATR"
    }

    fn value(&self, sym: SymbolId) -> f64 {
        self.state
            .with(sym, |s| if s.seen >= self.period { s.atr } else { f64::NAN })
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

    fn bars() -> Vec<Bar> {
        // high, low, close
        [
            (48.70, 47.79, 48.16),
            (48.72, 48.14, 48.61),
            (48.90, 48.39, 48.75),
            (48.87, 48.37, 48.63),
            (48.82, 48.24, 48.74),
        ]
        .iter()
        .enumerate()
        .map(|(i, &(h, l, c))| Bar::new(i as i64 * 60_000, c, h, l, c, 1000.0))
        .collect()
    }

    #[test]
    fn test_atr_seed_and_wilder() {
        let reg = SymbolRegistry::new(["AAPL"]).unwrap();
        let sym = SymbolId(0);
        let atr = Atr::new(&reg, 3);
        let bars = bars();

        atr.step(&bars[0], sym, false);
        atr.step(&bars[1], sym, false);
        assert!(atr.value(sym).is_nan());

        atr.step(&bars[2], sym, false);
        // TRs: 0.91, 0.58, 0.51
        let seed = (0.91 + 0.58 + 0.51) / 3.0;
        assert!((atr.value(sym) - seed).abs() < 1e-9);

        atr.step(&bars[3], sym, false);
        // TR: max(0.50, |48.87-48.75|, |48.37-48.75|) = 0.50
        let next = (seed * 2.0 + 0.50) / 3.0;
        assert!((atr.value(sym) - next).abs() < 1e-9);
    }

    #[test]
    fn test_atr_symbols_independent() {
        let reg = SymbolRegistry::new(["AAPL", "MSFT"]).unwrap();
        let atr = Atr::new(&reg, 2);
        for b in bars() {
            atr.step(&b, SymbolId(0), true);
        }
        assert!(atr.is_ready(SymbolId(0)));
        assert!(!atr.is_ready(SymbolId(1)));
        // First bar charts NaN, which is skipped.
        assert_eq!(atr.chart(SymbolId(0)).len(), 4);
        atr.reset_sym(SymbolId(0));
        assert!(atr.value(SymbolId(0)).is_nan());
    }
}
