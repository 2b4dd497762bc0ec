//! Volume-based indicator and filter.

use chrono::NaiveDate;
use std::sync::Arc;
use strata_core::{
    Bar, ChartPoint, Filter, Indicator, PerSymbol, Resettable, Steppable, SymbolId,
    SymbolRegistry, SymbolSlots,
};

use crate::chart::ChartBuffer;
use crate::rolling::RollingSum;

#[derive(Debug, Clone, Copy, Default)]
struct VwapState {
    date: Option<NaiveDate>,
    price_volume: f64,
    volume: f64,
}

/// Volume Weighted Average Price over the current trading day.
///
/// Accumulates `typical_price * volume` and volume; both restart on the
/// first bar of a new UTC date.
#[derive(Debug)]
pub struct Vwap {
    state: PerSymbol<VwapState>,
    chart: ChartBuffer,
}

impl Vwap {
    pub fn new(symbols: &SymbolRegistry) -> Self {
        Self {
            state: PerSymbol::new(symbols, VwapState::default()),
            chart: ChartBuffer::new(symbols),
        }
    }
}

impl Steppable for Vwap {
    fn step(&self, bar: &Bar, sym: SymbolId, charting: bool) {
        let date = bar.date();
        let value = self.state.with_mut(sym, |s| {
            if s.date != Some(date) {
                *s = VwapState {
                    date: Some(date),
                    ..VwapState::default()
                };
            }
            s.price_volume += bar.typical_price() * bar.volume;
            s.volume += bar.volume;
            if s.volume > 0.0 {
                s.price_volume / s.volume
            } else {
                f64::NAN
            }
        });
        if charting {
            self.chart.record(sym, bar.timestamp, value);
        }
    }
}

impl Resettable for Vwap {
    fn reset_all(&self) {
        self.state.reset_all();
    }

    fn reset_sym(&self, sym: SymbolId) {
        self.state.reset(sym);
    }
}

impl Indicator for Vwap {
    fn name(&self) -> &str {
        "VWAP"
    }

    fn value(&self, sym: SymbolId) -> f64 {
        self.state.with(sym, |s| {
            if s.volume > 0.0 {
                s.price_volume / s.volume
            } else {
                f64::NAN
            }
        })
    }

    fn chart(&self, sym: SymbolId) -> Vec<ChartPoint> {
        self.chart.points(sym)
    }

    fn clear_chart(&self) {
        self.chart.clear();
    }
}

/// Passes while the volume summed over the last `period` bars reaches the
/// symbol's threshold.
#[derive(Debug)]
pub struct RollingVolume {
    sums: PerSymbol<RollingSum>,
    thresholds: Arc<PerSymbol<f64>>,
}

impl RollingVolume {
    pub fn new(symbols: &SymbolRegistry, period: usize, threshold: f64) -> Self {
        Self {
            sums: PerSymbol::new(symbols, RollingSum::new(period)),
            thresholds: Arc::new(PerSymbol::named(
                "rolling_volume.threshold",
                symbols,
                threshold,
            )),
        }
    }

    pub fn threshold(&self, sym: SymbolId) -> f64 {
        self.thresholds.get(sym)
    }
}

impl Steppable for RollingVolume {
    fn step(&self, bar: &Bar, sym: SymbolId, _charting: bool) {
        self.sums.with_mut(sym, |r| r.push(bar.volume));
    }
}

impl Resettable for RollingVolume {
    fn reset_all(&self) {
        self.sums.reset_all();
    }

    fn reset_sym(&self, sym: SymbolId) {
        self.sums.reset(sym);
    }
}

impl Filter for RollingVolume {
    fn name(&self) -> &str {
        "RollingVolume"
    }

    fn validate(&self, sym: SymbolId) -> bool {
        let threshold = self.thresholds.get(sym);
        self.sums.with(sym, |r| r.is_full() && r.sum() >= threshold)
    }

    fn value(&self, sym: SymbolId) -> f64 {
        self.sums.with(sym, RollingSum::sum)
    }

    fn set_threshold(&self, threshold: f64, sym: SymbolId) {
        self.thresholds.set(sym, threshold);
    }

    fn containers(&self) -> Vec<Arc<dyn SymbolSlots>> {
        let thresholds: Arc<dyn SymbolSlots> = self.thresholds.clone();
        vec![thresholds]
    }
}
