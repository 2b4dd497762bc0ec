//! Chart point recording.

use strata_core::{ChartPoint, PerSymbol, SymbolId, SymbolRegistry};

/// Per-symbol list of `(timestamp, value)` points.
#[derive(Debug)]
pub struct ChartBuffer {
    points: PerSymbol<Vec<ChartPoint>>,
}

impl ChartBuffer {
    pub fn new(symbols: &SymbolRegistry) -> Self {
        Self {
            points: PerSymbol::new(symbols, Vec::new()),
        }
    }

    /// Record a point. Non-finite values are skipped.
    pub fn record(&self, sym: SymbolId, timestamp: i64, value: f64) {
        if value.is_finite() {
            self.points.with_mut(sym, |p| p.push((timestamp, value)));
        }
    }

    pub fn points(&self, sym: SymbolId) -> Vec<ChartPoint> {
        self.points.get(sym)
    }

    pub fn clear(&self) {
        self.points.reset_all();
    }
}
