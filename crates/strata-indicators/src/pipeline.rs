//! Ordered collections of filters and indicators.

use std::sync::Arc;
use strata_core::{Bar, Filter, Indicator, SymbolId};

/// Indicators stepped in registration order.
#[derive(Default, Clone)]
pub struct IndicatorPipeline {
    indicators: Vec<Arc<dyn Indicator>>,
}

impl IndicatorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, indicator: Arc<dyn Indicator>) {
        self.indicators.push(indicator);
    }

    pub fn step(&self, bar: &Bar, sym: SymbolId, charting: bool) {
        for ind in &self.indicators {
            ind.step(bar, sym, charting);
        }
    }

    pub fn warm_up(&self, bars: &[Bar], sym: SymbolId) {
        for ind in &self.indicators {
            ind.warm_up(bars, sym);
        }
    }

    pub fn reset_all(&self) {
        for ind in &self.indicators {
            ind.reset_all();
        }
    }

    pub fn reset_sym(&self, sym: SymbolId) {
        for ind in &self.indicators {
            ind.reset_sym(sym);
        }
    }

    pub fn clear_charts(&self) {
        for ind in &self.indicators {
            ind.clear_chart();
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Indicator>> {
        self.indicators.iter().find(|i| i.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Indicator>> {
        self.indicators.iter()
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

/// Filters stepped in registration order; a symbol passes when every
/// filter passes.
#[derive(Default, Clone)]
pub struct FilterPipeline {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn step(&self, bar: &Bar, sym: SymbolId, charting: bool) {
        for f in &self.filters {
            f.step(bar, sym, charting);
        }
    }

    pub fn warm_up(&self, bars: &[Bar], sym: SymbolId) {
        for f in &self.filters {
            f.warm_up(bars, sym);
        }
    }

    /// Conjunction of all filters. An empty pipeline passes.
    pub fn validate(&self, sym: SymbolId) -> bool {
        self.filters.iter().all(|f| f.validate(sym))
    }

    pub fn reset_all(&self) {
        for f in &self.filters {
            f.reset_all();
        }
    }

    pub fn reset_sym(&self, sym: SymbolId) {
        for f in &self.filters {
            f.reset_sym(sym);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Filter>> {
        self.filters.iter().find(|f| f.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Filter>> {
        self.filters.iter()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Atr, RollingVolume, Vwap};
    use strata_core::SymbolRegistry;

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                Bar::new(i as i64 * 60_000, c, c + 1.0, c - 1.0, c, 1000.0)
            })
            .collect()
    }

    #[test]
    fn test_warm_up_matches_stepping() {
        let reg = SymbolRegistry::new(["A"]).unwrap();
        let sym = SymbolId(0);

        let mut stepped = IndicatorPipeline::new();
        stepped.push(Arc::new(Atr::new(&reg, 5)));
        stepped.push(Arc::new(Vwap::new(&reg)));
        let mut warmed = IndicatorPipeline::new();
        warmed.push(Arc::new(Atr::new(&reg, 5)));
        warmed.push(Arc::new(Vwap::new(&reg)));

        let history = bars(20);
        for b in &history {
            stepped.step(b, sym, false);
        }
        warmed.warm_up(&history, sym);

        for (a, b) in stepped.iter().zip(warmed.iter()) {
            assert!((a.value(sym) - b.value(sym)).abs() < 1e-12);
        }
        assert!(stepped.get("VWAP").is_some());
    }

    #[test]
    fn test_filter_conjunction() {
        let reg = SymbolRegistry::new(["A"]).unwrap();
        let sym = SymbolId(0);
        let mut filters = FilterPipeline::new();
        assert!(filters.validate(sym));

        filters.push(Arc::new(RollingVolume::new(&reg, 1, 500.0)));
        filters.push(Arc::new(RollingVolume::new(&reg, 1, 2000.0)));
        filters.step(&bars(1)[0], sym, false);
        assert!(!filters.validate(sym));

        if let Some(f) = filters.iter().nth(1) {
            f.set_threshold(900.0, sym);
        }
        assert!(filters.validate(sym));

        filters.reset_sym(sym);
        assert!(!filters.validate(sym));
    }
}
