//! In-memory per-symbol bar store.

use std::sync::Arc;

use strata_core::{Bar, StrataError, StrataResult, SymbolId, SymbolRegistry};

/// Sorted bars for every registered symbol.
#[derive(Debug, Clone)]
pub struct BarStore {
    symbols: Arc<SymbolRegistry>,
    bars: Vec<Vec<Bar>>,
}

impl BarStore {
    pub fn new(symbols: Arc<SymbolRegistry>) -> Self {
        let bars = vec![Vec::new(); symbols.len()];
        Self { symbols, bars }
    }

    pub fn symbols(&self) -> &Arc<SymbolRegistry> {
        &self.symbols
    }

    /// Replace the bars of `sym`. Input need not be sorted.
    ///
    /// Panics if `sym` is not registered.
    pub fn insert(&mut self, sym: SymbolId, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.timestamp);
        self.bars[sym.index()] = bars;
    }

    /// Insert by symbol name.
    pub fn insert_named(&mut self, name: &str, bars: Vec<Bar>) -> StrataResult<()> {
        let sym = self
            .symbols
            .id(name)
            .ok_or_else(|| StrataError::UnknownSymbol(name.to_string()))?;
        self.insert(sym, bars);
        Ok(())
    }

    pub fn get(&self, sym: SymbolId) -> &[Bar] {
        self.bars.get(sym.index()).map_or(&[], Vec::as_slice)
    }

    /// Bars strictly before `t`.
    pub fn before(&self, sym: SymbolId, t: i64) -> &[Bar] {
        let bars = self.get(sym);
        &bars[..bars.partition_point(|b| b.timestamp < t)]
    }

    /// Bars at or after `t`.
    pub fn from(&self, sym: SymbolId, t: i64) -> &[Bar] {
        let bars = self.get(sym);
        &bars[bars.partition_point(|b| b.timestamp < t)..]
    }

    /// Bars in `[start, end)`.
    pub fn range(&self, sym: SymbolId, start: i64, end: i64) -> &[Bar] {
        let bars = self.from(sym, start);
        &bars[..bars.partition_point(|b| b.timestamp < end)]
    }

    pub fn len_of(&self, sym: SymbolId) -> usize {
        self.get(sym).len()
    }

    pub fn total_bars(&self) -> usize {
        self.bars.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_bars() == 0
    }

    /// Earliest and latest timestamp across all symbols.
    pub fn time_span(&self) -> Option<(i64, i64)> {
        let first = self.bars.iter().filter_map(|b| b.first()).map(|b| b.timestamp).min()?;
        let last = self.bars.iter().filter_map(|b| b.last()).map(|b| b.timestamp).max()?;
        Some((first, last))
    }
}
