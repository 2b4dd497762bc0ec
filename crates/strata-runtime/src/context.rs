//! Shared per-bar context handed to strategy hooks.

use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use strata_core::{
    Bar, ExitRecord, PerSymbol, PositionBook, Side, StrataResult, SymbolId, SymbolRegistry,
};
use strata_indicators::{FilterPipeline, IndicatorPipeline};

use crate::config::RuntimeConfig;
use crate::events::{TradeEvent, TradeLog};
use crate::metrics::Metrics;
use crate::sequence::SequenceBuilder;

/// Containers the runtime keeps for every strategy.
pub(crate) struct CoreSlots {
    pub(crate) prev_bar: Arc<PerSymbol<Option<Bar>>>,
    pub(crate) current_date: Arc<PerSymbol<Option<NaiveDate>>>,
    pub(crate) warming: Arc<PerSymbol<bool>>,
    pub(crate) started: Arc<PerSymbol<bool>>,
    pub(crate) prediction: Arc<PerSymbol<Option<f64>>>,
}

/// Everything a strategy hook may read or act on.
pub struct Context {
    symbols: Arc<SymbolRegistry>,
    config: RuntimeConfig,
    positions: PositionBook,
    indicators: IndicatorPipeline,
    filters: FilterPipeline,
    sequences: SequenceBuilder,
    metrics: Metrics,
    trades: TradeLog,
    pub(crate) core: CoreSlots,
    charting: AtomicBool,
}

impl Context {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        symbols: Arc<SymbolRegistry>,
        config: RuntimeConfig,
        positions: PositionBook,
        indicators: IndicatorPipeline,
        filters: FilterPipeline,
        sequences: SequenceBuilder,
        metrics: Metrics,
        core: CoreSlots,
    ) -> Self {
        let charting = AtomicBool::new(config.charting);
        Self {
            symbols,
            config,
            positions,
            indicators,
            filters,
            sequences,
            metrics,
            trades: TradeLog::new(),
            core,
            charting,
        }
    }

    pub fn symbols(&self) -> &SymbolRegistry {
        &self.symbols
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn positions(&self) -> &PositionBook {
        &self.positions
    }

    pub fn indicators(&self) -> &IndicatorPipeline {
        &self.indicators
    }

    pub fn filters(&self) -> &FilterPipeline {
        &self.filters
    }

    pub fn sequences(&self) -> &SequenceBuilder {
        &self.sequences
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn trades(&self) -> &TradeLog {
        &self.trades
    }

    /// Whether every filter passes for the symbol.
    pub fn filters_pass(&self, sym: SymbolId) -> bool {
        self.filters.validate(sym)
    }

    /// Bar processed before the current one.
    pub fn prev_bar(&self, sym: SymbolId) -> Option<Bar> {
        self.core.prev_bar.get(sym)
    }

    pub fn current_date(&self, sym: SymbolId) -> Option<NaiveDate> {
        self.core.current_date.get(sym)
    }

    /// Set while the symbol replays history during warm-up.
    pub fn is_warming(&self, sym: SymbolId) -> bool {
        self.core.warming.get(sym)
    }

    /// Latest model output for the symbol.
    pub fn prediction(&self, sym: SymbolId) -> Option<f64> {
        self.core.prediction.get(sym)
    }

    pub fn is_charting(&self) -> bool {
        self.charting.load(Ordering::Relaxed)
    }

    pub(crate) fn set_charting(&self, on: bool) {
        self.charting.store(on, Ordering::Relaxed);
    }

    /// Open a position at the bar's close.
    pub fn enter(
        &self,
        sym: SymbolId,
        side: Side,
        bar: &Bar,
        stop_distance: f64,
        target_distance: f64,
    ) -> StrataResult<()> {
        self.positions
            .enter(sym, side, bar.close, bar.timestamp, stop_distance, target_distance)?;
        Ok(())
    }

    pub fn enter_long(
        &self,
        sym: SymbolId,
        bar: &Bar,
        stop_distance: f64,
        target_distance: f64,
    ) -> StrataResult<()> {
        self.enter(sym, Side::Long, bar, stop_distance, target_distance)
    }

    pub fn enter_short(
        &self,
        sym: SymbolId,
        bar: &Bar,
        stop_distance: f64,
        target_distance: f64,
    ) -> StrataResult<()> {
        self.enter(sym, Side::Short, bar, stop_distance, target_distance)
    }

    /// Close the symbol's position on `bar` and book the trade.
    ///
    /// The booked PnL is consumed into the profit metric, so the symbol can
    /// enter again once it is free. Outside warm-up the trade is counted
    /// and appended to the trade log.
    pub fn exit(&self, sym: SymbolId, bar: &Bar, time_stop: bool) -> StrataResult<ExitRecord> {
        let rec = self.positions.exit(sym, bar, time_stop)?;
        let pnl = self.positions.consume_pnl(sym);
        if !self.is_warming(sym) {
            self.metrics.record_exit(sym, &rec, pnl);
            let name = self.symbols.name(sym);
            info!(
                symbol = name,
                side = ?rec.side,
                entry = rec.entry_price,
                exit = rec.exit_price,
                pnl,
                time_stop,
                "trade closed"
            );
            self.trades.push(TradeEvent::new(sym, name, &rec));
        }
        Ok(rec)
    }

    pub fn block(&self, sym: SymbolId) {
        self.positions.block(sym);
    }

    /// Release a blocked symbol. Returns whether it was blocked.
    pub fn free(&self, sym: SymbolId) -> bool {
        self.positions.free(sym)
    }

    pub fn clear_sequence(&self, sym: SymbolId) {
        self.sequences.clear_sequence(sym);
    }

    pub fn trim_sequence(&self, sym: SymbolId, length: usize, from_begin: bool) {
        self.sequences.trim_sequence(sym, length, from_begin);
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("symbols", &self.symbols.len())
            .field("config", &self.config)
            .field("indicators", &self.indicators.len())
            .field("filters", &self.filters.len())
            .field("sequences", &self.sequences)
            .finish()
    }
}
