//! The per-symbol strategy runtime.

use parking_lot::{Mutex, RwLock};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use strata_core::{
    read_snapshot, write_snapshot, Bar, ChartPoint, DataStatus, SnapshotLoad, StrataError,
    StrataResult, SymbolId, SymbolRegistry, SymbolSlots,
};

use crate::builder::{Registries, StrategyBuilder};
use crate::config::{RuntimeConfig, SequenceMode, WarmUpMode};
use crate::context::Context;
use crate::events::TradeEvent;
use crate::sequence::{SampleCollector, SampleConsumer, StatsPhase};
use crate::strategy::{StepAction, Strategy};

/// Drives one strategy over every symbol.
///
/// Per bar, in order: day change handling, filters, indicators, the
/// strategy hook, stop/target exits, the sequence push, then readiness
/// evaluation and handoff. The runtime is shared between reader threads;
/// each symbol must only be processed by one thread at a time.
pub struct StrategyRuntime {
    strategy: Box<dyn Strategy>,
    ctx: Context,
    registries: Registries,
    collector: Arc<SampleCollector>,
    consumer: RwLock<Option<Arc<dyn SampleConsumer>>>,
    phase: Mutex<StatsPhase>,
    stopped: AtomicBool,
}

impl StrategyRuntime {
    /// Register a strategy's containers and components, then wrap it.
    ///
    /// # Example
    /// ```ignore
    /// let rt = StrategyRuntime::build(symbols, config, |b| Ok(MyStrategy::new(b)))?;
    /// ```
    pub fn build<S, F>(
        symbols: Arc<SymbolRegistry>,
        config: RuntimeConfig,
        factory: F,
    ) -> StrataResult<Self>
    where
        S: Strategy + 'static,
        F: FnOnce(&mut StrategyBuilder) -> StrataResult<S>,
    {
        let mut builder = StrategyBuilder::new(symbols, config);
        let strategy = factory(&mut builder)?;
        Self::new(builder, Box::new(strategy))
    }

    pub fn new(builder: StrategyBuilder, strategy: Box<dyn Strategy>) -> StrataResult<Self> {
        let (ctx, registries) = builder.finish()?;
        info!(
            strategy = strategy.name(),
            symbols = ctx.symbols().len(),
            containers = registries.master.len(),
            indicators = ctx.indicators().len(),
            filters = ctx.filters().len(),
            features = ctx.sequences().features().len(),
            "strategy runtime ready"
        );
        Ok(Self {
            strategy,
            ctx,
            registries,
            collector: Arc::new(SampleCollector::new()),
            consumer: RwLock::new(None),
            phase: Mutex::new(StatsPhase::Moments),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        self.strategy.name()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.ctx.config()
    }

    pub fn symbols(&self) -> &SymbolRegistry {
        self.ctx.symbols()
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Every registered container, in registration order.
    pub fn containers(&self) -> &[Arc<dyn SymbolSlots>] {
        &self.registries.master
    }

    /// Samples handed off in build mode.
    pub fn collector(&self) -> &Arc<SampleCollector> {
        &self.collector
    }

    /// Model consumer used in infer mode.
    pub fn set_consumer(&self, consumer: Arc<dyn SampleConsumer>) {
        *self.consumer.write() = Some(consumer);
    }

    pub fn stats_phase(&self) -> StatsPhase {
        *self.phase.lock()
    }

    /// Which statistics pass build-mode handoffs feed.
    pub fn set_stats_phase(&self, phase: StatsPhase) {
        *self.phase.lock() = phase;
    }

    pub fn set_charting(&self, on: bool) {
        self.ctx.set_charting(on);
    }

    /// Ask readers to stop after their current bar.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn ensure_started(&self, sym: SymbolId) {
        if !self.ctx.core.started.get(sym) {
            self.ctx.core.started.set(sym, true);
            self.strategy.start(&self.ctx, sym);
        }
    }

    fn require_symbol(&self, sym: SymbolId) -> StrataResult<()> {
        if self.ctx.symbols().contains(sym) {
            Ok(())
        } else {
            Err(StrataError::UnknownSymbol(sym.to_string()))
        }
    }

    /// Run the full per-bar pipeline for one symbol.
    pub fn process_bar(&self, bar: &Bar, sym: SymbolId) -> StrataResult<()> {
        self.require_symbol(sym)?;
        self.ensure_started(sym);
        let ctx = &self.ctx;
        let warming = ctx.is_warming(sym);
        let charting = ctx.is_charting() && !warming;

        let date = bar.date();
        if ctx.current_date(sym) != Some(date) {
            ctx.core.current_date.set(sym, Some(date));
            for c in &self.registries.daily {
                c.reset_sym(sym);
            }
            ctx.sequences().clear_sequence(sym);
            if !warming {
                ctx.metrics().record_day(sym);
            }
            debug!(symbol = ctx.symbols().name(sym), %date, "new trading day");
            self.strategy.new_day(ctx, bar, sym)?;
        }

        ctx.filters().step(bar, sym, charting);
        ctx.indicators().step(bar, sym, charting);

        let action = self.strategy.process_bar(ctx, bar, sym)?;

        let positions = ctx.positions();
        if positions.is_held(sym)
            && positions.get(sym).entry_time != bar.timestamp
            && positions.check_exit(sym, bar)
        {
            ctx.exit(sym, bar, false)?;
            if self.config().block_after_exit {
                ctx.block(sym);
            }
        }

        if action == StepAction::Push {
            ctx.sequences().push_step(sym);
        }

        if ctx.sequences().status(sym) == DataStatus::Wip {
            let verdict = self.strategy.validate_sequence(ctx, sym);
            ctx.sequences().evaluate(sym, verdict);
        }
        if !warming && ctx.sequences().status(sym) == DataStatus::Ready {
            self.handoff(bar, sym)?;
        }

        ctx.core.prev_bar.set(sym, Some(*bar));
        Ok(())
    }

    fn handoff(&self, bar: &Bar, sym: SymbolId) -> StrataResult<()> {
        let seq = self.ctx.sequences();
        let scope = self.config().norm_scope;
        match self.config().sequence_mode {
            SequenceMode::Off => {}
            SequenceMode::Build => {
                seq.accumulate(sym, self.stats_phase())?;
                if let Some(sample) = seq.take_sample(sym, bar.timestamp, scope, false) {
                    self.collector.consume(&sample);
                }
            }
            SequenceMode::Infer => {
                if let Some(sample) = seq.take_sample(sym, bar.timestamp, scope, true) {
                    let consumer = self.consumer.read().clone();
                    let prediction = consumer.and_then(|c| c.consume(&sample));
                    self.ctx.core.prediction.set(sym, prediction);
                }
            }
        }
        Ok(())
    }

    /// Replay the bars of `history` strictly before `start_time` using the
    /// configured warm-up mode. Returns the number of bars replayed.
    pub fn warm_up(&self, sym: SymbolId, history: &[Bar], start_time: i64) -> StrataResult<usize> {
        self.warm_up_with(sym, history, start_time, self.config().warm_up)
    }

    /// `history` must be sorted by timestamp.
    pub fn warm_up_with(
        &self,
        sym: SymbolId,
        history: &[Bar],
        start_time: i64,
        mode: WarmUpMode,
    ) -> StrataResult<usize> {
        self.require_symbol(sym)?;
        self.ensure_started(sym);
        let end = history.partition_point(|b| b.timestamp < start_time);
        let bars = &history[..end];

        match mode {
            WarmUpMode::IndicatorsOnly => {
                self.ctx.filters().warm_up(bars, sym);
                self.ctx.indicators().warm_up(bars, sym);
                if let Some(last) = bars.last() {
                    self.ctx.core.prev_bar.set(sym, Some(*last));
                }
            }
            WarmUpMode::FullReplay => {
                self.ctx.core.warming.set(sym, true);
                let replayed = bars.iter().try_for_each(|b| self.process_bar(b, sym));
                self.ctx.core.warming.set(sym, false);
                replayed?;
                self.ctx.sequences().clear_sequence(sym);
            }
        }
        debug!(
            symbol = self.symbols().name(sym),
            bars = bars.len(),
            ?mode,
            "warm-up complete"
        );
        Ok(bars.len())
    }

    /// Replace the default of a named container and reset every symbol to it.
    pub fn set_var(&self, name: &str, value: &str) -> StrataResult<()> {
        let c = self
            .registries
            .get(name)
            .ok_or_else(|| StrataError::UnknownVariable(name.to_string()))?;
        c.set_default_str(value)?;
        info!(variable = name, value, "variable set");
        Ok(())
    }

    /// Apply several overrides. Nothing is applied unless every name is
    /// registered and every value parses.
    pub fn apply_overrides<'a, I>(&self, overrides: I) -> StrataResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut checked = Vec::new();
        for (name, value) in overrides {
            let c = self
                .registries
                .get(name)
                .ok_or_else(|| StrataError::UnknownVariable(name.to_string()))?;
            c.check_default_str(value)?;
            checked.push((c, value));
        }
        for (c, value) in checked {
            c.set_default_str(value)?;
        }
        Ok(())
    }

    /// `(name, default)` of every registered container.
    pub fn var_defaults(&self) -> Vec<(String, String)> {
        self.registries
            .master
            .iter()
            .map(|c| (c.name().to_string(), c.describe_default()))
            .collect()
    }

    /// `(name, value)` of every registered container for one symbol.
    pub fn describe(&self, sym: SymbolId) -> Vec<(String, String)> {
        self.registries
            .master
            .iter()
            .map(|c| (c.name().to_string(), c.describe(sym)))
            .collect()
    }

    pub fn save_snapshot<W: Write>(&self, out: W) -> StrataResult<()> {
        write_snapshot(out, &self.registries.master)
    }

    /// Load a snapshot. Containers that cannot be applied keep their state
    /// and are listed in the returned outcome.
    pub fn load_snapshot<R: Read>(&self, inp: R) -> StrataResult<SnapshotLoad> {
        let outcome = read_snapshot(inp, &self.registries.master)?;
        if !outcome.is_complete() {
            warn!(rejected = outcome.rejected.len(), "snapshot partially applied");
        }
        Ok(outcome)
    }

    /// Return one symbol to its defaults.
    pub fn reset_symbol(&self, sym: SymbolId) {
        for c in &self.registries.master {
            c.reset_sym(sym);
        }
        self.ctx.filters().reset_sym(sym);
        self.ctx.indicators().reset_sym(sym);
        self.ctx.trades().clear_symbol(sym);
    }

    /// Return every symbol to its defaults and drop charting buffers,
    /// collected samples and the stop flag. Normalization statistics are
    /// kept.
    pub fn reset(&self) {
        for c in &self.registries.master {
            c.reset_all();
        }
        self.ctx.filters().reset_all();
        self.ctx.indicators().reset_all();
        self.clear_charting();
        self.collector.clear();
        self.stopped.store(false, Ordering::SeqCst);
        debug!(strategy = self.name(), "runtime reset");
    }

    pub fn trade_events(&self) -> Vec<TradeEvent> {
        self.ctx.trades().events()
    }

    /// Chart points of a named indicator.
    pub fn chart(&self, indicator: &str, sym: SymbolId) -> Option<Vec<ChartPoint>> {
        self.ctx.indicators().get(indicator).map(|i| i.chart(sym))
    }

    /// Drop the trade log and every indicator chart.
    pub fn clear_charting(&self) {
        self.ctx.trades().clear();
        self.ctx.indicators().clear_charts();
    }
}

impl std::fmt::Debug for StrategyRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRuntime")
            .field("strategy", &self.strategy.name())
            .field("ctx", &self.ctx)
            .finish()
    }
}
