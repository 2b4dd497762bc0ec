//! Backtesting engine.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use strata_core::{StrataError, StrataResult};
use strata_data::BarStore;
use strata_runtime::{
    Executor, ReplaySummary, SequenceMode, StatsPhase, StatsReport, StrategyRuntime, SymbolFeed,
};

use crate::report::{BacktestReport, SymbolReport};
use crate::statistics::BacktestStats;

/// Backtest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_capital: Decimal,
    /// Shares per trade
    pub position_size: Decimal,
    /// Unix ms. Bars before this warm the runtime up; `None` replays
    /// everything without warm-up.
    pub start_time: Option<i64>,
    /// Unix ms, exclusive
    pub end_time: Option<i64>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(100000),
            position_size: dec!(100),
            start_time: None,
            end_time: None,
        }
    }
}

/// Replays stored bars through a strategy runtime.
#[derive(Debug, Clone, Default)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    fn check_symbols(runtime: &StrategyRuntime, store: &BarStore) -> StrataResult<()> {
        if runtime.symbols().iter().eq(store.symbols().iter()) {
            Ok(())
        } else {
            Err(StrataError::Config(
                "bar store and runtime use different symbol registries".into(),
            ))
        }
    }

    /// Warm every symbol up on its history before `start_time`, then replay
    /// the rest through the executor.
    fn replay(&self, runtime: &Arc<StrategyRuntime>, store: &BarStore) -> StrataResult<ReplaySummary> {
        let start = self.config.start_time.unwrap_or(i64::MIN);
        let end = self.config.end_time.unwrap_or(i64::MAX);

        let mut feeds = Vec::with_capacity(store.symbols().len());
        for (sym, _) in store.symbols().iter() {
            if self.config.start_time.is_some() {
                runtime.warm_up(sym, store.get(sym), start)?;
            }
            feeds.push(SymbolFeed::new(sym, store.range(sym, start, end).to_vec()));
        }
        Executor::new(Arc::clone(runtime)).replay(feeds)
    }

    /// Run a backtest on the calling thread. The runtime is reset first;
    /// normalization statistics survive the reset.
    pub fn run_blocking(
        &self,
        runtime: &Arc<StrategyRuntime>,
        store: &BarStore,
    ) -> StrataResult<BacktestReport> {
        Self::check_symbols(runtime, store)?;
        runtime.reset();
        info!(
            strategy = runtime.name(),
            symbols = store.symbols().len(),
            bars = store.total_bars(),
            "backtest started"
        );

        let replay = self.replay(runtime, store)?;
        let events = runtime.trade_events();
        let mut stats = BacktestStats::from_events(
            self.config.initial_capital,
            self.config.position_size,
            &events,
        );
        stats.bars_processed = replay.bars;
        stats.samples = runtime.collector().len();

        let metrics = runtime.context().metrics();
        let per_symbol = runtime
            .symbols()
            .iter()
            .map(|(sym, name)| SymbolReport {
                symbol: name.to_string(),
                metrics: metrics.summary(sym),
            })
            .collect();

        info!(
            strategy = runtime.name(),
            trades = stats.total_trades,
            bars = replay.bars,
            return_pct = %stats.total_return_pct,
            "backtest finished"
        );
        Ok(BacktestReport {
            strategy: runtime.name().to_string(),
            config: self.config.clone(),
            stats,
            totals: metrics.totals(),
            per_symbol,
            replay,
        })
    }

    pub async fn run(
        &self,
        runtime: Arc<StrategyRuntime>,
        store: Arc<BarStore>,
    ) -> StrataResult<BacktestReport> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.run_blocking(&runtime, &store))
            .await
            .map_err(|e| StrataError::Strategy(format!("backtest task failed: {e}")))?
    }

    /// Fit normalization statistics with two replays over the same bars.
    ///
    /// The first pass merges moments and sketches medians, the second feeds
    /// deviations from those medians for the MAD. The runtime must build
    /// sequences. Previously fitted statistics are discarded.
    pub fn fit_normalization_blocking(
        &self,
        runtime: &Arc<StrategyRuntime>,
        store: &BarStore,
    ) -> StrataResult<StatsReport> {
        Self::check_symbols(runtime, store)?;
        if runtime.config().sequence_mode != SequenceMode::Build {
            return Err(StrataError::Config(
                "fitting normalization requires sequence_mode = build".into(),
            ));
        }
        let sequences = runtime.context().sequences();
        sequences.clear_stats();

        runtime.reset();
        runtime.set_stats_phase(StatsPhase::Moments);
        let first = self.replay(runtime, store)?;
        let samples = runtime.collector().len();
        sequences.finalize_median()?;
        info!(samples, bars = first.bars, "moment pass complete");

        runtime.reset();
        runtime.set_stats_phase(StatsPhase::Mad);
        let second = self.replay(runtime, store)?;
        sequences.finalize_mad()?;
        info!(samples = runtime.collector().len(), bars = second.bars, "MAD pass complete");

        runtime.reset();
        runtime.set_stats_phase(StatsPhase::Moments);
        Ok(sequences.stats_report())
    }

    pub async fn fit_normalization(
        &self,
        runtime: Arc<StrategyRuntime>,
        store: Arc<BarStore>,
    ) -> StrataResult<StatsReport> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.fit_normalization_blocking(&runtime, &store))
            .await
            .map_err(|e| StrataError::Strategy(format!("fit task failed: {e}")))?
    }
}
