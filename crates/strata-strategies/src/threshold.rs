//! Fixed-threshold breakout.
//!
//! Enters long on the first close at or above a fixed level and exits on a
//! fixed stop or target distance. One sequence step is pushed per bar while
//! the symbol is free or holding; the sample is complete once the trade has
//! closed.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use strata_core::{Bar, PerSymbol, StrataError, StrataResult, SymbolId};
use strata_runtime::{
    Context, HeadSpec, Label, LossSpec, SequenceFeature, SequenceVerdict, StepAction, Strategy,
    StrategyBuilder,
};
use strata_stats::NormalizerKind;

use crate::params::StrategyParams;

/// Configuration for the threshold breakout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParams {
    /// Entry level for the close
    pub threshold: f64,
    pub stop_distance: f64,
    pub target_distance: f64,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            threshold: 100.0,
            stop_distance: 1.0,
            target_distance: 2.0,
        }
    }
}

impl StrategyParams for ThresholdParams {
    fn validate(&self) -> StrataResult<()> {
        if !self.threshold.is_finite() {
            return Err(StrataError::Config("threshold must be finite".into()));
        }
        if !(self.stop_distance > 0.0 && self.stop_distance.is_finite()) {
            return Err(StrataError::Config(
                "stop_distance must be positive".into(),
            ));
        }
        if !(self.target_distance > 0.0 && self.target_distance.is_finite()) {
            return Err(StrataError::Config(
                "target_distance must be positive".into(),
            ));
        }
        Ok(())
    }
}

pub struct ThresholdBreakout {
    params: ThresholdParams,
    threshold: Arc<PerSymbol<f64>>,
    entered: Arc<PerSymbol<bool>>,
    realized_at_entry: Arc<PerSymbol<f64>>,
    log_return: Arc<SequenceFeature>,
    range_pct: Arc<SequenceFeature>,
    trade_return: Arc<Label>,
    symbol: Arc<PerSymbol<i64>>,
}

impl ThresholdBreakout {
    pub fn new(b: &mut StrategyBuilder, params: ThresholdParams) -> StrataResult<Self> {
        params.validate()?;
        Ok(Self {
            threshold: b.integrated("threshold", params.threshold),
            entered: b.daily("entered", false),
            realized_at_entry: b.daily("realized_at_entry", 0.0f64),
            log_return: b.feature("log_return", NormalizerKind::ZScore),
            range_pct: b.feature("range_pct", NormalizerKind::Robust),
            trade_return: b.label(
                "trade_return",
                0.0f64,
                NormalizerKind::ZScore,
                HeadSpec::linear(1),
                LossSpec::Huber,
            ),
            symbol: b.embedding("symbol", 0),
            params,
        })
    }

    pub fn params(&self) -> &ThresholdParams {
        &self.params
    }
}

impl Strategy for ThresholdBreakout {
    fn name(&self) -> &str {
        "threshold_breakout"
    }

    fn new_day(&self, ctx: &Context, _bar: &Bar, sym: SymbolId) -> StrataResult<()> {
        ctx.free(sym);
        Ok(())
    }

    fn process_bar(&self, ctx: &Context, bar: &Bar, sym: SymbolId) -> StrataResult<StepAction> {
        let positions = ctx.positions();
        if positions.is_blocked(sym) || (positions.is_free(sym) && self.entered.get(sym)) {
            return Ok(StepAction::Skip);
        }

        let log_return = match ctx.prev_bar(sym) {
            Some(prev) if prev.close > 0.0 && bar.close > 0.0 => (bar.close / prev.close).ln(),
            _ => 0.0,
        };
        self.log_return.set(sym, log_return as f32);
        let range_pct = if bar.close > 0.0 {
            bar.range() / bar.close
        } else {
            0.0
        };
        self.range_pct.set(sym, range_pct as f32);

        if positions.is_free(sym) && bar.close >= self.threshold.get(sym) {
            self.realized_at_entry
                .set(sym, positions.get(sym).realized_pnl);
            ctx.enter_long(
                sym,
                bar,
                self.params.stop_distance,
                self.params.target_distance,
            )?;
            self.entered.set(sym, true);
        }
        Ok(StepAction::Push)
    }

    fn validate_sequence(&self, ctx: &Context, sym: SymbolId) -> SequenceVerdict {
        if !self.entered.get(sym) || ctx.positions().is_held(sym) {
            return SequenceVerdict::Pending;
        }
        let pos = ctx.positions().get(sym);
        let pnl = pos.realized_pnl - self.realized_at_entry.get(sym);
        let ret = if pos.entry_price > 0.0 {
            pnl / pos.entry_price
        } else {
            0.0
        };
        self.trade_return.set(sym, ret);
        self.symbol.set(sym, sym.index() as i64);
        SequenceVerdict::Ready
    }
}
