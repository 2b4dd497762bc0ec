//! Opening Range Breakout.
//!
//! The first `or_minutes` of each day define the opening range. Once it is
//! complete, a close beyond the range by `breakout_fraction` of its width
//! opens a position in the breakout direction, with an ATR-based stop and a
//! reward/risk scaled target. Positions still open after
//! `exit_after_minutes` are closed on a time stop, and no new trade is
//! opened after `stop_trading_minutes`. At most one trade is taken per day.
//!
//! Every bar from the open until the trade closes is pushed as a sequence
//! step. The `success` label marks trades whose best excursion reached
//! `success_threshold` opening-range widths.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::sync::Arc;
use tracing::debug;

use strata_core::{Bar, Indicator, PerSymbol, Side, StrataError, StrataResult, SymbolId};
use strata_indicators::{Atr, RollingVolume, Vwap};
use strata_runtime::{
    Context, HeadSpec, Label, LossSpec, SequenceFeature, SequenceVerdict, StepAction, Strategy,
    StrategyBuilder,
};
use strata_stats::NormalizerKind;

use crate::params::StrategyParams;

const MINUTE_MS: i64 = 60_000;

/// Configuration for the Opening Range Breakout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbParams {
    /// Length of the opening range
    pub or_minutes: i64,
    /// Target distance as a multiple of the stop distance
    pub reward_risk: f64,
    /// Stop distance as a multiple of ATR
    pub atr_mult: f64,
    pub atr_period: usize,
    /// Time stop, measured from entry
    pub exit_after_minutes: i64,
    /// No entries after this long since the open
    pub stop_trading_minutes: i64,
    /// Breakout distance beyond the range, as a fraction of its width
    pub breakout_fraction: f64,
    /// Excursion, in range widths, that labels a trade a success
    pub success_threshold: f64,
    pub volume_period: usize,
    /// Minimum volume summed over `volume_period` bars
    pub volume_threshold: f64,
    /// Longest sequence kept for a sample
    pub max_sequence: usize,
}

impl Default for OrbParams {
    fn default() -> Self {
        Self {
            or_minutes: 32,
            reward_risk: 1.5,
            atr_mult: 4.0,
            atr_period: 14,
            exit_after_minutes: 60,
            stop_trading_minutes: 120,
            breakout_fraction: 0.2,
            success_threshold: 0.9,
            volume_period: 5,
            volume_threshold: 0.0,
            max_sequence: 90,
        }
    }
}

impl StrategyParams for OrbParams {
    fn validate(&self) -> StrataResult<()> {
        if self.or_minutes <= 0 {
            return Err(StrataError::Config("or_minutes must be positive".into()));
        }
        if self.stop_trading_minutes <= self.or_minutes {
            return Err(StrataError::Config(
                "stop_trading_minutes must exceed or_minutes".into(),
            ));
        }
        if self.stop_trading_minutes <= 5 {
            return Err(StrataError::Config(
                "stop_trading_minutes must exceed 5".into(),
            ));
        }
        if self.exit_after_minutes <= 0 {
            return Err(StrataError::Config(
                "exit_after_minutes must be positive".into(),
            ));
        }
        if !(self.reward_risk > 0.0 && self.atr_mult > 0.0) {
            return Err(StrataError::Config(
                "reward_risk and atr_mult must be positive".into(),
            ));
        }
        if self.atr_period == 0 || self.volume_period == 0 || self.max_sequence == 0 {
            return Err(StrataError::Config(
                "atr_period, volume_period and max_sequence must be positive".into(),
            ));
        }
        Ok(())
    }
}

struct OrbFeatures {
    open_rel: Arc<SequenceFeature>,
    close_rel: Arc<SequenceFeature>,
    high_rel: Arc<SequenceFeature>,
    low_rel: Arc<SequenceFeature>,
    vwap_dist: Arc<SequenceFeature>,
    volume: Arc<SequenceFeature>,
    volatility: Arc<SequenceFeature>,
    pos_in_range: Arc<SequenceFeature>,
    sin_time: Arc<SequenceFeature>,
    cos_time: Arc<SequenceFeature>,
    or_finished: Arc<SequenceFeature>,
}

impl OrbFeatures {
    fn register(b: &mut StrategyBuilder) -> Self {
        use NormalizerKind::{Identity, Robust, ZScore};
        Self {
            open_rel: b.feature("open_rel", Robust),
            close_rel: b.feature("close_rel", Robust),
            high_rel: b.feature("high_rel", Robust),
            low_rel: b.feature("low_rel", Robust),
            vwap_dist: b.feature("vwap_dist", Robust),
            volume: b.feature("volume", ZScore),
            volatility: b.feature("volatility", ZScore),
            pos_in_range: b.feature("pos_in_range", Identity),
            sin_time: b.feature("sin_time", Identity),
            cos_time: b.feature("cos_time", Identity),
            or_finished: b.feature("or_finished", Identity),
        }
    }
}

/// Log return of `price` against `base`; zero when either is not positive.
fn log_rel(price: f64, base: f64) -> f32 {
    if price > 0.0 && base > 0.0 {
        (price.ln() - base.ln()) as f32
    } else {
        0.0
    }
}

pub struct OpeningRangeBreakout {
    params: OrbParams,
    atr: Arc<Atr>,
    vwap: Arc<Vwap>,
    first_time: Arc<PerSymbol<i64>>,
    or_high: Arc<PerSymbol<f64>>,
    or_low: Arc<PerSymbol<f64>>,
    or_volume: Arc<PerSymbol<f64>>,
    or_bars: Arc<PerSymbol<i64>>,
    traded: Arc<PerSymbol<bool>>,
    excursion: Arc<PerSymbol<f64>>,
    features: OrbFeatures,
    success: Arc<Label>,
    symbol: Arc<PerSymbol<i64>>,
}

impl OpeningRangeBreakout {
    pub fn new(b: &mut StrategyBuilder, params: OrbParams) -> StrataResult<Self> {
        params.validate()?;
        b.filter(RollingVolume::new(
            b.symbols(),
            params.volume_period,
            params.volume_threshold,
        ));
        let atr = b.indicator(Atr::new(b.symbols(), params.atr_period));
        let vwap = b.indicator(Vwap::new(b.symbols()));
        Ok(Self {
            atr,
            vwap,
            first_time: b.daily("orb.first_time", 0i64),
            or_high: b.daily("orb.or_high", 0.0f64),
            or_low: b.daily("orb.or_low", f64::INFINITY),
            or_volume: b.daily("orb.or_volume", 0.0f64),
            or_bars: b.daily("orb.or_bars", 0i64),
            traded: b.daily("orb.traded", false),
            excursion: b.daily("orb.excursion", 0.0f64),
            features: OrbFeatures::register(b),
            success: b.label(
                "success",
                false,
                NormalizerKind::Identity,
                HeadSpec::linear_sigmoid(1),
                LossSpec::Bce,
            ),
            symbol: b.embedding("symbol", 0),
            params,
        })
    }

    pub fn params(&self) -> &OrbParams {
        &self.params
    }

    /// Average opening-range volume per bar.
    pub fn or_average_volume(&self, sym: SymbolId) -> f64 {
        let bars = self.or_bars.get(sym);
        if bars == 0 {
            0.0
        } else {
            self.or_volume.get(sym) / bars as f64
        }
    }

    fn or_range(&self, sym: SymbolId) -> f64 {
        let (high, low) = (self.or_high.get(sym), self.or_low.get(sym));
        if low.is_finite() && high > low {
            high - low
        } else {
            0.0
        }
    }

    fn write_features(&self, ctx: &Context, bar: &Bar, sym: SymbolId, elapsed: i64) {
        let f = &self.features;
        let prev_close = ctx
            .prev_bar(sym)
            .map(|b| b.close)
            .filter(|c| *c > 0.0)
            .unwrap_or(bar.open);

        f.open_rel.set(sym, log_rel(bar.open, prev_close));
        f.close_rel.set(sym, log_rel(bar.close, prev_close));
        f.high_rel.set(sym, log_rel(bar.high, prev_close));
        f.low_rel.set(sym, log_rel(bar.low, prev_close));

        let vwap = self.vwap.value(sym);
        let vwap_ok = vwap.is_finite() && vwap > 0.0;
        let vwap_dist = if vwap_ok {
            (bar.typical_price() - vwap) / vwap
        } else {
            0.0
        };
        f.vwap_dist.set(sym, vwap_dist as f32);
        f.volume.set(sym, (bar.volume.max(0.0) + 1.0).ln() as f32);

        let atr = self.atr.value(sym);
        let volatility = if vwap_ok && atr.is_finite() && atr > 0.0 {
            (atr / vwap).ln()
        } else {
            0.0
        };
        f.volatility.set(sym, volatility as f32);

        let range = self.or_range(sym);
        let pos = if range > 0.0 {
            ((bar.close - self.or_low.get(sym)) / range).clamp(-5.0, 5.0)
        } else {
            0.0
        };
        f.pos_in_range.set(sym, pos as f32);

        let cycle_ms = (self.params.stop_trading_minutes - 5) * MINUTE_MS;
        let phase = TAU * elapsed as f64 / cycle_ms as f64;
        f.sin_time.set(sym, phase.sin() as f32);
        f.cos_time.set(sym, phase.cos() as f32);

        let finished = elapsed >= self.params.or_minutes * MINUTE_MS;
        f.or_finished.set(sym, if finished { 1.0 } else { 0.0 });
    }

    fn try_breakout(&self, ctx: &Context, bar: &Bar, sym: SymbolId) -> StrataResult<()> {
        let range = self.or_range(sym);
        let atr = self.atr.value(sym);
        if range <= 0.0 || !atr.is_finite() || atr <= 0.0 || !ctx.filters_pass(sym) {
            return Ok(());
        }
        let margin = self.params.breakout_fraction * range;
        let side = if bar.close >= self.or_high.get(sym) + margin {
            Side::Long
        } else if bar.close <= self.or_low.get(sym) - margin {
            Side::Short
        } else {
            return Ok(());
        };

        let stop = atr * self.params.atr_mult;
        let target = stop * self.params.reward_risk;
        ctx.enter(sym, side, bar, stop, target)?;
        self.traded.set(sym, true);
        self.excursion.set(sym, 0.0);
        debug!(%sym, ?side, price = bar.close, range, atr, "opening range breakout");
        Ok(())
    }

    fn track_excursion(&self, ctx: &Context, bar: &Bar, sym: SymbolId) {
        let pos = ctx.positions().get(sym);
        let move_ = match pos.side {
            Some(Side::Long) => bar.high - pos.entry_price,
            Some(Side::Short) => pos.entry_price - bar.low,
            None => return,
        };
        self.excursion.with_mut(sym, |e| *e = e.max(move_));
    }
}

impl Strategy for OpeningRangeBreakout {
    fn name(&self) -> &str {
        "opening_range_breakout"
    }

    fn new_day(&self, ctx: &Context, bar: &Bar, sym: SymbolId) -> StrataResult<()> {
        if ctx.positions().is_held(sym) {
            ctx.exit(sym, bar, true)?;
        }
        ctx.free(sym);
        self.first_time.set(sym, bar.timestamp);
        Ok(())
    }

    fn process_bar(&self, ctx: &Context, bar: &Bar, sym: SymbolId) -> StrataResult<StepAction> {
        let elapsed = bar.timestamp - self.first_time.get(sym);
        self.write_features(ctx, bar, sym, elapsed);

        if elapsed < self.params.or_minutes * MINUTE_MS {
            self.or_high.with_mut(sym, |h| *h = h.max(bar.high));
            self.or_low.with_mut(sym, |l| *l = l.min(bar.low));
            self.or_volume.with_mut(sym, |v| *v += bar.volume);
            self.or_bars.with_mut(sym, |n| *n += 1);
            return Ok(StepAction::Push);
        }

        let positions = ctx.positions();
        if positions.is_free(sym) && !self.traded.get(sym) {
            if elapsed >= self.params.stop_trading_minutes * MINUTE_MS {
                return Ok(StepAction::Skip);
            }
            self.try_breakout(ctx, bar, sym)?;
            return Ok(StepAction::Push);
        }

        if positions.is_held(sym) {
            self.track_excursion(ctx, bar, sym);
            let held_for = bar.timestamp - positions.get(sym).entry_time;
            if held_for >= self.params.exit_after_minutes * MINUTE_MS {
                ctx.exit(sym, bar, true)?;
                ctx.block(sym);
            }
            return Ok(StepAction::Push);
        }

        Ok(StepAction::Skip)
    }

    fn validate_sequence(&self, ctx: &Context, sym: SymbolId) -> SequenceVerdict {
        let len = ctx.sequences().len_of(sym);
        if (len as i64) < self.params.or_minutes {
            return SequenceVerdict::Pending;
        }
        if !self.traded.get(sym) || ctx.positions().is_held(sym) {
            return SequenceVerdict::Pending;
        }

        ctx.trim_sequence(sym, self.params.max_sequence, true);
        let range = self.or_range(sym);
        let excursion = self.excursion.get(sym);
        let success = range > 0.0 && excursion / range >= self.params.success_threshold;
        self.success.set(sym, success);
        self.symbol.set(sym, sym.index() as i64);
        self.excursion.set(sym, 0.0);
        SequenceVerdict::Ready
    }
}
