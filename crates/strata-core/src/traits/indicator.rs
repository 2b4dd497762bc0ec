//! Streaming indicator and filter capabilities.
//!
//! A component owns private per-symbol state and is updated one bar at a
//! time. The capabilities are split so a component implements only what it
//! offers: every indicator and filter steps and resets, indicators expose a
//! value and chart points, filters expose a boolean gate.

use std::sync::Arc;

use crate::per_symbol::SymbolSlots;
use crate::symbol::SymbolId;
use crate::types::Bar;

/// `(timestamp ms, value)` recorded for charting.
pub type ChartPoint = (i64, f64);

/// Streaming update from bars.
pub trait Steppable: Send + Sync {
    /// Update the symbol's state with one bar.
    ///
    /// When `charting` is set the component may record chart points.
    fn step(&self, bar: &Bar, sym: SymbolId, charting: bool);

    /// Replay historical bars in order without charting.
    fn warm_up(&self, bars: &[Bar], sym: SymbolId) {
        for bar in bars {
            self.step(bar, sym, false);
        }
    }
}

/// Restores per-symbol state to defaults.
pub trait Resettable: Send + Sync {
    fn reset_all(&self);

    fn reset_sym(&self, sym: SymbolId);
}

/// Streaming numeric computation.
pub trait Indicator: Steppable + Resettable {
    fn name(&self) -> &str;

    /// Current value for the symbol. `NaN` until enough bars were seen.
    fn value(&self, sym: SymbolId) -> f64;

    /// Chart points recorded for the symbol.
    fn chart(&self, _sym: SymbolId) -> Vec<ChartPoint> {
        Vec::new()
    }

    /// Drop recorded chart points.
    fn clear_chart(&self) {}
}

/// Streaming boolean gate.
pub trait Filter: Steppable + Resettable {
    fn name(&self) -> &str;

    /// Whether the symbol currently passes the filter.
    fn validate(&self, sym: SymbolId) -> bool;

    /// Value the gate is computed from.
    fn value(&self, sym: SymbolId) -> f64;

    fn set_threshold(&self, threshold: f64, sym: SymbolId);

    /// Named containers the filter keeps its settings in. The strategy
    /// registers them so they can be overridden, listed and snapshotted.
    fn containers(&self) -> Vec<Arc<dyn SymbolSlots>> {
        Vec::new()
    }
}
