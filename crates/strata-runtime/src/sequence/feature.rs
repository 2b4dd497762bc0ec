//! Sequence features: one growing `f32` window per symbol.

use std::sync::Arc;

use strata_core::{PerSymbol, StrataResult, SymbolId, SymbolRegistry};
use strata_stats::{NormalizerKind, StatsSummary};

use super::{NormalizerPair, StatsPhase};
use crate::config::NormScope;

/// A named feature.
///
/// The strategy writes the current bar's value into the scratch slot with
/// [`set`](Self::set); the sequence builder appends it to the window on
/// push and resets the scratch slot to zero.
pub struct SequenceFeature {
    name: String,
    window: Arc<PerSymbol<Vec<f32>>>,
    scratch: Arc<PerSymbol<f32>>,
    norm: NormalizerPair,
}

impl SequenceFeature {
    pub(crate) fn new(name: &str, symbols: &SymbolRegistry, kind: NormalizerKind) -> Self {
        Self {
            name: name.to_string(),
            window: Arc::new(PerSymbol::named(
                format!("feature.{name}"),
                symbols,
                Vec::new(),
            )),
            scratch: Arc::new(PerSymbol::named(
                format!("feature.{name}.step"),
                symbols,
                0.0,
            )),
            norm: NormalizerPair::new(symbols, kind),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NormalizerKind {
        self.norm.kind()
    }

    /// Write the current step's value.
    pub fn set(&self, sym: SymbolId, value: f32) {
        self.scratch.set(sym, value);
    }

    /// Current scratch value.
    pub fn step_value(&self, sym: SymbolId) -> f32 {
        self.scratch.get(sym)
    }

    /// Window length for the symbol.
    pub fn len_of(&self, sym: SymbolId) -> usize {
        self.window.with(sym, Vec::len)
    }

    /// Copy of the symbol's raw window.
    pub fn values(&self, sym: SymbolId) -> Vec<f32> {
        self.window.get(sym)
    }

    pub(crate) fn window_container(&self) -> Arc<PerSymbol<Vec<f32>>> {
        Arc::clone(&self.window)
    }

    pub(crate) fn scratch_container(&self) -> Arc<PerSymbol<f32>> {
        Arc::clone(&self.scratch)
    }

    /// Append the scratch value, dropping the oldest steps beyond `max_steps`.
    pub(crate) fn push_step(&self, sym: SymbolId, max_steps: usize) {
        let value = std::mem::take(&mut *self.scratch.lock(sym));
        self.window.with_mut(sym, |w| {
            w.push(value);
            if w.len() > max_steps {
                let excess = w.len() - max_steps;
                w.drain(..excess);
            }
        });
    }

    /// Keep `length` steps, either the first ones or the last ones.
    pub(crate) fn trim(&self, sym: SymbolId, length: usize, from_begin: bool) {
        self.window.with_mut(sym, |w| {
            if w.len() <= length {
                return;
            }
            if from_begin {
                let excess = w.len() - length;
                w.drain(..excess);
            } else {
                w.truncate(length);
            }
        });
    }

    pub(crate) fn clear(&self, sym: SymbolId) {
        self.window.reset(sym);
        self.scratch.reset(sym);
    }

    pub(crate) fn accumulate(&self, sym: SymbolId, phase: StatsPhase) -> StrataResult<()> {
        let window = self.window.get(sym);
        self.norm.accumulate(sym, &window, phase)
    }

    /// Window scaled by the normalizer of the given scope.
    pub fn normalized(&self, sym: SymbolId, scope: NormScope) -> Vec<f32> {
        let mut window = self.window.get(sym);
        self.norm.with(sym, scope, |n| n.normalize(&mut window));
        window
    }

    pub(crate) fn norm(&self) -> &NormalizerPair {
        &self.norm
    }

    pub fn summary(&self, sym: SymbolId, scope: NormScope) -> StatsSummary {
        self.norm.with(sym, scope, |n| n.stats().summary())
    }
}

impl std::fmt::Debug for SequenceFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceFeature")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}
