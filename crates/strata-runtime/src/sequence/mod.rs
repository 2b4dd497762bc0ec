//! Per-symbol sequence assembly.
//!
//! A strategy writes one value per feature for the current bar and asks for
//! a push; the builder appends those values to every feature window. Once
//! the strategy accepts a window the sequence is `Ready`, and the runtime
//! hands it off as a [`Sample`] to the statistics or to a model consumer.

mod feature;
mod label;
mod sample;

pub use feature::SequenceFeature;
pub use label::{HeadKind, HeadSpec, Label, LabelValue, LossSpec};
pub use sample::{LabelSample, NamedStats, Sample, SampleCollector, SampleConsumer, StatsReport};

use num_traits::Float;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use strata_core::{DataStatus, PerSymbol, StrataResult, SymbolId, SymbolRegistry};
use strata_stats::{NormalizationStats, Normalizer, NormalizerKind};

use crate::config::NormScope;

/// Strategy decision on the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceVerdict {
    /// Keep assembling.
    Pending,
    /// The window is a complete sample.
    Ready,
    /// Discard the window.
    Abort,
}

/// Which statistics pass raw windows feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsPhase {
    /// Moments and the median sketch.
    #[default]
    Moments,
    /// Absolute deviations from the fixed median.
    Mad,
}

/// A global normalizer plus one per symbol, sharing a kind.
pub(crate) struct NormalizerPair {
    kind: NormalizerKind,
    global: Mutex<Normalizer>,
    per_symbol: PerSymbol<Normalizer>,
}

impl NormalizerPair {
    fn new(symbols: &SymbolRegistry, kind: NormalizerKind) -> Self {
        Self {
            kind,
            global: Mutex::new(Normalizer::new(kind)),
            per_symbol: PerSymbol::new(symbols, Normalizer::new(kind)),
        }
    }

    fn kind(&self) -> NormalizerKind {
        self.kind
    }

    fn accumulate<F: Float>(&self, sym: SymbolId, values: &[F], phase: StatsPhase) -> StrataResult<()> {
        match phase {
            StatsPhase::Moments => {
                self.global.lock().stats_mut().update(values)?;
                self.per_symbol
                    .with_mut(sym, |n| n.stats_mut().update(values))?;
            }
            StatsPhase::Mad => {
                self.global.lock().stats_mut().step_mad(values)?;
                self.per_symbol
                    .with_mut(sym, |n| n.stats_mut().step_mad(values))?;
            }
        }
        Ok(())
    }

    fn with<R>(&self, sym: SymbolId, scope: NormScope, f: impl FnOnce(&Normalizer) -> R) -> R {
        match scope {
            NormScope::Global => f(&self.global.lock()),
            NormScope::PerSymbol => self.per_symbol.with(sym, f),
        }
    }

    fn finalize_median(&self) -> StrataResult<()> {
        self.global.lock().stats_mut().finalize_median()?;
        for i in 0..self.per_symbol.len() {
            self.per_symbol
                .with_mut(SymbolId::from(i), |n| n.stats_mut().finalize_median())?;
        }
        Ok(())
    }

    fn finalize_mad(&self) -> StrataResult<()> {
        self.global.lock().stats_mut().finalize_mad()?;
        for i in 0..self.per_symbol.len() {
            self.per_symbol
                .with_mut(SymbolId::from(i), |n| n.stats_mut().finalize_mad())?;
        }
        Ok(())
    }

    fn clear(&self) {
        *self.global.lock() = Normalizer::new(self.kind);
        self.per_symbol.reset_all();
    }

    fn report(&self, name: &str, symbols: &SymbolRegistry) -> NamedStats {
        NamedStats {
            name: name.to_string(),
            kind: self.kind,
            global: self.global.lock().stats().summary(),
            per_symbol: symbols
                .iter()
                .map(|(sym, sym_name)| {
                    (
                        sym_name.to_string(),
                        self.per_symbol.with(sym, |n| n.stats().summary()),
                    )
                })
                .collect(),
        }
    }

    fn apply(&self, stats: &NamedStats, symbols: &SymbolRegistry) {
        *self.global.lock() =
            Normalizer::with_stats(self.kind, NormalizationStats::from_summary(&stats.global));
        for (sym_name, summary) in &stats.per_symbol {
            match symbols.id(sym_name) {
                Some(sym) => self.per_symbol.set(
                    sym,
                    Normalizer::with_stats(self.kind, NormalizationStats::from_summary(summary)),
                ),
                None => warn!(name = %stats.name, symbol = %sym_name, "stats for unregistered symbol skipped"),
            }
        }
    }
}

/// Feature windows, labels and embeddings for every symbol, plus the
/// assembly status.
pub struct SequenceBuilder {
    symbols: Arc<SymbolRegistry>,
    max_steps: usize,
    features: Vec<Arc<SequenceFeature>>,
    labels: Vec<Arc<Label>>,
    embeddings: Vec<Arc<PerSymbol<i64>>>,
    status: Arc<PerSymbol<DataStatus>>,
}

impl SequenceBuilder {
    pub fn new(symbols: Arc<SymbolRegistry>, max_steps: usize) -> Self {
        let status = Arc::new(PerSymbol::named(
            "sequence.status",
            &symbols,
            DataStatus::Empty,
        ));
        Self {
            symbols,
            max_steps: max_steps.max(1),
            features: Vec::new(),
            labels: Vec::new(),
            embeddings: Vec::new(),
            status,
        }
    }

    pub(crate) fn add_feature(&mut self, name: &str, kind: NormalizerKind) -> Arc<SequenceFeature> {
        let f = Arc::new(SequenceFeature::new(name, &self.symbols, kind));
        self.features.push(Arc::clone(&f));
        f
    }

    pub(crate) fn add_label(&mut self, label: Label) -> Arc<Label> {
        let l = Arc::new(label);
        self.labels.push(Arc::clone(&l));
        l
    }

    pub(crate) fn add_embedding(&mut self, name: &str, default: i64) -> Arc<PerSymbol<i64>> {
        let e = Arc::new(PerSymbol::named(
            format!("embedding.{name}"),
            &self.symbols,
            default,
        ));
        self.embeddings.push(Arc::clone(&e));
        e
    }

    pub(crate) fn status_container(&self) -> Arc<PerSymbol<DataStatus>> {
        Arc::clone(&self.status)
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn features(&self) -> &[Arc<SequenceFeature>] {
        &self.features
    }

    pub fn labels(&self) -> &[Arc<Label>] {
        &self.labels
    }

    pub fn feature(&self, name: &str) -> Option<&Arc<SequenceFeature>> {
        self.features.iter().find(|f| f.name() == name)
    }

    pub fn label(&self, name: &str) -> Option<&Arc<Label>> {
        self.labels.iter().find(|l| l.name() == name)
    }

    pub fn status(&self, sym: SymbolId) -> DataStatus {
        self.status.get(sym)
    }

    /// Number of steps in the symbol's current window.
    pub fn len_of(&self, sym: SymbolId) -> usize {
        self.features.first().map_or(0, |f| f.len_of(sym))
    }

    /// Append the current scratch values of every feature.
    ///
    /// Returns `false` when the sequence is `Ready`, `Finished` or `Aborted`;
    /// those only accept steps again after [`clear_sequence`](Self::clear_sequence).
    /// The scratch values are reset either way.
    pub fn push_step(&self, sym: SymbolId) -> bool {
        let mut status = self.status.lock(sym);
        match *status {
            DataStatus::Empty | DataStatus::Wip => {
                for f in &self.features {
                    f.push_step(sym, self.max_steps);
                }
                *status = DataStatus::Wip;
                true
            }
            DataStatus::Ready | DataStatus::Aborted | DataStatus::Finished => {
                for f in &self.features {
                    f.set(sym, 0.0);
                }
                false
            }
        }
    }

    /// Apply the strategy's verdict and return the new status.
    pub fn evaluate(&self, sym: SymbolId, verdict: SequenceVerdict) -> DataStatus {
        self.status.with_mut(sym, |status| {
            *status = match (*status, verdict) {
                (DataStatus::Wip, SequenceVerdict::Ready) => DataStatus::Ready,
                (DataStatus::Wip | DataStatus::Ready, SequenceVerdict::Abort) => {
                    debug!(%sym, "sequence aborted");
                    DataStatus::Aborted
                }
                (current, _) => current,
            };
            *status
        })
    }

    /// Keep `length` steps of every feature window. `from_begin` drops the
    /// oldest steps, otherwise the newest are dropped.
    pub fn trim_sequence(&self, sym: SymbolId, length: usize, from_begin: bool) {
        for f in &self.features {
            f.trim(sym, length, from_begin);
        }
    }

    /// Empty every feature window, reset labels and return to `Empty`.
    pub fn clear_sequence(&self, sym: SymbolId) {
        for f in &self.features {
            f.clear(sym);
        }
        for l in &self.labels {
            l.reset(sym);
        }
        self.status.set(sym, DataStatus::Empty);
    }

    /// Hand off a `Ready` sequence. Moves the status to `Finished`.
    pub fn take_sample(
        &self,
        sym: SymbolId,
        timestamp: i64,
        scope: NormScope,
        normalize: bool,
    ) -> Option<Sample> {
        {
            let mut status = self.status.lock(sym);
            if *status != DataStatus::Ready {
                return None;
            }
            *status = DataStatus::Finished;
        }

        let windows: Vec<Vec<f32>> = self
            .features
            .iter()
            .map(|f| {
                if normalize {
                    f.normalized(sym, scope)
                } else {
                    f.values(sym)
                }
            })
            .collect();
        let steps = windows.iter().map(Vec::len).min().unwrap_or(0);
        let mut features = Vec::with_capacity(steps * windows.len());
        for i in 0..steps {
            features.extend(windows.iter().map(|w| w[i]));
        }

        let labels = self
            .labels
            .iter()
            .map(|l| LabelSample {
                name: l.name().to_string(),
                value: if normalize {
                    l.normalized(sym, scope)
                } else {
                    l.get(sym)
                },
                head: l.head(),
                loss: l.loss(),
                classes: l.classes(),
                stats: l.summary(sym, scope),
            })
            .collect();

        Some(Sample {
            symbol: sym,
            symbol_name: self.symbols.name(sym).to_string(),
            timestamp,
            steps,
            normalized: normalize,
            feature_names: self.features.iter().map(|f| f.name().to_string()).collect(),
            features,
            feature_stats: self.features.iter().map(|f| f.summary(sym, scope)).collect(),
            labels,
            embeddings: self
                .embeddings
                .iter()
                .map(|e| {
                    let name = e.name().trim_start_matches("embedding.").to_string();
                    (name, e.get(sym))
                })
                .collect(),
        })
    }

    /// Feed the symbol's raw windows and labels to the normalizers.
    pub fn accumulate(&self, sym: SymbolId, phase: StatsPhase) -> StrataResult<()> {
        for f in &self.features {
            f.accumulate(sym, phase)?;
        }
        for l in &self.labels {
            l.accumulate(sym, phase)?;
        }
        Ok(())
    }

    pub fn finalize_median(&self) -> StrataResult<()> {
        for f in &self.features {
            f.norm().finalize_median()?;
        }
        for l in &self.labels {
            l.norm().finalize_median()?;
        }
        debug!(features = self.features.len(), labels = self.labels.len(), "medians finalized");
        Ok(())
    }

    pub fn finalize_mad(&self) -> StrataResult<()> {
        for f in &self.features {
            f.norm().finalize_mad()?;
        }
        for l in &self.labels {
            l.norm().finalize_mad()?;
        }
        debug!(features = self.features.len(), labels = self.labels.len(), "MADs finalized");
        Ok(())
    }

    /// Drop every accumulated statistic.
    pub fn clear_stats(&self) {
        for f in &self.features {
            f.norm().clear();
        }
        for l in &self.labels {
            l.norm().clear();
        }
    }

    pub fn stats_report(&self) -> StatsReport {
        StatsReport {
            features: self
                .features
                .iter()
                .map(|f| f.norm().report(f.name(), &self.symbols))
                .collect(),
            labels: self
                .labels
                .iter()
                .map(|l| l.norm().report(l.name(), &self.symbols))
                .collect(),
        }
    }

    /// Install previously fitted statistics. Entries for names that are not
    /// registered are skipped with a warning.
    pub fn apply_stats(&self, report: &StatsReport) {
        for stats in &report.features {
            match self.feature(&stats.name) {
                Some(f) => f.norm().apply(stats, &self.symbols),
                None => warn!(feature = %stats.name, "stats for unknown feature skipped"),
            }
        }
        for stats in &report.labels {
            match self.label(&stats.name) {
                Some(l) => l.norm().apply(stats, &self.symbols),
                None => warn!(label = %stats.name, "stats for unknown label skipped"),
            }
        }
    }
}

impl std::fmt::Debug for SequenceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceBuilder")
            .field("max_steps", &self.max_steps)
            .field("features", &self.features)
            .field("labels", &self.labels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(max_steps: usize) -> (SequenceBuilder, Arc<SequenceFeature>, Arc<SequenceFeature>) {
        let reg = Arc::new(SymbolRegistry::new(["A", "B"]).unwrap());
        let mut b = SequenceBuilder::new(reg, max_steps);
        let x = b.add_feature("x", NormalizerKind::ZScore);
        let y = b.add_feature("y", NormalizerKind::Identity);
        (b, x, y)
    }

    fn push(b: &SequenceBuilder, x: &SequenceFeature, y: &SequenceFeature, sym: SymbolId, v: f32) {
        x.set(sym, v);
        y.set(sym, -v);
        b.push_step(sym);
    }

    #[test]
    fn test_push_moves_empty_to_wip() {
        let (b, x, y) = builder(10);
        let a = SymbolId(0);
        assert_eq!(b.status(a), DataStatus::Empty);
        push(&b, &x, &y, a, 1.0);
        assert_eq!(b.status(a), DataStatus::Wip);
        assert_eq!(x.values(a), vec![1.0]);
        assert_eq!(x.step_value(a), 0.0);
        assert_eq!(b.status(SymbolId(1)), DataStatus::Empty);
    }

    #[test]
    fn test_rolling_cap_drops_oldest() {
        let (b, x, y) = builder(3);
        let a = SymbolId(0);
        for v in 1..=5 {
            push(&b, &x, &y, a, v as f32);
        }
        assert_eq!(x.values(a), vec![3.0, 4.0, 5.0]);
        assert_eq!(b.len_of(a), 3);
    }

    #[test]
    fn test_trim_from_begin() {
        let (b, x, y) = builder(10);
        let a = SymbolId(0);
        for v in 1..=5 {
            push(&b, &x, &y, a, v as f32);
        }
        b.trim_sequence(a, 2, true);
        assert_eq!(x.values(a), vec![4.0, 5.0]);
        b.trim_sequence(a, 1, false);
        assert_eq!(x.values(a), vec![4.0]);
        b.trim_sequence(a, 9, true);
        assert_eq!(x.values(a), vec![4.0]);
    }

    #[test]
    fn test_verdicts() {
        let (b, x, y) = builder(10);
        let a = SymbolId(0);
        assert_eq!(b.evaluate(a, SequenceVerdict::Ready), DataStatus::Empty);
        push(&b, &x, &y, a, 1.0);
        assert_eq!(b.evaluate(a, SequenceVerdict::Pending), DataStatus::Wip);
        assert_eq!(b.evaluate(a, SequenceVerdict::Ready), DataStatus::Ready);
        assert!(!b.push_step(a));
        assert_eq!(b.len_of(a), 1);
        assert_eq!(b.evaluate(a, SequenceVerdict::Abort), DataStatus::Aborted);
        b.clear_sequence(a);
        assert_eq!(b.status(a), DataStatus::Empty);
        assert_eq!(b.len_of(a), 0);
    }

    #[test]
    fn test_take_sample_is_step_major() {
        let (b, x, y) = builder(10);
        let a = SymbolId(1);
        push(&b, &x, &y, a, 1.0);
        push(&b, &x, &y, a, 2.0);
        assert!(b.take_sample(a, 0, NormScope::Global, false).is_none());
        b.evaluate(a, SequenceVerdict::Ready);

        let s = b.take_sample(a, 42, NormScope::Global, false).unwrap();
        assert_eq!(s.symbol_name, "B");
        assert_eq!(s.steps, 2);
        assert_eq!(s.features, vec![1.0, -1.0, 2.0, -2.0]);
        assert_eq!(b.status(a), DataStatus::Finished);
        assert!(b.take_sample(a, 42, NormScope::Global, false).is_none());
    }

    #[test]
    fn test_two_pass_stats_and_normalized_sample() {
        let (b, x, y) = builder(10);
        let a = SymbolId(0);
        for v in [1.0, 2.0, 3.0] {
            push(&b, &x, &y, a, v);
        }
        b.accumulate(a, StatsPhase::Moments).unwrap();
        b.finalize_median().unwrap();
        assert!(b.accumulate(a, StatsPhase::Moments).is_err());
        b.accumulate(a, StatsPhase::Mad).unwrap();
        b.finalize_mad().unwrap();

        let report = b.stats_report();
        assert_eq!(report.features[0].global.count, 3);
        assert!((report.features[0].global.mean - 2.0).abs() < 1e-9);
        assert_eq!(report.features[0].per_symbol[1].1.count, 0);

        b.evaluate(a, SequenceVerdict::Ready);
        let s = b.take_sample(a, 0, NormScope::Global, true).unwrap();
        let xs = s.feature("x").unwrap();
        // mean 2, std 1
        assert!((xs[0] + 1.0).abs() < 1e-5);
        assert!(xs[1].abs() < 1e-5);
        assert_eq!(s.feature("y").unwrap(), vec![-1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_apply_stats() {
        let (b, x, y) = builder(10);
        let a = SymbolId(0);
        for v in [10.0, 20.0, 30.0] {
            push(&b, &x, &y, a, v);
        }
        b.accumulate(a, StatsPhase::Moments).unwrap();
        b.finalize_median().unwrap();
        b.accumulate(a, StatsPhase::Mad).unwrap();
        b.finalize_mad().unwrap();
        let report = b.stats_report();

        let (fresh, fx, _) = builder(10);
        fresh.apply_stats(&report);
        let got = fx.summary(a, NormScope::PerSymbol);
        assert!((got.mean - 20.0).abs() < 1e-9);
        assert!((got.median - 20.0).abs() < 1e-9);
    }
}
