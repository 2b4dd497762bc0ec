//! Strategy construction and container registries.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use strata_core::{
    Bar, Filter, Indicator, PerSymbol, PositionBook, SlotValue, StrataError, StrataResult,
    SymbolRegistry, SymbolSlots,
};
use strata_indicators::{FilterPipeline, IndicatorPipeline};
use strata_stats::NormalizerKind;

use crate::config::RuntimeConfig;
use crate::context::{Context, CoreSlots};
use crate::metrics::Metrics;
use crate::sequence::{HeadSpec, Label, LabelValue, LossSpec, SequenceBuilder, SequenceFeature};

/// Container lists, in registration order.
#[derive(Default, Clone)]
pub struct Registries {
    /// Every named container; keys snapshots and variable overrides.
    pub master: Vec<Arc<dyn SymbolSlots>>,
    /// Persist across trading days.
    pub integrated: Vec<Arc<dyn SymbolSlots>>,
    /// Reset at the start of each trading day.
    pub daily: Vec<Arc<dyn SymbolSlots>>,
    pub metrics: Vec<Arc<dyn SymbolSlots>>,
    pub features: Vec<Arc<dyn SymbolSlots>>,
    pub labels: Vec<Arc<dyn SymbolSlots>>,
    pub embeddings: Vec<Arc<dyn SymbolSlots>>,
}

impl Registries {
    pub fn get(&self, name: &str) -> Option<&Arc<dyn SymbolSlots>> {
        self.master.iter().find(|c| c.name() == name)
    }
}

/// Collects everything a strategy registers.
///
/// The runtime's own containers (positions, metrics, previous bar, current
/// date, warming flag, prediction, sequence status) are registered first so
/// every strategy shares the same leading snapshot layout.
pub struct StrategyBuilder {
    symbols: Arc<SymbolRegistry>,
    config: RuntimeConfig,
    registries: Registries,
    names: HashSet<String>,
    duplicates: Vec<String>,
    indicators: IndicatorPipeline,
    filters: FilterPipeline,
    sequences: SequenceBuilder,
    positions: PositionBook,
    metrics: Metrics,
    core: CoreSlots,
}

impl StrategyBuilder {
    pub fn new(symbols: Arc<SymbolRegistry>, config: RuntimeConfig) -> Self {
        let sequences = SequenceBuilder::new(Arc::clone(&symbols), config.max_steps);
        let positions = PositionBook::new(&symbols);
        let metrics = Metrics::new(&symbols);
        let core = CoreSlots {
            prev_bar: Arc::new(PerSymbol::named("prev_bar", &symbols, None::<Bar>)),
            current_date: Arc::new(PerSymbol::named("current_date", &symbols, None::<NaiveDate>)),
            warming: Arc::new(PerSymbol::named("warming", &symbols, false)),
            started: Arc::new(PerSymbol::named("started", &symbols, false)),
            prediction: Arc::new(PerSymbol::named("prediction", &symbols, None::<f64>)),
        };

        let mut b = Self {
            symbols,
            config,
            registries: Registries::default(),
            names: HashSet::new(),
            duplicates: Vec::new(),
            indicators: IndicatorPipeline::new(),
            filters: FilterPipeline::new(),
            sequences,
            positions,
            metrics,
            core,
        };

        b.register_integrated(b.positions.container());
        b.register_integrated(b.core.prev_bar.clone());
        b.register_integrated(b.core.current_date.clone());
        b.register_integrated(b.core.warming.clone());
        b.register_integrated(b.core.started.clone());
        b.register_integrated(b.core.prediction.clone());
        b.register_integrated(b.sequences.status_container());
        for m in b.metrics.containers() {
            b.register(m.clone());
            b.registries.metrics.push(m);
        }
        b
    }

    pub fn symbols(&self) -> &Arc<SymbolRegistry> {
        &self.symbols
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn register(&mut self, c: Arc<dyn SymbolSlots>) {
        if !self.names.insert(c.name().to_string()) {
            self.duplicates.push(c.name().to_string());
        }
        self.registries.master.push(c);
    }

    fn register_integrated(&mut self, c: Arc<dyn SymbolSlots>) {
        self.register(c.clone());
        self.registries.integrated.push(c);
    }

    /// Container that persists across trading days.
    pub fn integrated<T: SlotValue>(&mut self, name: &str, default: T) -> Arc<PerSymbol<T>> {
        let c = Arc::new(PerSymbol::named(name, &self.symbols, default));
        self.register_integrated(c.clone());
        c
    }

    /// Container reset to its default at the start of each trading day.
    pub fn daily<T: SlotValue>(&mut self, name: &str, default: T) -> Arc<PerSymbol<T>> {
        let c = Arc::new(PerSymbol::named(name, &self.symbols, default));
        self.register(c.clone());
        self.registries.daily.push(c.clone());
        c
    }

    /// Strategy-specific metric, reported alongside the built-in ones.
    pub fn metric<T: SlotValue>(&mut self, name: &str, default: T) -> Arc<PerSymbol<T>> {
        let c = Arc::new(PerSymbol::named(name, &self.symbols, default));
        self.register(c.clone());
        self.registries.metrics.push(c.clone());
        c
    }

    /// Append an indicator to the pipeline; stepped in registration order.
    pub fn indicator<I: Indicator + 'static>(&mut self, indicator: I) -> Arc<I> {
        let i = Arc::new(indicator);
        self.indicators.push(i.clone());
        i
    }

    /// Append a filter to the pipeline; stepped before every indicator.
    /// The filter's own containers join the registry.
    pub fn filter<F: Filter + 'static>(&mut self, filter: F) -> Arc<F> {
        let f = Arc::new(filter);
        for c in f.containers() {
            self.register(c);
        }
        self.filters.push(f.clone());
        f
    }

    pub fn feature(&mut self, name: &str, kind: NormalizerKind) -> Arc<SequenceFeature> {
        let f = self.sequences.add_feature(name, kind);
        let window: Arc<dyn SymbolSlots> = f.window_container();
        let scratch: Arc<dyn SymbolSlots> = f.scratch_container();
        self.register(window.clone());
        self.register(scratch);
        self.registries.features.push(window);
        f
    }

    pub fn label(
        &mut self,
        name: &str,
        default: impl Into<LabelValue>,
        kind: NormalizerKind,
        head: HeadSpec,
        loss: LossSpec,
    ) -> Arc<Label> {
        let label = Label::new(name, &self.symbols, default.into(), kind, head, loss);
        self.add_label(label)
    }

    /// Integer class label; never normalized.
    pub fn class_label(
        &mut self,
        name: &str,
        classes: usize,
        head: HeadSpec,
        loss: LossSpec,
    ) -> Arc<Label> {
        let label = Label::class(name, &self.symbols, classes, head, loss);
        self.add_label(label)
    }

    fn add_label(&mut self, label: Label) -> Arc<Label> {
        let l = self.sequences.add_label(label);
        let c: Arc<dyn SymbolSlots> = l.container();
        self.register(c.clone());
        self.registries.labels.push(c);
        l
    }

    /// Integer id handed to the model alongside the sample, e.g. the symbol.
    pub fn embedding(&mut self, name: &str, default: i64) -> Arc<PerSymbol<i64>> {
        let e = self.sequences.add_embedding(name, default);
        self.register(e.clone());
        self.registries.embeddings.push(e.clone());
        e
    }

    pub(crate) fn finish(self) -> StrataResult<(Context, Registries)> {
        if !self.duplicates.is_empty() {
            return Err(StrataError::Config(format!(
                "duplicate container names: {}",
                self.duplicates.join(", ")
            )));
        }
        let ctx = Context::new(
            self.symbols,
            self.config,
            self.positions,
            self.indicators,
            self.filters,
            self.sequences,
            self.metrics,
            self.core,
        );
        Ok((ctx, self.registries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> StrategyBuilder {
        let reg = Arc::new(SymbolRegistry::new(["A", "B"]).unwrap());
        StrategyBuilder::new(reg, RuntimeConfig::default())
    }

    #[test]
    fn test_registration_order() {
        let mut b = builder();
        let before = b.registries.master.len();
        b.integrated("a", 1.0f64);
        b.daily("b", 0i64);
        b.feature("f", NormalizerKind::Identity);
        let names: Vec<&str> = b.registries.master[before..]
            .iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(names, vec!["a", "b", "feature.f", "feature.f.step"]);
        assert_eq!(b.registries.master[0].name(), "positions");
        assert_eq!(b.registries.daily.len(), 1);
    }

    #[test]
    fn test_filter_containers_registered() {
        let mut b = builder();
        b.filter(strata_indicators::RollingVolume::new(b.symbols(), 3, 1_000.0));
        let c = b.registries.get("rolling_volume.threshold").unwrap();
        assert_eq!(c.describe_default(), "1000.0");
        assert_eq!(b.filters.len(), 1);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut b = builder();
        b.integrated("x", 0i64);
        b.daily("x", 0i64);
        let err = b.finish().err().unwrap();
        assert!(matches!(err, StrataError::Config(msg) if msg.contains('x')));
    }
}
