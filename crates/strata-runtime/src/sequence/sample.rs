//! Finished samples and the consumers they are handed to.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use strata_core::SymbolId;
use strata_stats::{NormalizerKind, StatsSummary};

use super::label::{HeadSpec, LabelValue, LossSpec};

/// One label of a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSample {
    pub name: String,
    pub value: LabelValue,
    pub head: HeadSpec,
    pub loss: LossSpec,
    pub classes: Option<usize>,
    pub stats: StatsSummary,
}

/// A finished sequence.
///
/// `features` is step-major: step `i` occupies
/// `features[i * feature_names.len()..(i + 1) * feature_names.len()]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub symbol: SymbolId,
    pub symbol_name: String,
    /// Timestamp of the bar that completed the sample.
    pub timestamp: i64,
    pub steps: usize,
    pub normalized: bool,
    pub feature_names: Vec<String>,
    pub features: Vec<f32>,
    pub feature_stats: Vec<StatsSummary>,
    pub labels: Vec<LabelSample>,
    pub embeddings: Vec<(String, i64)>,
}

impl Sample {
    /// Values of one feature across all steps.
    pub fn feature(&self, name: &str) -> Option<Vec<f32>> {
        let idx = self.feature_names.iter().position(|n| n == name)?;
        let width = self.feature_names.len();
        Some(
            self.features
                .chunks(width)
                .map(|step| step[idx])
                .collect(),
        )
    }

    pub fn label(&self, name: &str) -> Option<&LabelSample> {
        self.labels.iter().find(|l| l.name == name)
    }
}

/// Receives finished samples. An inference consumer returns a prediction
/// for the symbol; a collecting consumer returns `None`.
pub trait SampleConsumer: Send + Sync {
    fn consume(&self, sample: &Sample) -> Option<f64>;
}

/// Collects every sample it is given.
#[derive(Debug, Default)]
pub struct SampleCollector {
    samples: Mutex<Vec<Sample>>,
}

impl SampleCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().clone()
    }

    pub fn take(&self) -> Vec<Sample> {
        std::mem::take(&mut *self.samples.lock())
    }

    pub fn clear(&self) {
        self.samples.lock().clear();
    }
}

impl SampleConsumer for SampleCollector {
    fn consume(&self, sample: &Sample) -> Option<f64> {
        self.samples.lock().push(sample.clone());
        None
    }
}

/// Fitted statistics for one feature or label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedStats {
    pub name: String,
    pub kind: NormalizerKind,
    pub global: StatsSummary,
    /// `(symbol name, stats)` in registry order.
    pub per_symbol: Vec<(String, StatsSummary)>,
}

/// Every fitted normalizer of a sequence builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub features: Vec<NamedStats>,
    pub labels: Vec<NamedStats>,
}
