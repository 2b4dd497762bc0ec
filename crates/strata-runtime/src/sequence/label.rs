//! Supervised labels and their training metadata.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use strata_core::{PerSymbol, SlotValue, StrataResult, SymbolId, SymbolRegistry};
use strata_stats::{NormalizerKind, StatsSummary};

use super::{NormalizerPair, StatsPhase};
use crate::config::NormScope;

/// Scalar label value. Serialized with its variant, e.g. `{"I64":3}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LabelValue {
    F32(f32),
    F64(f64),
    I64(i64),
    Bool(bool),
}

impl LabelValue {
    pub fn as_f64(self) -> f64 {
        match self {
            LabelValue::F32(v) => v as f64,
            LabelValue::F64(v) => v,
            LabelValue::I64(v) => v as f64,
            LabelValue::Bool(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Carry a rescaled value. `F32` keeps its width; integer and boolean
    /// labels widen to `F64`.
    fn scaled(self, v: f64) -> Self {
        match self {
            LabelValue::F32(_) => LabelValue::F32(v as f32),
            LabelValue::F64(_) | LabelValue::I64(_) | LabelValue::Bool(_) => LabelValue::F64(v),
        }
    }
}

impl Default for LabelValue {
    fn default() -> Self {
        LabelValue::F32(0.0)
    }
}

impl From<f32> for LabelValue {
    fn from(v: f32) -> Self {
        LabelValue::F32(v)
    }
}

impl From<f64> for LabelValue {
    fn from(v: f64) -> Self {
        LabelValue::F64(v)
    }
}

impl From<i64> for LabelValue {
    fn from(v: i64) -> Self {
        LabelValue::I64(v)
    }
}

impl From<bool> for LabelValue {
    fn from(v: bool) -> Self {
        LabelValue::Bool(v)
    }
}

impl SlotValue for LabelValue {
    fn slot_type() -> String {
        "label".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadKind {
    Linear,
    LinearSigmoid,
}

/// Output head a model should attach for the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadSpec {
    pub kind: HeadKind,
    pub outputs: usize,
}

impl HeadSpec {
    pub fn linear(outputs: usize) -> Self {
        Self {
            kind: HeadKind::Linear,
            outputs,
        }
    }

    pub fn linear_sigmoid(outputs: usize) -> Self {
        Self {
            kind: HeadKind::LinearSigmoid,
            outputs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossSpec {
    Mse,
    SmoothL1,
    L1,
    Bce,
    CrossEntropy,
    Huber,
}

/// A named label with its head and loss.
///
/// Class labels carry the number of classes and are never normalized.
pub struct Label {
    name: String,
    values: Arc<PerSymbol<LabelValue>>,
    head: HeadSpec,
    loss: LossSpec,
    classes: Option<usize>,
    norm: NormalizerPair,
}

impl Label {
    pub(crate) fn new(
        name: &str,
        symbols: &SymbolRegistry,
        default: LabelValue,
        kind: NormalizerKind,
        head: HeadSpec,
        loss: LossSpec,
    ) -> Self {
        Self {
            name: name.to_string(),
            values: Arc::new(PerSymbol::named(format!("label.{name}"), symbols, default)),
            head,
            loss,
            classes: None,
            norm: NormalizerPair::new(symbols, kind),
        }
    }

    pub(crate) fn class(
        name: &str,
        symbols: &SymbolRegistry,
        classes: usize,
        head: HeadSpec,
        loss: LossSpec,
    ) -> Self {
        Self {
            classes: Some(classes),
            ..Self::new(
                name,
                symbols,
                LabelValue::I64(0),
                NormalizerKind::Identity,
                head,
                loss,
            )
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn head(&self) -> HeadSpec {
        self.head
    }

    pub fn loss(&self) -> LossSpec {
        self.loss
    }

    pub fn classes(&self) -> Option<usize> {
        self.classes
    }

    pub fn kind(&self) -> NormalizerKind {
        self.norm.kind()
    }

    pub fn set(&self, sym: SymbolId, value: impl Into<LabelValue>) {
        self.values.set(sym, value.into());
    }

    pub fn get(&self, sym: SymbolId) -> LabelValue {
        self.values.get(sym)
    }

    pub(crate) fn container(&self) -> Arc<PerSymbol<LabelValue>> {
        Arc::clone(&self.values)
    }

    pub(crate) fn reset(&self, sym: SymbolId) {
        self.values.reset(sym);
    }

    pub(crate) fn accumulate(&self, sym: SymbolId, phase: StatsPhase) -> StrataResult<()> {
        let v = self.get(sym).as_f64();
        self.norm.accumulate(sym, &[v], phase)
    }

    /// Label value scaled by the normalizer of the given scope. Identity
    /// labels are returned as stored.
    pub fn normalized(&self, sym: SymbolId, scope: NormScope) -> LabelValue {
        let raw = self.get(sym);
        if self.kind() == NormalizerKind::Identity {
            return raw;
        }
        let scaled = self.norm.with(sym, scope, |n| n.normalize_value(raw.as_f64()));
        raw.scaled(scaled)
    }

    pub(crate) fn norm(&self) -> &NormalizerPair {
        &self.norm
    }

    pub fn summary(&self, sym: SymbolId, scope: NormScope) -> StatsSummary {
        self.norm.with(sym, scope, |n| n.stats().summary())
    }
}

impl std::fmt::Debug for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Label")
            .field("name", &self.name)
            .field("head", &self.head)
            .field("loss", &self.loss)
            .field("classes", &self.classes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_value_payload_roundtrip() {
        let reg = SymbolRegistry::new(["A", "B", "C", "D"]).unwrap();
        let c = PerSymbol::named("label.x", &reg, LabelValue::F32(0.0));
        let values = [
            LabelValue::F32(1.5),
            LabelValue::F64(-2.25),
            LabelValue::I64(7),
            LabelValue::Bool(true),
        ];
        for (i, v) in values.iter().enumerate() {
            c.set(SymbolId::from(i), *v);
        }
        let bytes = strata_core::SymbolSlots::encode_payload(&c).unwrap();
        let d = PerSymbol::named("label.x", &reg, LabelValue::Bool(false));
        strata_core::SymbolSlots::decode_payload(&d, &bytes).unwrap();
        assert_eq!(d.values(), values.to_vec());
        assert_eq!(d.default_value(), LabelValue::F32(0.0));
    }

    #[test]
    fn test_label_value_json_keeps_variant() {
        for v in [
            LabelValue::F32(0.5),
            LabelValue::F64(0.1),
            LabelValue::I64(3),
            LabelValue::Bool(true),
        ] {
            let json = serde_json::to_string(&v).unwrap();
            let back: LabelValue = serde_json::from_str(&json).unwrap();
            assert_eq!(back, v);
        }
        assert_eq!(serde_json::to_string(&LabelValue::I64(3)).unwrap(), r#"{"I64":3}"#);
    }

    #[test]
    fn test_normalized_integer_label_widens() {
        let reg = SymbolRegistry::new(["A"]).unwrap();
        let sym = SymbolId(0);
        let l = Label::new(
            "count",
            &reg,
            LabelValue::I64(0),
            NormalizerKind::ZScore,
            HeadSpec::linear(1),
            LossSpec::Mse,
        );
        for v in [10i64, 20, 30, 40] {
            l.set(sym, v);
            l.accumulate(sym, StatsPhase::Moments).unwrap();
        }
        l.set(sym, 35i64);
        // mean 25, sample std sqrt(500 / 3)
        let std = (500.0f64 / 3.0).sqrt();
        match l.normalized(sym, NormScope::Global) {
            LabelValue::F64(z) => assert!((z - 10.0 / std).abs() < 1e-6),
            other => panic!("expected F64, got {other:?}"),
        }
        assert_eq!(l.get(sym), LabelValue::I64(35));
    }

    #[test]
    fn test_normalized_bool_label_widens() {
        let reg = SymbolRegistry::new(["A"]).unwrap();
        let sym = SymbolId(0);
        let l = Label::new(
            "hit",
            &reg,
            LabelValue::Bool(false),
            NormalizerKind::ZScore,
            HeadSpec::linear_sigmoid(1),
            LossSpec::Bce,
        );
        for v in [true, false, true, false] {
            l.set(sym, v);
            l.accumulate(sym, StatsPhase::Moments).unwrap();
        }
        l.set(sym, true);
        match l.normalized(sym, NormScope::PerSymbol) {
            LabelValue::F64(z) => assert!(z > 0.0 && z < 1.0),
            other => panic!("expected F64, got {other:?}"),
        }
    }

    #[test]
    fn test_class_label_is_identity() {
        let reg = SymbolRegistry::new(["A"]).unwrap();
        let l = Label::class("side", &reg, 3, HeadSpec::linear(3), LossSpec::CrossEntropy);
        assert_eq!(l.classes(), Some(3));
        assert_eq!(l.kind(), NormalizerKind::Identity);
        l.set(SymbolId(0), 2i64);
        assert_eq!(l.normalized(SymbolId(0), NormScope::Global), LabelValue::I64(2));
    }

    #[test]
    fn test_scaled_variants() {
        assert_eq!(LabelValue::Bool(true).scaled(0.25), LabelValue::F64(0.25));
        assert_eq!(LabelValue::I64(4).scaled(-1.5), LabelValue::F64(-1.5));
        assert_eq!(LabelValue::F32(0.0).scaled(0.5), LabelValue::F32(0.5));
        assert!((LabelValue::Bool(true).as_f64() - 1.0).abs() < 1e-12);
    }
}
