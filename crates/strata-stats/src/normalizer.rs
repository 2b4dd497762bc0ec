//! Normalizers built from finalized statistics.

use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::stats::NormalizationStats;

/// Guards near-zero spreads.
pub const EPSILON: f64 = 1e-7;

/// Rescales MAD to a consistent estimator of the standard deviation under
/// normality.
pub const MAD_SCALE: f64 = 1.4826;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizerKind {
    #[default]
    Identity,
    /// `(x - mean) / (std_dev + eps)`
    ZScore,
    /// `(x - median) / ((mad + eps) * 1.4826)`
    Robust,
}

impl NormalizerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NormalizerKind::Identity => "identity",
            NormalizerKind::ZScore => "z_score",
            NormalizerKind::Robust => "robust",
        }
    }
}

/// A normalizer kind paired with the statistics it scales by.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    kind: NormalizerKind,
    stats: NormalizationStats,
}

impl Normalizer {
    pub fn new(kind: NormalizerKind) -> Self {
        Self {
            kind,
            stats: NormalizationStats::new(),
        }
    }

    pub fn with_stats(kind: NormalizerKind, stats: NormalizationStats) -> Self {
        Self { kind, stats }
    }

    pub fn kind(&self) -> NormalizerKind {
        self.kind
    }

    pub fn stats(&self) -> &NormalizationStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut NormalizationStats {
        &mut self.stats
    }

    /// `(shift, scale)` such that `normalized = (x - shift) / scale`.
    fn affine(&self) -> (f64, f64) {
        match self.kind {
            NormalizerKind::Identity => (0.0, 1.0),
            NormalizerKind::ZScore => (self.stats.mean(), self.stats.std_dev() + EPSILON),
            NormalizerKind::Robust => (
                self.stats.median(),
                (self.stats.mad() + EPSILON) * MAD_SCALE,
            ),
        }
    }

    fn affine_as<F: Float>(&self) -> (F, F) {
        let (shift, scale) = self.affine();
        (
            F::from(shift).unwrap_or_else(F::zero),
            F::from(scale).unwrap_or_else(F::one),
        )
    }

    pub fn normalize_value<F: Float>(&self, x: F) -> F {
        let (shift, scale) = self.affine_as::<F>();
        (x - shift) / scale
    }

    pub fn denormalize_value<F: Float>(&self, x: F) -> F {
        let (shift, scale) = self.affine_as::<F>();
        x * scale + shift
    }

    /// Normalize in place.
    pub fn normalize<F: Float>(&self, xs: &mut [F]) {
        if self.kind == NormalizerKind::Identity {
            return;
        }
        let (shift, scale) = self.affine_as::<F>();
        for x in xs.iter_mut() {
            *x = (*x - shift) / scale;
        }
    }

    /// Invert [`normalize`](Self::normalize) in place.
    pub fn denormalize<F: Float>(&self, xs: &mut [F]) {
        if self.kind == NormalizerKind::Identity {
            return;
        }
        let (shift, scale) = self.affine_as::<F>();
        for x in xs.iter_mut() {
            *x = *x * scale + shift;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fitted(kind: NormalizerKind, data: &[f64]) -> Normalizer {
        let mut n = Normalizer::new(kind);
        let s = n.stats_mut();
        s.update(data).unwrap();
        s.finalize_median().unwrap();
        s.step_mad(data).unwrap();
        s.finalize_mad().unwrap();
        n
    }

    #[test]
    fn test_identity_is_noop() {
        let n = Normalizer::new(NormalizerKind::Identity);
        let mut xs = [1.5f32, -2.0];
        n.normalize(&mut xs);
        assert_eq!(xs, [1.5, -2.0]);
    }

    #[test]
    fn test_zscore() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let n = fitted(NormalizerKind::ZScore, &data);
        let std = (32.0f64 / 7.0).sqrt();
        let z = n.normalize_value(9.0f64);
        assert!((z - 4.0 / (std + EPSILON)).abs() < 1e-9);
        assert!((n.denormalize_value(z) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_robust() {
        let data = [1.0, 2.0, 3.0, 4.0, 100.0];
        let n = fitted(NormalizerKind::Robust, &data);
        // median 3, deviations [2,1,0,1,97] -> MAD 1
        assert!((n.stats().median() - 3.0).abs() < 1e-12);
        assert!((n.stats().mad() - 1.0).abs() < 1e-12);

        let mut xs = [3.0f32, 4.0];
        n.normalize(&mut xs);
        assert!(xs[0].abs() < 1e-6);
        assert!((xs[1] as f64 - 1.0 / ((1.0 + EPSILON) * MAD_SCALE)).abs() < 1e-6);
        n.denormalize(&mut xs);
        assert!((xs[1] - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_spread_stays_finite() {
        let data = [5.0; 10];
        let n = fitted(NormalizerKind::ZScore, &data);
        let v = n.normalize_value(5.0f64);
        assert!(v.is_finite());
        assert!(v.abs() < 1e-9);
        let r = fitted(NormalizerKind::Robust, &data);
        assert!(r.normalize_value(6.0f64).is_finite());
    }
}
