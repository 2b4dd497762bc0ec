//! Two-phase normalization statistics.
//!
//! Phase one merges batch moments into running totals and feeds every value
//! to a median sketch. `finalize_median` fixes the median and closes phase
//! one. Phase two feeds absolute deviations from that median to a second
//! sketch; `finalize_mad` fixes the MAD.

use num_traits::Float;
use serde::{Deserialize, Serialize};
use strata_core::ProtocolViolation;
use tracing::debug;

use crate::moments::{batch_moments, BatchMoments};
use crate::sketch::QuantileSketch;

/// Finalized statistics handed to the model consumer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsSummary {
    pub count: u64,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub l1_norm: f64,
    pub l2_norm: f64,
    pub median: f64,
    pub mad: f64,
}

#[derive(Debug, Clone)]
pub struct NormalizationStats {
    n: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    l1: f64,
    sum_sq: f64,
    median_sketch: QuantileSketch,
    deviation_sketch: QuantileSketch,
    median: f64,
    mad: f64,
    median_fixed: bool,
    mad_fixed: bool,
}

impl Default for NormalizationStats {
    fn default() -> Self {
        Self::with_sketch_k(crate::sketch::DEFAULT_K)
    }
}

fn finite_f64<F: Float>(batch: &[F]) -> Vec<f64> {
    batch
        .iter()
        .filter_map(|v| v.to_f64())
        .filter(|v| v.is_finite())
        .collect()
}

impl NormalizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sketch_k(k: usize) -> Self {
        Self {
            n: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            l1: 0.0,
            sum_sq: 0.0,
            median_sketch: QuantileSketch::new(k),
            deviation_sketch: QuantileSketch::new(k),
            median: 0.0,
            mad: 0.0,
            median_fixed: false,
            mad_fixed: false,
        }
    }

    /// Rebuild finalized statistics from a stored summary.
    pub fn from_summary(s: &StatsSummary) -> Self {
        let m2 = if s.count > 1 {
            s.variance * (s.count - 1) as f64
        } else {
            0.0
        };
        Self {
            n: s.count,
            mean: s.mean,
            m2,
            min: s.min,
            max: s.max,
            l1: s.l1_norm,
            sum_sq: s.l2_norm * s.l2_norm,
            median: s.median,
            mad: s.mad,
            median_fixed: true,
            mad_fixed: true,
            ..Self::default()
        }
    }

    /// Moment phase: merge one batch.
    ///
    /// Non-finite values are dropped and an empty batch is a no-op. Fails
    /// once the median has been finalized.
    pub fn update<F: Float>(&mut self, batch: &[F]) -> Result<(), ProtocolViolation> {
        if self.median_fixed {
            return Err(ProtocolViolation::MomentsAfterMedian);
        }
        let values = finite_f64(batch);
        let Some(b) = batch_moments(&values) else {
            return Ok(());
        };
        self.merge(&b);
        self.median_sketch.extend(&values);
        Ok(())
    }

    /// Parallel (Chan) merge of batch moments into the running totals.
    fn merge(&mut self, b: &BatchMoments) {
        if self.n == 0 {
            self.mean = b.mean;
            self.m2 = b.m2;
        } else {
            let n = self.n as f64;
            let bn = b.n as f64;
            let total = n + bn;
            let delta = b.mean - self.mean;
            self.mean += delta * (bn / total);
            self.m2 += b.m2 + delta * delta * (n * bn / total);
        }
        self.n += b.n;
        self.min = self.min.min(b.min);
        self.max = self.max.max(b.max);
        self.l1 += b.l1;
        self.sum_sq += b.sum_sq;
    }

    /// Fix the median from the sketch. An empty sketch fixes 0.0.
    pub fn finalize_median(&mut self) -> Result<f64, ProtocolViolation> {
        if self.median_fixed {
            return Err(ProtocolViolation::MedianAlreadyFinalized);
        }
        self.median = self.median_sketch.median().unwrap_or(0.0);
        self.median_fixed = true;
        debug!(median = self.median, n = self.n, "median finalized");
        Ok(self.median)
    }

    /// MAD phase: feed absolute deviations from the fixed median.
    pub fn step_mad<F: Float>(&mut self, batch: &[F]) -> Result<(), ProtocolViolation> {
        if !self.median_fixed {
            return Err(ProtocolViolation::MadBeforeMedian);
        }
        if self.mad_fixed {
            return Err(ProtocolViolation::MadAlreadyFinalized);
        }
        for v in finite_f64(batch) {
            self.deviation_sketch.update((v - self.median).abs());
        }
        Ok(())
    }

    /// Fix the MAD from the deviation sketch. An empty sketch fixes 0.0.
    pub fn finalize_mad(&mut self) -> Result<f64, ProtocolViolation> {
        if !self.median_fixed {
            return Err(ProtocolViolation::MadBeforeMedian);
        }
        if self.mad_fixed {
            return Err(ProtocolViolation::MadAlreadyFinalized);
        }
        self.mad = self.deviation_sketch.median().unwrap_or(0.0);
        self.mad_fixed = true;
        debug!(mad = self.mad, "MAD finalized");
        Ok(self.mad)
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance `M2 / (N - 1)`, zero below two values.
    pub fn variance(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            self.m2 / (self.n - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.min
        }
    }

    pub fn max(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.max
        }
    }

    pub fn range(&self) -> f64 {
        self.max() - self.min()
    }

    pub fn l1_norm(&self) -> f64 {
        self.l1
    }

    /// Euclidean norm of every observed value.
    pub fn l2_norm(&self) -> f64 {
        self.sum_sq.sqrt()
    }

    pub fn median(&self) -> f64 {
        self.median
    }

    pub fn mad(&self) -> f64 {
        self.mad
    }

    pub fn is_median_fixed(&self) -> bool {
        self.median_fixed
    }

    pub fn is_mad_fixed(&self) -> bool {
        self.mad_fixed
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            count: self.n,
            mean: self.mean,
            variance: self.variance(),
            std_dev: self.std_dev(),
            min: self.min(),
            max: self.max(),
            range: self.range(),
            l1_norm: self.l1_norm(),
            l2_norm: self.l2_norm(),
            median: self.median,
            mad: self.mad,
        }
    }
}
