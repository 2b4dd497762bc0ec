//! Streaming normalization statistics.
//!
//! - [`moments`]: SIMD batch moments (count, mean, M2, min, max, norms)
//! - [`sketch`]: bounded-memory quantile sketch
//! - [`NormalizationStats`]: two-phase accumulation (moments + median, then MAD)
//! - [`Normalizer`]: identity, z-score and robust scaling from finalized stats

pub mod moments;
pub mod normalizer;
pub mod sketch;
pub mod stats;

pub use moments::{batch_moments, BatchMoments};
pub use normalizer::{Normalizer, NormalizerKind, EPSILON, MAD_SCALE};
pub use sketch::QuantileSketch;
pub use stats::{NormalizationStats, StatsSummary};
