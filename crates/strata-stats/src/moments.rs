//! SIMD batch moments.
//!
//! Uses the `wide` crate for portable four-lane reductions.

use wide::f64x4;

/// Summary of one batch, ready to merge into running statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchMoments {
    pub n: u64,
    pub mean: f64,
    /// Sum of squared deviations from the batch mean.
    pub m2: f64,
    pub min: f64,
    pub max: f64,
    /// Sum of absolute values.
    pub l1: f64,
    /// Sum of squares.
    pub sum_sq: f64,
}

#[inline]
fn lanes(c: &[f64]) -> f64x4 {
    f64x4::new([c[0], c[1], c[2], c[3]])
}

#[inline]
fn hsum(v: f64x4) -> f64 {
    v.to_array().iter().sum()
}

/// Moments of a batch, `None` when it is empty.
///
/// Two passes: sums, extrema and norms first, then squared deviations
/// around the batch mean.
pub fn batch_moments(data: &[f64]) -> Option<BatchMoments> {
    if data.is_empty() {
        return None;
    }

    let chunks = data.chunks_exact(4);
    let rem = chunks.remainder();

    let mut sum = f64x4::splat(0.0);
    let mut abs = f64x4::splat(0.0);
    let mut sq = f64x4::splat(0.0);
    let mut lo = f64x4::splat(f64::INFINITY);
    let mut hi = f64x4::splat(f64::NEG_INFINITY);
    for c in chunks {
        let v = lanes(c);
        sum += v;
        abs += v.abs();
        sq += v * v;
        lo = lo.min(v);
        hi = hi.max(v);
    }

    let mut total = hsum(sum);
    let mut l1 = hsum(abs);
    let mut sum_sq = hsum(sq);
    let mut min = lo.to_array().into_iter().fold(f64::INFINITY, f64::min);
    let mut max = hi.to_array().into_iter().fold(f64::NEG_INFINITY, f64::max);
    for &x in rem {
        total += x;
        l1 += x.abs();
        sum_sq += x * x;
        min = min.min(x);
        max = max.max(x);
    }

    let n = data.len();
    let mean = total / n as f64;

    let m = f64x4::splat(mean);
    let mut dev = f64x4::splat(0.0);
    for c in data.chunks_exact(4) {
        let d = lanes(c) - m;
        dev += d * d;
    }
    let mut m2 = hsum(dev);
    for &x in rem {
        m2 += (x - mean) * (x - mean);
    }

    Some(BatchMoments {
        n: n as u64,
        mean,
        m2,
        min,
        max,
        l1,
        sum_sq,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch() {
        assert!(batch_moments(&[]).is_none());
    }

    #[test]
    fn test_batch_moments_with_remainder() {
        let data = [1.0, -2.0, 3.0, 4.0, 5.0, -6.0, 7.0];
        let m = batch_moments(&data).unwrap();
        let mean = data.iter().sum::<f64>() / 7.0;
        let m2: f64 = data.iter().map(|x| (x - mean).powi(2)).sum();

        assert_eq!(m.n, 7);
        assert!((m.mean - mean).abs() < 1e-12);
        assert!((m.m2 - m2).abs() < 1e-9);
        assert!((m.min + 6.0).abs() < 1e-12);
        assert!((m.max - 7.0).abs() < 1e-12);
        assert!((m.l1 - 28.0).abs() < 1e-12);
        assert!((m.sum_sq - 140.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_value() {
        let m = batch_moments(&[2.5]).unwrap();
        assert!((m.mean - 2.5).abs() < 1e-12);
        assert!(m.m2.abs() < 1e-12);
        assert!((m.min - m.max).abs() < 1e-12);
    }
}
