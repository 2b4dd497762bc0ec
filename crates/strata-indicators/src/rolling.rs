//! Fixed-window running sum.

use std::collections::VecDeque;

/// Sum of the last `period` pushed values.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingSum {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl RollingSum {
    /// A zero period is treated as one.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.window.len() == self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        self.window.push_back(value);
        self.sum += value;
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.window.len() == self.period
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.sum = 0.0;
    }
}
