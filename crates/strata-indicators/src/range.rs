//! Narrow-range day filter.

use chrono::NaiveDate;
use std::collections::VecDeque;
use strata_core::{Bar, Filter, PerSymbol, Resettable, Steppable, SymbolId, SymbolRegistry};

const LOOKBACK: usize = 7;

#[derive(Debug, Clone, Default)]
struct Nr7State {
    date: Option<NaiveDate>,
    high: f64,
    low: f64,
    ranges: VecDeque<f64>,
}

/// NR7: the last completed day's range is the narrowest of the last seven
/// completed days.
///
/// The running day's high and low are folded into the range history when
/// the first bar of the next date arrives.
#[derive(Debug)]
pub struct Nr7 {
    state: PerSymbol<Nr7State>,
}

impl Nr7 {
    pub fn new(symbols: &SymbolRegistry) -> Self {
        Self {
            state: PerSymbol::new(symbols, Nr7State::default()),
        }
    }

    /// Number of completed daily ranges held for the symbol.
    pub fn days(&self, sym: SymbolId) -> usize {
        self.state.with(sym, |s| s.ranges.len())
    }
}

impl Steppable for Nr7 {
    fn step(&self, bar: &Bar, sym: SymbolId, _charting: bool) {
        let date = bar.date();
        self.state.with_mut(sym, |s| {
            match s.date {
                Some(d) if d == date => {
                    s.high = s.high.max(bar.high);
                    s.low = s.low.min(bar.low);
                }
                prev => {
                    if prev.is_some() {
                        s.ranges.push_back(s.high - s.low);
                        if s.ranges.len() > LOOKBACK {
                            s.ranges.pop_front();
                        }
                    }
                    s.date = Some(date);
                    s.high = bar.high;
                    s.low = bar.low;
                }
            }
        });
    }
}

impl Resettable for Nr7 {
    fn reset_all(&self) {
        self.state.reset_all();
    }

    fn reset_sym(&self, sym: SymbolId) {
        self.state.reset(sym);
    }
}

impl Filter for Nr7 {
    fn name(&self) -> &str {
        "NR7"
    }

    fn validate(&self, sym: SymbolId) -> bool {
        self.state.with(sym, |s| {
            if s.ranges.len() < LOOKBACK {
                return false;
            }
            let Some(&last) = s.ranges.back() else {
                return false;
            };
            s.ranges.iter().all(|&r| last <= r)
        })
    }

    fn value(&self, sym: SymbolId) -> f64 {
        self.state
            .with(sym, |s| s.ranges.back().copied().unwrap_or(f64::NAN))
    }

    fn set_threshold(&self, _threshold: f64, _sym: SymbolId) {}
}
