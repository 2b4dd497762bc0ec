//! Strategy trait definitions.

use strata_core::{Bar, StrataResult, SymbolId};

use crate::context::Context;
use crate::sequence::SequenceVerdict;

/// What the runtime does with the sequence after the strategy hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepAction {
    /// Append the current feature values as a new step.
    Push,
    #[default]
    Skip,
}

/// Per-symbol strategy hooks.
///
/// A strategy owns handles to the containers, indicators, filters, features
/// and labels it registered through the
/// [`StrategyBuilder`](crate::StrategyBuilder). Hooks take `&self`: all
/// per-symbol state lives in those containers, and a symbol is only ever
/// processed by one thread at a time.
pub trait Strategy: Send + Sync {
    /// Unique name of this strategy.
    fn name(&self) -> &str;

    /// Called once per symbol before its first bar or warm-up.
    fn start(&self, _ctx: &Context, _sym: SymbolId) {}

    /// Called on the first bar of each trading day, after the runtime reset
    /// the daily containers and cleared the symbol's sequence.
    fn new_day(&self, _ctx: &Context, _bar: &Bar, _sym: SymbolId) -> StrataResult<()> {
        Ok(())
    }

    /// Process one bar after filters and indicators have been stepped.
    ///
    /// # Returns
    /// * `StepAction::Push` to append the feature values written for this bar
    /// * `StepAction::Skip` otherwise
    fn process_bar(&self, ctx: &Context, bar: &Bar, sym: SymbolId) -> StrataResult<StepAction>;

    /// Judge the symbol's window while it is being assembled. The default
    /// never completes a sample.
    fn validate_sequence(&self, _ctx: &Context, _sym: SymbolId) -> SequenceVerdict {
        SequenceVerdict::Pending
    }
}
