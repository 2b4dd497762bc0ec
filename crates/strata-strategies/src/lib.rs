//! Strategy implementations.
//!
//! - Opening Range Breakout with sequence features for model training
//! - Fixed-threshold breakout
//!
//! Strategies are created by name through the [`StrategyRegistry`].

mod opening_range;
mod params;
mod registry;
mod threshold;

pub use opening_range::{OpeningRangeBreakout, OrbParams};
pub use params::StrategyParams;
pub use registry::{StrategyInfo, StrategyRegistry};
pub use threshold::{ThresholdBreakout, ThresholdParams};
