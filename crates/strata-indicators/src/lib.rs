//! Streaming per-symbol indicators and filters.
//!
//! Every component owns private `PerSymbol` state and is stepped one bar at
//! a time by the runtime:
//! - Indicators: ATR (Wilder), VWAP (daily), EMA
//! - Filters: rolling volume, NR7
//!
//! Components are grouped into ordered [`IndicatorPipeline`] and
//! [`FilterPipeline`] collections that step in registration order.

pub mod chart;
pub mod moving_average;
pub mod pipeline;
pub mod range;
pub mod rolling;
pub mod volatility;
pub mod volume;

pub use chart::ChartBuffer;
pub use moving_average::Ema;
pub use pipeline::{FilterPipeline, IndicatorPipeline};
pub use range::Nr7;
pub use rolling::RollingSum;
pub use volatility::Atr;
pub use volume::{RollingVolume, Vwap};
