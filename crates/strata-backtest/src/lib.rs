//! Backtesting: historical replay of a strategy runtime, trade statistics
//! and the two-pass normalization fit.

mod engine;
mod report;
mod statistics;

pub use engine::{BacktestConfig, BacktestEngine};
pub use report::{BacktestReport, SymbolReport};
pub use statistics::{BacktestStats, TradeRecord};
