//! Capability traits composed by streaming components.

mod indicator;

pub use indicator::{ChartPoint, Filter, Indicator, Resettable, Steppable};
