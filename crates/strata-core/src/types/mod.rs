//! Core data types for the strategy runtime.

mod bar;
mod position;
mod status;

pub use bar::Bar;
pub use position::{ExitRecord, Position, PositionStatus, Side};
pub use status::DataStatus;
