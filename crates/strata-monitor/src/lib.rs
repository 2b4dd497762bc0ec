//! Logging setup and text inspection of runtime state.

mod inspect;
mod logging;

pub use inspect::{inspect, inspect_all, render_overview, render_symbol, Overview, SymbolState};
pub use logging::setup_logging;
