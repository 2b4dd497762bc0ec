//! Trade event log.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use strata_core::{ExitRecord, Side, SymbolId};

/// A completed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub symbol: SymbolId,
    pub symbol_name: String,
    pub side: Side,
    pub entry_time: i64,
    pub entry_price: f64,
    pub exit_time: i64,
    pub exit_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub pnl: f64,
    pub time_stop: bool,
}

impl TradeEvent {
    pub fn new(symbol: SymbolId, symbol_name: &str, rec: &ExitRecord) -> Self {
        Self {
            symbol,
            symbol_name: symbol_name.to_string(),
            side: rec.side,
            entry_time: rec.entry_time,
            entry_price: rec.entry_price,
            exit_time: rec.exit_time,
            exit_price: rec.exit_price,
            stop_price: rec.stop_price,
            target_price: rec.target_price,
            pnl: rec.pnl,
            time_stop: rec.time_stop,
        }
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    /// Holding time in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.exit_time - self.entry_time
    }
}

/// Shared append-only trade log.
#[derive(Debug, Default)]
pub struct TradeLog {
    events: Mutex<Vec<TradeEvent>>,
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: TradeEvent) {
        self.events.lock().push(event);
    }

    /// Events in completion order.
    pub fn events(&self) -> Vec<TradeEvent> {
        self.events.lock().clone()
    }

    /// Events of one symbol.
    pub fn for_symbol(&self, sym: SymbolId) -> Vec<TradeEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.symbol == sym)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub(crate) fn clear_symbol(&self, sym: SymbolId) {
        self.events.lock().retain(|e| e.symbol != sym);
    }
}
