//! Position state machine across all symbols.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::PreconditionViolation;
use crate::per_symbol::PerSymbol;
use crate::symbol::{SymbolId, SymbolRegistry};
use crate::types::{Bar, ExitRecord, Position, PositionStatus, Side};

/// One [`Position`] per symbol.
///
/// Every transition validates against the current status first; a rejected
/// call leaves the symbol's fields exactly as they were.
#[derive(Debug, Clone)]
pub struct PositionBook {
    slots: Arc<PerSymbol<Position>>,
}

impl PositionBook {
    pub fn new(symbols: &SymbolRegistry) -> Self {
        Self {
            slots: Arc::new(PerSymbol::named("positions", symbols, Position::default())),
        }
    }

    /// Underlying container, for registration and persistence.
    pub fn container(&self) -> Arc<PerSymbol<Position>> {
        Arc::clone(&self.slots)
    }

    pub fn get(&self, sym: SymbolId) -> Position {
        self.slots.get(sym)
    }

    pub fn status(&self, sym: SymbolId) -> PositionStatus {
        self.slots.with(sym, |p| p.status)
    }

    pub fn is_free(&self, sym: SymbolId) -> bool {
        self.slots.with(sym, Position::is_free)
    }

    pub fn is_held(&self, sym: SymbolId) -> bool {
        self.slots.with(sym, Position::is_held)
    }

    pub fn is_blocked(&self, sym: SymbolId) -> bool {
        self.slots.with(sym, Position::is_blocked)
    }

    pub fn cost_basis(&self, sym: SymbolId) -> Option<f64> {
        self.slots.with(sym, Position::cost_basis)
    }

    pub fn enter_long(
        &self,
        sym: SymbolId,
        price: f64,
        time: i64,
        stop_distance: f64,
        target_distance: f64,
    ) -> Result<(), PreconditionViolation> {
        self.enter(sym, Side::Long, price, time, stop_distance, target_distance)
    }

    pub fn enter_short(
        &self,
        sym: SymbolId,
        price: f64,
        time: i64,
        stop_distance: f64,
        target_distance: f64,
    ) -> Result<(), PreconditionViolation> {
        self.enter(sym, Side::Short, price, time, stop_distance, target_distance)
    }

    pub fn enter(
        &self,
        sym: SymbolId,
        side: Side,
        price: f64,
        time: i64,
        stop_distance: f64,
        target_distance: f64,
    ) -> Result<(), PreconditionViolation> {
        self.slots.with_mut(sym, |p| {
            p.enter(sym, side, price, time, stop_distance, target_distance)
        })?;
        debug!(%sym, ?side, price, stop_distance, target_distance, "position entered");
        Ok(())
    }

    /// Whether the bar crossed the symbol's stop or target.
    pub fn check_exit(&self, sym: SymbolId, bar: &Bar) -> bool {
        self.slots.with(sym, |p| p.check_exit(bar))
    }

    pub fn exit(
        &self,
        sym: SymbolId,
        bar: &Bar,
        time_stop: bool,
    ) -> Result<ExitRecord, PreconditionViolation> {
        let rec = self.slots.with_mut(sym, |p| p.exit(sym, bar, time_stop))?;
        debug!(%sym, pnl = rec.pnl, exit_price = rec.exit_price, time_stop, "position exited");
        Ok(rec)
    }

    pub fn block(&self, sym: SymbolId) {
        self.slots.with_mut(sym, Position::block);
        info!(%sym, "symbol blocked");
    }

    /// Release a blocked symbol. Returns whether the transition occurred.
    pub fn free(&self, sym: SymbolId) -> bool {
        let freed = self.slots.with_mut(sym, Position::free);
        if freed {
            info!(%sym, "symbol freed");
        }
        freed
    }

    /// Like [`free`](Self::free), but a non-blocked symbol is an error.
    pub fn try_free(&self, sym: SymbolId) -> Result<(), PreconditionViolation> {
        self.slots.with_mut(sym, |p| {
            if p.free() {
                Ok(())
            } else {
                Err(PreconditionViolation::FreeNotBlocked {
                    sym,
                    status: p.status.as_str(),
                })
            }
        })
    }

    /// Read and zero the symbol's booked PnL.
    pub fn consume_pnl(&self, sym: SymbolId) -> f64 {
        self.slots.with_mut(sym, Position::consume_pnl)
    }

    pub fn reset(&self, sym: SymbolId) {
        self.slots.reset(sym);
    }

    pub fn reset_all(&self) {
        self.slots.reset_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> PositionBook {
        PositionBook::new(&SymbolRegistry::new(["AAPL", "MSFT"]).unwrap())
    }

    #[test]
    fn test_symbols_are_independent() {
        let b = book();
        b.enter_long(SymbolId(0), 100.0, 0, 1.0, 2.0).unwrap();
        assert!(b.is_held(SymbolId(0)));
        assert!(b.is_free(SymbolId(1)));
        assert!(b.enter_short(SymbolId(0), 100.0, 0, 1.0, 2.0).is_err());
        assert!(b.enter_short(SymbolId(1), 50.0, 0, 1.0, 2.0).is_ok());
    }

    #[test]
    fn test_try_free_on_free_symbol() {
        let b = book();
        let err = b.try_free(SymbolId(0)).unwrap_err();
        assert!(matches!(err, PreconditionViolation::FreeNotBlocked { .. }));
        b.block(SymbolId(0));
        assert!(b.try_free(SymbolId(0)).is_ok());
    }

    #[test]
    fn test_illegal_exit_leaves_other_symbol() {
        let b = book();
        b.enter_long(SymbolId(1), 10.0, 0, 1.0, 1.0).unwrap();
        let bar = Bar::new(0, 10.0, 10.5, 9.5, 10.0, 1.0);
        assert!(b.exit(SymbolId(0), &bar, false).is_err());
        assert!(b.is_held(SymbolId(1)));
        assert_eq!(b.cost_basis(SymbolId(1)), Some(10.0));
    }
}
