//! Per-symbol trade lifecycle.
//!
//! ```text
//! FREE --enter--> LONG_HELD | SHORT_HELD --exit--> FREE
//!                                      \--exit+block--> BLOCKED --free--> FREE
//! ```
//!
//! `block` is accepted from any state. A blocked symbol cannot enter until
//! it is freed, and booked PnL must be consumed before the next entry.

use serde::{Deserialize, Serialize};

use super::Bar;
use crate::error::PreconditionViolation;
use crate::per_symbol::SlotValue;
use crate::symbol::SymbolId;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    #[inline]
    pub fn direction(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

/// Lifecycle status of a symbol's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PositionStatus {
    #[default]
    Free,
    LongHeld,
    ShortHeld,
    Blocked,
}

impl PositionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PositionStatus::Free => "FREE",
            PositionStatus::LongHeld => "LONG_HELD",
            PositionStatus::ShortHeld => "SHORT_HELD",
            PositionStatus::Blocked => "BLOCKED",
        }
    }
}

/// Exit metadata returned by [`Position::exit`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitRecord {
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: i64,
    pub exit_price: f64,
    pub exit_time: i64,
    pub stop_price: f64,
    pub target_price: f64,
    pub pnl: f64,
    pub time_stop: bool,
}

impl ExitRecord {
    #[inline]
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

/// One symbol's position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub status: PositionStatus,
    /// Side of the trade; kept after exit for reporting.
    pub side: Option<Side>,
    pub entry_price: f64,
    /// Unix ms
    pub entry_time: i64,
    pub stop_distance: f64,
    pub target_distance: f64,
    pub stop_price: f64,
    pub target_price: f64,
    /// Lifetime realized PnL.
    pub realized_pnl: f64,
    /// PnL booked at exit and not yet consumed.
    pub unrealized_pnl: f64,
}

impl Position {
    #[inline]
    pub fn is_free(&self) -> bool {
        self.status == PositionStatus::Free
    }

    #[inline]
    pub fn is_held(&self) -> bool {
        matches!(
            self.status,
            PositionStatus::LongHeld | PositionStatus::ShortHeld
        )
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.status == PositionStatus::Blocked
    }

    /// Open a position. Legal only from FREE with no booked PnL pending.
    pub fn enter(
        &mut self,
        sym: SymbolId,
        side: Side,
        price: f64,
        time: i64,
        stop_distance: f64,
        target_distance: f64,
    ) -> Result<(), PreconditionViolation> {
        if !self.is_free() {
            return Err(PreconditionViolation::EnterNotFree {
                sym,
                status: self.status.as_str(),
            });
        }
        if self.unrealized_pnl != 0.0 {
            return Err(PreconditionViolation::UnconsumedPnl {
                sym,
                pnl: self.unrealized_pnl,
            });
        }
        if !price.is_finite() || !stop_distance.is_finite() || !target_distance.is_finite() {
            return Err(PreconditionViolation::InvalidEntry {
                sym,
                reason: format!(
                    "non-finite entry (price {price}, stop {stop_distance}, target {target_distance})"
                ),
            });
        }
        if stop_distance < 0.0 || target_distance < 0.0 {
            return Err(PreconditionViolation::InvalidEntry {
                sym,
                reason: "stop and target distances must be non-negative".into(),
            });
        }

        let dir = side.direction();
        self.status = match side {
            Side::Long => PositionStatus::LongHeld,
            Side::Short => PositionStatus::ShortHeld,
        };
        self.side = Some(side);
        self.entry_price = price;
        self.entry_time = time;
        self.stop_distance = stop_distance;
        self.target_distance = target_distance;
        self.stop_price = price - dir * stop_distance;
        self.target_price = price + dir * target_distance;
        Ok(())
    }

    /// Whether the bar crossed the stop or the target. Never mutates.
    pub fn check_exit(&self, bar: &Bar) -> bool {
        match self.status {
            PositionStatus::LongHeld => bar.low <= self.stop_price || bar.high >= self.target_price,
            PositionStatus::ShortHeld => {
                bar.high >= self.stop_price || bar.low <= self.target_price
            }
            _ => false,
        }
    }

    fn exit_price(&self, bar: &Bar, time_stop: bool) -> f64 {
        if time_stop {
            return bar.close;
        }
        match self.status {
            PositionStatus::LongHeld if bar.low <= self.stop_price => self.stop_price,
            PositionStatus::LongHeld if bar.high >= self.target_price => self.target_price,
            PositionStatus::ShortHeld if bar.high >= self.stop_price => self.stop_price,
            PositionStatus::ShortHeld if bar.low <= self.target_price => self.target_price,
            _ => bar.close,
        }
    }

    /// Close the position on `bar`. Legal only from a held state.
    ///
    /// The exit price is the bar close for a time stop, otherwise the level
    /// that was crossed (the stop when both were), otherwise the close.
    pub fn exit(
        &mut self,
        sym: SymbolId,
        bar: &Bar,
        time_stop: bool,
    ) -> Result<ExitRecord, PreconditionViolation> {
        let side = match (self.status, self.side) {
            (PositionStatus::LongHeld, Some(s)) | (PositionStatus::ShortHeld, Some(s)) => s,
            _ => {
                return Err(PreconditionViolation::ExitNotHeld {
                    sym,
                    status: self.status.as_str(),
                })
            }
        };

        let exit_price = self.exit_price(bar, time_stop);
        let pnl = (exit_price - self.entry_price) * side.direction();
        self.realized_pnl += pnl;
        self.unrealized_pnl += pnl;
        self.status = PositionStatus::Free;

        Ok(ExitRecord {
            side,
            entry_price: self.entry_price,
            entry_time: self.entry_time,
            exit_price,
            exit_time: bar.timestamp,
            stop_price: self.stop_price,
            target_price: self.target_price,
            pnl,
            time_stop,
        })
    }

    /// Force the symbol out of trading.
    pub fn block(&mut self) {
        self.status = PositionStatus::Blocked;
    }

    /// Release a blocked symbol. Returns whether the transition occurred.
    pub fn free(&mut self) -> bool {
        if self.is_blocked() {
            self.status = PositionStatus::Free;
            true
        } else {
            false
        }
    }

    /// Read and zero the booked PnL accumulator.
    pub fn consume_pnl(&mut self) -> f64 {
        std::mem::take(&mut self.unrealized_pnl)
    }

    /// Entry price of an open position.
    pub fn cost_basis(&self) -> Option<f64> {
        self.is_held().then_some(self.entry_price)
    }
}

impl SlotValue for Position {
    fn slot_type() -> String {
        "position".to_string()
    }
}
