//! Core types and traits for the per-symbol strategy runtime.
//!
//! This crate provides the foundational building blocks:
//! - The symbol registry and OHLCV bars
//! - `PerSymbol<T>` containers and their binary snapshot format
//! - The position state machine
//! - Capability traits for streaming indicators and filters

pub mod codec;
pub mod error;
pub mod per_symbol;
pub mod positions;
pub mod symbol;
pub mod traits;
pub mod types;

pub use codec::{read_snapshot, write_snapshot, SnapshotLoad};
pub use error::{
    CorruptState, PreconditionViolation, ProtocolViolation, StrataError, StrataResult,
};
pub use per_symbol::{ParseFailure, PerSymbol, SlotValue, SymbolSlots};
pub use positions::PositionBook;
pub use symbol::{SymbolId, SymbolRegistry};
pub use traits::*;
pub use types::*;
