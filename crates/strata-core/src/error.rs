//! Error types for the strategy runtime.

use thiserror::Error;

use crate::symbol::SymbolId;

/// Top-level runtime error.
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("Precondition violation: {0}")]
    Precondition(#[from] PreconditionViolation),

    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("Unsupported parse: field `{field}` of type {type_name} has no textual form")]
    UnsupportedParse {
        field: String,
        type_name: &'static str,
    },

    #[error("Invalid value for `{field}`: {value:?} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Corrupt state: {0}")]
    Corrupt(#[from] CorruptState),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Strategy error: {0}")]
    Strategy(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Illegal state transition requested for a symbol.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreconditionViolation {
    #[error("cannot enter {sym}: position is {status}")]
    EnterNotFree { sym: SymbolId, status: &'static str },

    #[error("cannot enter {sym}: {pnl:.4} of booked PnL has not been consumed")]
    UnconsumedPnl { sym: SymbolId, pnl: f64 },

    #[error("cannot exit {sym}: position is {status}")]
    ExitNotHeld { sym: SymbolId, status: &'static str },

    #[error("cannot free {sym}: position is {status}")]
    FreeNotBlocked { sym: SymbolId, status: &'static str },

    #[error("invalid entry for {sym}: {reason}")]
    InvalidEntry { sym: SymbolId, reason: String },
}

/// Caller ordering bug in a multi-phase protocol.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("median already finalized")]
    MedianAlreadyFinalized,

    #[error("median must be finalized before stepping MAD")]
    MadBeforeMedian,

    #[error("MAD already finalized")]
    MadAlreadyFinalized,

    #[error("moment batches are closed once the median is finalized")]
    MomentsAfterMedian,
}

/// Persisted state that cannot be applied to the live runtime.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorruptState {
    #[error("bad snapshot magic")]
    BadMagic,

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("container `{name}` holds {found} elements, registry has {expected} symbols")]
    CountMismatch {
        name: String,
        found: u32,
        expected: usize,
    },

    #[error("expected container `{expected}`, found `{found}`")]
    NameMismatch { expected: String, found: String },

    #[error("container `{name}` holds {found}, registry expects {expected}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("snapshot holds {found} containers, runtime registers {expected}")]
    ContainerCount { found: u32, expected: usize },

    #[error("truncated data: {0}")]
    Truncated(String),

    #[error("invalid encoded value: {0}")]
    InvalidValue(String),
}

impl From<bincode::Error> for CorruptState {
    fn from(e: bincode::Error) -> Self {
        match *e {
            bincode::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                CorruptState::Truncated(io.to_string())
            }
            other => CorruptState::InvalidValue(other.to_string()),
        }
    }
}

/// Result type alias for runtime operations.
pub type StrataResult<T> = Result<T, StrataError>;
