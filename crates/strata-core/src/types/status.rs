//! Sequence assembly status.

use serde::{Deserialize, Serialize};

use crate::per_symbol::SlotValue;

/// Per-symbol progress of sequence assembly.
///
/// `Empty -> Wip` on the first pushed step, `Wip -> Ready` when the strategy
/// accepts the window, `Wip | Ready -> Aborted` when it rejects it, and
/// `Ready -> Finished` once the sample has been handed off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataStatus {
    #[default]
    Empty,
    Wip,
    Ready,
    Aborted,
    Finished,
}

impl DataStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DataStatus::Empty => "Empty",
            DataStatus::Wip => "WIP",
            DataStatus::Ready => "Ready",
            DataStatus::Aborted => "Aborted",
            DataStatus::Finished => "Finished",
        }
    }
}

impl SlotValue for DataStatus {
    fn slot_type() -> String {
        "data_status".to_string()
    }
}
