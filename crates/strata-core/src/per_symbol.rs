//! Dense per-symbol state containers.
//!
//! `PerSymbol<T>` maps every symbol of a [`SymbolRegistry`] to a value of
//! type `T`, with a shared default. Each slot has its own lock so different
//! symbols can be processed on different threads; a slot is only ever
//! touched by the thread that owns its symbol.

use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::io::Write;

use crate::codec::{decode_from, encode_into};
use crate::error::{CorruptState, StrataError, StrataResult};
use crate::symbol::{SymbolId, SymbolRegistry};

/// Failure to build a value from text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseFailure {
    /// The type has no textual form.
    Unsupported,
    /// The text is not a valid value of the type.
    Invalid(String),
}

/// A type that can live in a `PerSymbol` slot.
pub trait SlotValue: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Structural type name recorded in snapshots, e.g. `vec<f32>`.
    fn slot_type() -> String;

    /// Parse a textual default. Types without a textual form keep the
    /// default implementation.
    fn parse_text(_text: &str) -> Result<Self, ParseFailure> {
        Err(ParseFailure::Unsupported)
    }

    /// Number of elements held (vector slots report their length).
    fn element_count(&self) -> usize {
        1
    }
}

macro_rules! parseable_slot {
    ($($ty:ty => $name:literal),*) => {
        $(
            impl SlotValue for $ty {
                fn slot_type() -> String {
                    $name.to_string()
                }

                fn parse_text(text: &str) -> Result<Self, ParseFailure> {
                    text.trim()
                        .parse::<$ty>()
                        .map_err(|e| ParseFailure::Invalid(e.to_string()))
                }
            }
        )*
    };
}

parseable_slot!(
    f64 => "f64",
    f32 => "f32",
    i64 => "i64",
    i32 => "i32",
    u32 => "u32",
    u64 => "u64",
    usize => "usize",
    bool => "bool"
);

impl SlotValue for String {
    fn slot_type() -> String {
        "string".to_string()
    }

    fn parse_text(text: &str) -> Result<Self, ParseFailure> {
        Ok(text.to_string())
    }
}

impl SlotValue for chrono::NaiveDate {
    fn slot_type() -> String {
        "date".to_string()
    }
}

impl<T: SlotValue> SlotValue for Vec<T> {
    fn slot_type() -> String {
        format!("vec<{}>", T::slot_type())
    }

    fn element_count(&self) -> usize {
        self.len()
    }
}

impl<T: SlotValue> SlotValue for Option<T> {
    fn slot_type() -> String {
        format!("option<{}>", T::slot_type())
    }
}

/// Per-symbol container with a shared default.
pub struct PerSymbol<T> {
    name: String,
    slots: Vec<Mutex<T>>,
    default: RwLock<T>,
}

impl<T: Clone> PerSymbol<T> {
    /// Create an unnamed container with one slot per registered symbol.
    pub fn new(symbols: &SymbolRegistry, default: T) -> Self {
        Self::named("", symbols, default)
    }

    /// Create a named container. The name keys snapshots and overrides.
    pub fn named(name: impl Into<String>, symbols: &SymbolRegistry, default: T) -> Self {
        let slots = (0..symbols.len())
            .map(|_| Mutex::new(default.clone()))
            .collect();
        Self {
            name: name.into(),
            slots,
            default: RwLock::new(default),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of slots, always equal to the registry size.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    fn slot(&self, sym: SymbolId) -> &Mutex<T> {
        &self.slots[sym.index()]
    }

    /// Clone the value for a symbol.
    pub fn get(&self, sym: SymbolId) -> T {
        self.slot(sym).lock().clone()
    }

    /// Replace the value for a symbol.
    pub fn set(&self, sym: SymbolId, value: T) {
        *self.slot(sym).lock() = value;
    }

    /// Read the value for a symbol in place.
    pub fn with<R>(&self, sym: SymbolId, f: impl FnOnce(&T) -> R) -> R {
        f(&self.slot(sym).lock())
    }

    /// Mutate the value for a symbol in place.
    pub fn with_mut<R>(&self, sym: SymbolId, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.slot(sym).lock())
    }

    /// Hold the slot lock across several operations.
    pub fn lock(&self, sym: SymbolId) -> MutexGuard<'_, T> {
        self.slot(sym).lock()
    }

    /// Restore one slot to the stored default.
    pub fn reset(&self, sym: SymbolId) {
        let d = self.default.read().clone();
        *self.slot(sym).lock() = d;
    }

    /// Restore every slot to the stored default.
    pub fn reset_all(&self) {
        let d = self.default.read();
        for slot in &self.slots {
            *slot.lock() = d.clone();
        }
    }

    pub fn default_value(&self) -> T {
        self.default.read().clone()
    }

    /// Replace the default and reset every slot to it.
    pub fn set_default(&self, value: T) {
        *self.default.write() = value;
        self.reset_all();
    }

    /// Clone every slot in index order.
    pub fn values(&self) -> Vec<T> {
        self.slots.iter().map(|s| s.lock().clone()).collect()
    }
}

impl<T: SlotValue> PerSymbol<T> {
    fn parse_default(&self, text: &str) -> StrataResult<T> {
        T::parse_text(text).map_err(|e| match e {
            ParseFailure::Unsupported => StrataError::UnsupportedParse {
                field: self.name.clone(),
                type_name: std::any::type_name::<T>(),
            },
            ParseFailure::Invalid(reason) => StrataError::InvalidValue {
                field: self.name.clone(),
                value: text.to_string(),
                reason,
            },
        })
    }

    /// Parse a textual default and reset every slot to it.
    ///
    /// State is unchanged on failure.
    pub fn set_default_from_str(&self, text: &str) -> StrataResult<()> {
        let v = self.parse_default(text)?;
        self.set_default(v);
        Ok(())
    }

    /// Element count of one slot.
    pub fn len_of(&self, sym: SymbolId) -> usize {
        self.slot(sym).lock().element_count()
    }

    /// Write `[u32 count][default][count x value]`.
    pub fn save<W: Write>(&self, out: &mut W) -> StrataResult<()> {
        let count = u32::try_from(self.slots.len())
            .map_err(|_| StrataError::Data(format!("container {} too large", self.name)))?;
        encode_into(out, &count)?;
        encode_into(out, &*self.default.read())?;
        for slot in &self.slots {
            encode_into(out, &*slot.lock())?;
        }
        Ok(())
    }

    /// Apply a payload written by [`save`](Self::save).
    ///
    /// The whole payload is decoded before anything is applied, so a
    /// rejected load leaves the container untouched.
    pub fn load(&self, bytes: &[u8]) -> Result<(), CorruptState> {
        let limit = bytes.len() as u64;
        let mut inp = bytes;
        let count: u32 = decode_from(&mut inp, limit)?;
        if count as usize != self.slots.len() {
            return Err(CorruptState::CountMismatch {
                name: self.name.clone(),
                found: count,
                expected: self.slots.len(),
            });
        }
        let default: T = decode_from(&mut inp, limit)?;
        let mut values = Vec::with_capacity(self.slots.len());
        for _ in 0..count {
            values.push(decode_from::<_, T>(&mut inp, limit)?);
        }
        if !inp.is_empty() {
            return Err(CorruptState::InvalidValue(format!(
                "{} trailing bytes in `{}`",
                inp.len(),
                self.name
            )));
        }

        *self.default.write() = default;
        for (slot, v) in self.slots.iter().zip(values) {
            *slot.lock() = v;
        }
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for PerSymbol<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerSymbol")
            .field("name", &self.name)
            .field("len", &self.slots.len())
            .field("default", &*self.default.read())
            .finish()
    }
}

/// Type-erased view of a container, used by strategy registries for bulk
/// reset, overrides, inspection and persistence.
pub trait SymbolSlots: Send + Sync {
    fn name(&self) -> &str;

    /// Structural slot type recorded in snapshots.
    fn slot_type(&self) -> String;

    fn len(&self) -> usize;

    fn len_of(&self, sym: SymbolId) -> usize;

    fn reset_sym(&self, sym: SymbolId);

    fn reset_all(&self);

    fn set_default_str(&self, text: &str) -> StrataResult<()>;

    /// Whether `text` would be accepted by `set_default_str`. Never mutates.
    fn check_default_str(&self, text: &str) -> StrataResult<()>;

    fn describe_default(&self) -> String;

    fn describe(&self, sym: SymbolId) -> String;

    fn encode_payload(&self) -> StrataResult<Vec<u8>>;

    fn decode_payload(&self, bytes: &[u8]) -> Result<(), CorruptState>;
}

impl<T: SlotValue> SymbolSlots for PerSymbol<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn slot_type(&self) -> String {
        T::slot_type()
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn len_of(&self, sym: SymbolId) -> usize {
        PerSymbol::len_of(self, sym)
    }

    fn reset_sym(&self, sym: SymbolId) {
        self.reset(sym);
    }

    fn reset_all(&self) {
        PerSymbol::reset_all(self);
    }

    fn set_default_str(&self, text: &str) -> StrataResult<()> {
        self.set_default_from_str(text)
    }

    fn check_default_str(&self, text: &str) -> StrataResult<()> {
        self.parse_default(text).map(|_| ())
    }

    fn describe_default(&self) -> String {
        format!("{:?}", &*self.default.read())
    }

    fn describe(&self, sym: SymbolId) -> String {
        format!("{:?}", &*self.slot(sym).lock())
    }

    fn encode_payload(&self) -> StrataResult<Vec<u8>> {
        let mut out = Vec::new();
        self.save(&mut out)?;
        Ok(out)
    }

    fn decode_payload(&self, bytes: &[u8]) -> Result<(), CorruptState> {
        self.load(bytes)
    }
}
