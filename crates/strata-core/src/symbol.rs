//! Process-wide symbol enumeration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{StrataError, StrataResult};

/// Dense symbol index, `0 <= id < registry.len()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

impl SymbolId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<usize> for SymbolId {
    fn from(i: usize) -> Self {
        SymbolId(i as u32)
    }
}

/// Fixed set of tradable symbols, established once at startup.
///
/// Every per-symbol container is sized from the registry it was built
/// against; the registry never grows or shrinks afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRegistry {
    names: Vec<String>,
    index: HashMap<String, SymbolId>,
}

impl SymbolRegistry {
    /// Create a registry from symbol names. Duplicates are rejected.
    pub fn new<I, S>(names: I) -> StrataResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Vec::new();
        let mut index = HashMap::new();
        for name in names {
            let name = name.into();
            if index.contains_key(&name) {
                return Err(StrataError::Config(format!("duplicate symbol {name}")));
            }
            index.insert(name.clone(), SymbolId::from(out.len()));
            out.push(name);
        }
        Ok(Self { names: out, index })
    }

    /// Number of symbols.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Look up a symbol by name.
    pub fn id(&self, name: &str) -> Option<SymbolId> {
        self.index.get(name).copied()
    }

    /// Look up a symbol by name, failing with `UnknownSymbol`.
    pub fn require(&self, name: &str) -> StrataResult<SymbolId> {
        self.id(name)
            .ok_or_else(|| StrataError::UnknownSymbol(name.to_string()))
    }

    /// Name of a symbol. Panics on an id from another registry.
    pub fn name(&self, sym: SymbolId) -> &str {
        &self.names[sym.index()]
    }

    /// Check whether an id belongs to this registry.
    #[inline]
    pub fn contains(&self, sym: SymbolId) -> bool {
        sym.index() < self.names.len()
    }

    /// Iterate over all symbol ids in index order.
    pub fn ids(&self) -> impl Iterator<Item = SymbolId> + '_ {
        (0..self.names.len()).map(SymbolId::from)
    }

    /// Iterate over `(id, name)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| (SymbolId::from(i), n.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let reg = SymbolRegistry::new(["AAPL", "MSFT", "SPY"]).unwrap();
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.id("MSFT"), Some(SymbolId(1)));
        assert_eq!(reg.name(SymbolId(2)), "SPY");
        assert!(reg.id("QQQ").is_none());
        assert!(reg.require("QQQ").is_err());
        assert_eq!(reg.ids().count(), 3);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        assert!(SymbolRegistry::new(["AAPL", "AAPL"]).is_err());
    }
}
