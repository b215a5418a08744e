//! Append-only string interning table
//!
//! Shared by the payload compiler (which writes it) and the generator (which
//! reads it by 1-based line number). Index 0 is reserved for "no string".

use std::collections::HashMap;
use std::io::{self, Write};
use std::num::NonZeroU32;

/// 1-based position of an interned string
pub type StringIndex = NonZeroU32;

/// Ordered set of unique strings
///
/// Insertion order is the on-disk order and therefore the only valid order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTable {
    entries: Vec<String>,
    positions: HashMap<String, StringIndex>,
}

impl StringTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its 1-based index
    ///
    /// A string already present keeps its original index. The table is
    /// addressed by line, so callers must not intern strings containing line
    /// breaks.
    pub fn intern(&mut self, value: &str) -> StringIndex {
        if let Some(idx) = self.positions.get(value) {
            return *idx;
        }

        self.entries.push(value.to_string());
        let idx = StringIndex::new(self.entries.len() as u32)
            .unwrap_or(StringIndex::MIN);
        self.positions.insert(value.to_string(), idx);
        idx
    }

    /// Resolve a 1-based index; 0 and out-of-range indices yield `None`
    pub fn get(&self, index: u32) -> Option<&str> {
        let pos = (index as usize).checked_sub(1)?;
        self.entries.get(pos).map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been interned
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in index order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Write one entry per line, newline-terminated
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for entry in &self.entries {
            writer.write_all(entry.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_one_based() {
        let mut table = StringTable::new();
        assert_eq!(table.intern("a").get(), 1);
        assert_eq!(table.intern("b").get(), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_intern_never_reinserts() {
        let mut table = StringTable::new();
        let first = table.intern("host");
        table.intern("label");
        let again = table.intern("host");

        assert_eq!(first, again);
        assert_eq!(table.len(), 2);
        assert_eq!(table.iter().collect::<Vec<_>>(), vec!["host", "label"]);
    }

    #[test]
    fn test_get_reserved_zero() {
        let mut table = StringTable::new();
        table.intern("x");
        assert_eq!(table.get(0), None);
        assert_eq!(table.get(1), Some("x"));
        assert_eq!(table.get(2), None);
    }

    #[test]
    fn test_write_to_lines() {
        let mut table = StringTable::new();
        table.intern("http://localhost");
        table.intern("home");

        let mut out = Vec::new();
        table.write_to(&mut out).unwrap();
        assert_eq!(out, b"http://localhost\nhome\n");
    }
}
