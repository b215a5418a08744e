//! Per-record metadata line
//!
//! Two encodings share one payload format: literal strings, or 1-based
//! indices into the input string table. The generator tells them apart by
//! key names.

use loadwire_core::StringTable;
use serde::Serialize;
use std::io::{self, Write};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Assertion with a literal pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiteralAssert {
    /// Pattern the response must (or must not) contain
    #[serde(rename = "re")]
    pub pattern: String,
    /// Inverted check
    #[serde(skip_serializing_if = "is_false")]
    pub invert: bool,
}

/// Metadata with literal strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiteralMeta {
    /// Payload length in UTF-8 bytes
    #[serde(rename = "plen")]
    pub payload_len: usize,
    /// Target address
    pub address: String,
    /// Sample label
    pub label: String,
    /// Variables substituted into this request
    #[serde(rename = "replaces", skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
    /// Extraction templates
    #[serde(rename = "extracts", skip_serializing_if = "Vec::is_empty")]
    pub extracts: Vec<String>,
    /// Assertions
    #[serde(rename = "asserts", skip_serializing_if = "Vec::is_empty")]
    pub asserts: Vec<LiteralAssert>,
}

/// Assertion with an interned pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexedAssert {
    /// Pattern index
    #[serde(rename = "r")]
    pub pattern: u32,
    /// Inverted check
    #[serde(rename = "n", skip_serializing_if = "is_false")]
    pub invert: bool,
}

/// Metadata with string-table indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedMeta {
    /// Payload length in UTF-8 bytes
    #[serde(rename = "plen")]
    pub payload_len: usize,
    /// Target address index
    #[serde(rename = "a")]
    pub address: u32,
    /// Label index
    #[serde(rename = "l")]
    pub label: u32,
    /// Consumed variable name indices
    #[serde(rename = "r", skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<u32>,
    /// Extraction template indices
    #[serde(rename = "e", skip_serializing_if = "Vec::is_empty")]
    pub extracts: Vec<u32>,
    /// Assertions
    #[serde(rename = "c", skip_serializing_if = "Vec::is_empty")]
    pub asserts: Vec<IndexedAssert>,
}

impl IndexedMeta {
    /// Intern every string of a literal record into `table`
    pub fn intern(literal: &LiteralMeta, table: &mut StringTable) -> Self {
        let address = table.intern(&literal.address).get();
        let label = table.intern(&literal.label).get();
        let consumes = literal
            .consumes
            .iter()
            .map(|name| table.intern(name).get())
            .collect();
        let extracts = literal
            .extracts
            .iter()
            .map(|tpl| table.intern(tpl).get())
            .collect();
        let asserts = literal
            .asserts
            .iter()
            .map(|a| IndexedAssert {
                pattern: table.intern(&a.pattern).get(),
                invert: a.invert,
            })
            .collect();

        Self {
            payload_len: literal.payload_len,
            address,
            label,
            consumes,
            extracts,
            asserts,
        }
    }

    /// Resolve indices back to literals; `None` if any index is unknown
    pub fn resolve(&self, table: &StringTable) -> Option<LiteralMeta> {
        let lookup = |idx: u32| table.get(idx).map(str::to_string);
        Some(LiteralMeta {
            payload_len: self.payload_len,
            address: lookup(self.address)?,
            label: lookup(self.label)?,
            consumes: self
                .consumes
                .iter()
                .map(|i| lookup(*i))
                .collect::<Option<_>>()?,
            extracts: self
                .extracts
                .iter()
                .map(|i| lookup(*i))
                .collect::<Option<_>>()?,
            asserts: self
                .asserts
                .iter()
                .map(|a| {
                    lookup(a.pattern).map(|pattern| LiteralAssert {
                        pattern,
                        invert: a.invert,
                    })
                })
                .collect::<Option<_>>()?,
        })
    }
}

/// Metadata in either encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RecordMeta {
    /// Literal strings
    Literal(LiteralMeta),
    /// String-table indices
    Indexed(IndexedMeta),
}

impl RecordMeta {
    /// Payload length declared by this record
    pub fn payload_len(&self) -> usize {
        match self {
            RecordMeta::Literal(meta) => meta.payload_len,
            RecordMeta::Indexed(meta) => meta.payload_len,
        }
    }
}

/// Metadata plus raw request bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRecord {
    /// Metadata line
    pub meta: RecordMeta,
    /// Raw HTTP request
    pub payload: String,
}

impl WireRecord {
    /// Write `metadata \r\n payload \r\n`
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        serde_json::to_writer(&mut *writer, &self.meta)?;
        writer.write_all(b"\r\n")?;
        writer.write_all(self.payload.as_bytes())?;
        writer.write_all(b"\r\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal() -> LiteralMeta {
        LiteralMeta {
            payload_len: 42,
            address: "http://localhost".into(),
            label: "login".into(),
            consumes: vec!["token".into()],
            extracts: vec!["sid 0 1 sid=(\\w+)".into()],
            asserts: vec![LiteralAssert {
                pattern: "Welcome".into(),
                invert: true,
            }],
        }
    }

    #[test]
    fn test_literal_json_keys() {
        let json = serde_json::to_string(&RecordMeta::Literal(literal())).unwrap();
        assert_eq!(
            json,
            r#"{"plen":42,"address":"http://localhost","label":"login","replaces":["token"],"extracts":["sid 0 1 sid=(\\w+)"],"asserts":[{"re":"Welcome","invert":true}]}"#
        );
    }

    #[test]
    fn test_literal_json_omits_empty_lists() {
        let meta = LiteralMeta {
            consumes: vec![],
            extracts: vec![],
            asserts: vec![],
            ..literal()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"plen":42,"address":"http://localhost","label":"login"}"#);
    }

    #[test]
    fn test_indexed_json_keys() {
        let mut table = StringTable::new();
        let meta = IndexedMeta::intern(&literal(), &mut table);
        let json = serde_json::to_string(&RecordMeta::Indexed(meta)).unwrap();

        assert_eq!(json, r#"{"plen":42,"a":1,"l":2,"r":[3],"e":[4],"c":[{"r":5,"n":true}]}"#);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_indexed_resolves_to_literal() {
        let mut table = StringTable::new();
        let meta = IndexedMeta::intern(&literal(), &mut table);
        assert_eq!(meta.resolve(&table), Some(literal()));
        assert_eq!(meta.resolve(&StringTable::new()), None);
    }

    #[test]
    fn test_wire_record_framing() {
        let record = WireRecord {
            meta: RecordMeta::Literal(LiteralMeta {
                payload_len: 5,
                address: "a".into(),
                label: "l".into(),
                consumes: vec![],
                extracts: vec![],
                asserts: vec![],
            }),
            payload: "hello".into(),
        };
        let mut out = Vec::new();
        record.write_to(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"plen\":5,\"address\":\"a\",\"label\":\"l\"}\r\nhello\r\n"
        );
    }
}
