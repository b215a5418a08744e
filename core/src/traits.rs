//! Core traits for result decoders
//!
//! Defined in core so the run controller can hold any codec behind one
//! interface. Implementations live in loadwire-decoders.

use crate::sample::ResultSample;

// ============================================================================
// Result Decoder Trait
// ============================================================================

/// Incremental decoder over a result file that another process appends to
///
/// Each call is a bounded, non-blocking read of whatever is on disk right now.
/// Incomplete units stay buffered for the next call.
pub trait ResultDecoder: Send {
    /// Codec name for logs (e.g. `"bin"`, `"ldjson"`)
    fn name(&self) -> &str;

    /// Decode every complete record currently available
    ///
    /// With `final_flush` set, data normally held back as a possible fragment
    /// is consumed as well. Returns an empty vector when nothing is complete.
    fn poll(&mut self, final_flush: bool) -> Result<Vec<ResultSample>, DecodeError>;

    /// Number of bytes read but not yet turned into samples
    fn pending_bytes(&self) -> usize;
}

/// Fatal decode-pipeline errors
///
/// Recoverable problems (one malformed line) are logged and skipped inside the
/// decoder and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// A structurally valid record lacks a mandatory numeric field
    #[error("result stream corrupted: record lacks numeric field '{field}': {record}")]
    MissingField {
        /// Missing field name
        field: &'static str,
        /// Offending record text
        record: String,
    },

    /// A record object whose fields have unexpected types
    #[error("result stream corrupted: {0}")]
    Corrupt(String),

    /// A string index that the strings file never provided
    #[error("string #{index} not found in {path}")]
    UnresolvedString {
        /// 1-based index
        index: u32,
        /// Strings file path
        path: String,
    },

    /// IO error while reading a result or strings file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
