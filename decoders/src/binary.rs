//! Fixed-width binary result codec
//!
//! Each record is 74 packed little-endian bytes:
//!
//! ```text
//! u32 start_ts | u16 status | u16 error_idx | u32 concurrency |
//! f64 elapsed | f64 connect | f64 sent | f64 first_byte | f64 read |
//! u32 worker | u16 label_idx | u64 sent_bytes | u64 recv_bytes
//! ```
//!
//! Label and error are indices into the strings side file; 0 means none.

use crate::status::error_for_status;
use crate::strings::StringTableReader;
use crate::tail::FileTail;
use loadwire_core::{DecodeError, ResultDecoder, ResultSample};
use std::path::PathBuf;

/// Size of one record in bytes
pub const RECORD_LEN: usize = 4 + 2 + 2 + 4 + 5 * 8 + 4 + 2 + 8 + 8;

/// One record as laid out on disk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRecord {
    /// Start timestamp, seconds
    pub start_ts: u32,
    /// Response code
    pub status: u16,
    /// Error string index (0 = no error)
    pub error_idx: u16,
    /// Concurrency at start
    pub concurrency: u32,
    /// Total elapsed seconds
    pub elapsed: f64,
    /// Connect seconds
    pub connect: f64,
    /// Send seconds
    pub sent: f64,
    /// First byte seconds
    pub first_byte: f64,
    /// Read seconds
    pub read: f64,
    /// Worker id
    pub worker: u32,
    /// Label string index
    pub label_idx: u16,
    /// Bytes sent
    pub sent_bytes: u64,
    /// Bytes received
    pub recv_bytes: u64,
}

/// Little-endian field reader over one record
struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl FieldReader<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }

    fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.take())
    }
}

impl RawRecord {
    /// Parse one record
    pub fn parse(bytes: &[u8; RECORD_LEN]) -> Self {
        let mut r = FieldReader { buf: bytes, pos: 0 };
        Self {
            start_ts: r.u32(),
            status: r.u16(),
            error_idx: r.u16(),
            concurrency: r.u32(),
            elapsed: r.f64(),
            connect: r.f64(),
            sent: r.f64(),
            first_byte: r.f64(),
            read: r.f64(),
            worker: r.u32(),
            label_idx: r.u16(),
            sent_bytes: r.u64(),
            recv_bytes: r.u64(),
        }
    }

    /// Encode into the on-disk layout
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = Vec::with_capacity(RECORD_LEN);
        out.extend_from_slice(&self.start_ts.to_le_bytes());
        out.extend_from_slice(&self.status.to_le_bytes());
        out.extend_from_slice(&self.error_idx.to_le_bytes());
        out.extend_from_slice(&self.concurrency.to_le_bytes());
        for value in [self.elapsed, self.connect, self.sent, self.first_byte, self.read] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&self.worker.to_le_bytes());
        out.extend_from_slice(&self.label_idx.to_le_bytes());
        out.extend_from_slice(&self.sent_bytes.to_le_bytes());
        out.extend_from_slice(&self.recv_bytes.to_le_bytes());

        let mut bytes = [0u8; RECORD_LEN];
        bytes.copy_from_slice(&out);
        bytes
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Decoder over a binary results file and its strings side file
#[derive(Debug)]
pub struct BinaryDecoder {
    results: FileTail,
    strings: StringTableReader,
    pending: Vec<u8>,
}

impl BinaryDecoder {
    /// Create a decoder; neither file needs to exist yet
    pub fn new(results: impl Into<PathBuf>, strings: impl Into<PathBuf>) -> Self {
        Self {
            results: FileTail::new(results),
            strings: StringTableReader::new(strings),
            pending: Vec::new(),
        }
    }

    /// Resolve a string index; `Ok(None)` means the strings file is behind
    fn lookup(
        strings: &mut StringTableReader,
        index: u16,
        final_flush: bool,
    ) -> Result<Option<String>, DecodeError> {
        let resolved = strings
            .resolve(u32::from(index), final_flush)?
            .map(str::to_string);
        match resolved {
            Some(value) => Ok(Some(value)),
            None if final_flush => Err(DecodeError::UnresolvedString {
                index: u32::from(index),
                path: strings.path().display().to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Build a sample, or `None` if a referenced string is not available yet
    fn to_sample(
        strings: &mut StringTableReader,
        raw: &RawRecord,
        final_flush: bool,
    ) -> Result<Option<ResultSample>, DecodeError> {
        let label = if raw.label_idx == 0 {
            String::new()
        } else {
            match Self::lookup(strings, raw.label_idx, final_flush)? {
                Some(label) => label,
                None => return Ok(None),
            }
        };

        let error = if raw.error_idx == 0 {
            None
        } else {
            match Self::lookup(strings, raw.error_idx, final_flush)? {
                Some(error) => Some(error),
                None => return Ok(None),
            }
        };

        Ok(Some(ResultSample {
            timestamp: u64::from(raw.start_ts),
            label,
            concurrency: raw.concurrency,
            elapsed: raw.elapsed,
            connect: raw.connect,
            first_byte: raw.first_byte,
            send_time: raw.sent,
            receive_time: raw.read,
            response_code: raw.status.to_string(),
            error: error_for_status(raw.status, error),
            bytes: raw.sent_bytes.saturating_add(raw.recv_bytes),
            worker: raw.worker,
        }))
    }
}

impl ResultDecoder for BinaryDecoder {
    fn name(&self) -> &str {
        "bin"
    }

    fn poll(&mut self, final_flush: bool) -> Result<Vec<ResultSample>, DecodeError> {
        let chunk = self.results.read_available(final_flush)?;
        self.pending.extend_from_slice(&chunk);

        let mut samples = Vec::with_capacity(self.pending.len() / RECORD_LEN);
        let mut consumed = 0;
        while let Some(bytes) = self
            .pending
            .get(consumed..consumed + RECORD_LEN)
            .and_then(|slice| <&[u8; RECORD_LEN]>::try_from(slice).ok())
        {
            let raw = RawRecord::parse(bytes);
            match Self::to_sample(&mut self.strings, &raw, final_flush)? {
                Some(sample) => {
                    samples.push(sample);
                    consumed += RECORD_LEN;
                }
                None => {
                    tracing::debug!(
                        label_idx = raw.label_idx,
                        error_idx = raw.error_idx,
                        "strings file behind results, holding record back"
                    );
                    break;
                }
            }
        }
        self.pending.drain(..consumed);

        if final_flush && !self.pending.is_empty() {
            tracing::warn!(
                bytes = self.pending.len(),
                path = %self.results.path().display(),
                "results file ends with a partial record"
            );
        }

        Ok(samples)
    }

    fn pending_bytes(&self) -> usize {
        self.pending.len()
    }
}
