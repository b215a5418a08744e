//! Line-delimited JSON result codec
//!
//! One object per line. Durations are nanoseconds; `StartTS` is seconds.
//! A line that is not a JSON object is skipped with a warning. An object
//! without the core timing fields means the stream itself is broken, and
//! decoding stops.

use crate::lines::LineBuffer;
use crate::status::error_for_status;
use crate::tail::FileTail;
use loadwire_core::{DecodeError, ResultDecoder, ResultSample};
use serde_json::{Map, Value};
use std::path::PathBuf;

const NANOS_PER_SEC: f64 = 1e9;

/// Typed access to one decoded record object
struct Record<'a> {
    fields: &'a Map<String, Value>,
    line: &'a str,
}

impl Record<'_> {
    /// Mandatory number; absence is stream corruption
    fn required(&self, field: &'static str) -> Result<f64, DecodeError> {
        self.fields
            .get(field)
            .and_then(Value::as_f64)
            .ok_or_else(|| DecodeError::MissingField {
                field,
                record: self.line.to_string(),
            })
    }

    /// Optional number, 0 when absent or null
    fn number(&self, field: &str) -> Result<f64, DecodeError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(0.0),
            Some(value) => value.as_f64().ok_or_else(|| self.wrong_type(field, "a number")),
        }
    }

    /// Optional unsigned integer, 0 when absent or null
    fn unsigned(&self, field: &str) -> Result<u64, DecodeError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(0),
            Some(value) => value
                .as_u64()
                .ok_or_else(|| self.wrong_type(field, "an unsigned integer")),
        }
    }

    /// Optional string, `None` when absent, null or empty
    fn text(&self, field: &str) -> Result<Option<String>, DecodeError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.wrong_type(field, "a string")),
        }
    }

    fn wrong_type(&self, field: &str, expected: &str) -> DecodeError {
        DecodeError::Corrupt(format!("field '{field}' is not {expected}: {}", self.line))
    }

    fn to_sample(&self) -> Result<ResultSample, DecodeError> {
        let elapsed = self.required("Elapsed")?;
        let first_byte = self.required("FirstByteTime")?;
        let connect = self.required("ConnectTime")?;

        let status = self.unsigned("Status")?;
        let status = u16::try_from(status)
            .map_err(|_| DecodeError::Corrupt(format!("status {status} out of range: {}", self.line)))?;

        Ok(ResultSample {
            timestamp: self.number("StartTS")?.trunc() as u64,
            label: self.text("Label")?.unwrap_or_default(),
            concurrency: self.unsigned("Concurrency")? as u32,
            elapsed: elapsed / NANOS_PER_SEC,
            connect: connect / NANOS_PER_SEC,
            first_byte: first_byte / NANOS_PER_SEC,
            send_time: self.number("SentTime")? / NANOS_PER_SEC,
            receive_time: self.number("ReadTime")? / NANOS_PER_SEC,
            response_code: status.to_string(),
            error: error_for_status(status, self.text("ErrorStr")?),
            bytes: self
                .unsigned("SentBytesCount")?
                .saturating_add(self.unsigned("RespBytesCount")?),
            worker: self.unsigned("Worker")? as u32,
        })
    }
}

/// Decode one complete line
///
/// `Ok(None)` means the line was skipped.
pub fn decode_line(line: &str) -> Result<Option<ResultSample>, DecodeError> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, line, "failed to decode JSON line, skipping");
            return Ok(None);
        }
    };
    let Some(fields) = value.as_object() else {
        tracing::warn!(line, "result line is not a JSON object, skipping");
        return Ok(None);
    };

    Record { fields, line }.to_sample().map(Some)
}

/// Decoder over an LDJSON results file
#[derive(Debug)]
pub struct LdjsonDecoder {
    results: FileTail,
    lines: LineBuffer,
}

impl LdjsonDecoder {
    /// Create a decoder; the file need not exist yet
    pub fn new(results: impl Into<PathBuf>) -> Self {
        Self {
            results: FileTail::new(results),
            lines: LineBuffer::new(),
        }
    }
}

impl ResultDecoder for LdjsonDecoder {
    fn name(&self) -> &str {
        "ldjson"
    }

    fn poll(&mut self, final_flush: bool) -> Result<Vec<ResultSample>, DecodeError> {
        let chunk = self.results.read_available(final_flush)?;
        let mut lines = self.lines.feed(&chunk);
        if final_flush {
            lines.extend(self.lines.take_fragment());
        }

        let mut samples = Vec::with_capacity(lines.len());
        for line in &lines {
            if let Some(sample) = decode_line(line)? {
                samples.push(sample);
            }
        }
        Ok(samples)
    }

    fn pending_bytes(&self) -> usize {
        self.lines.pending_len()
    }
}
