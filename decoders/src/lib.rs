//! loadwire-decoders: incremental readers for generator output
//!
//! The load generator appends to its result, strings and log files while
//! running. Everything here is poll-driven: each call reads what is on disk
//! right now, returns what is complete, and keeps any partial tail buffered.
//!
//! # Codecs
//!
//! - [`BinaryDecoder`]: fixed 74-byte little-endian records plus a strings side file
//! - [`LdjsonDecoder`]: one JSON object per line
//!
//! # Example
//!
//! ```no_run
//! use loadwire_core::OutputFormat;
//! use loadwire_decoders::open_decoder;
//!
//! let mut decoder = open_decoder(OutputFormat::Ldjson, "out/results.ldjson", None)?;
//! for sample in decoder.poll(false)? {
//!     println!("{} {}", sample.label, sample.elapsed);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binary;
pub mod health;
pub mod ldjson;
pub mod lines;
pub mod status;
pub mod strings;
pub mod tail;

pub use binary::{BinaryDecoder, RawRecord, RECORD_LEN};
pub use health::{parse_health_line, HealthMonitor, HEALTH_MARKER};
pub use ldjson::LdjsonDecoder;
pub use lines::LineBuffer;
pub use strings::StringTableReader;
pub use tail::{FileTail, MAX_READ_PER_POLL};

use loadwire_core::{Error, OutputFormat, ResultDecoder, Result};
use std::path::{Path, PathBuf};

/// Create the decoder for a result format
///
/// The binary codec needs the strings side file; without one it falls back
/// to the results path with an `.ostr` extension.
pub fn open_decoder(
    format: OutputFormat,
    results: impl AsRef<Path>,
    strings: Option<PathBuf>,
) -> Result<Box<dyn ResultDecoder>> {
    let results = results.as_ref();
    tracing::debug!(%format, path = %results.display(), "opening result decoder");

    match format {
        OutputFormat::Binary => {
            let strings = strings.unwrap_or_else(|| results.with_extension("ostr"));
            Ok(Box::new(BinaryDecoder::new(results, strings)))
        }
        OutputFormat::Ldjson => {
            if strings.is_some() {
                return Err(Error::config("the ldjson format has no strings file"));
            }
            Ok(Box::new(LdjsonDecoder::new(results)))
        }
    }
}
