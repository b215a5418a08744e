//! Incremental reader for the generator's output string table

use crate::lines::LineBuffer;
use crate::tail::FileTail;
use std::io;
use std::path::{Path, PathBuf};

/// Lazily loaded, append-only view of a strings side file
///
/// Entries are 1-based by line order. The file is only read further when an
/// index beyond the currently loaded entries is requested.
#[derive(Debug)]
pub struct StringTableReader {
    tail: FileTail,
    lines: LineBuffer,
    entries: Vec<String>,
    warned: bool,
}

impl StringTableReader {
    /// Create a reader over `path`; the file may not exist yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            tail: FileTail::new(path),
            lines: LineBuffer::new(),
            entries: Vec::new(),
            warned: false,
        }
    }

    /// Path of the strings file being read
    pub fn path(&self) -> &Path {
        self.tail.path()
    }

    /// Look up a 1-based index, reading more of the file if needed
    ///
    /// Returns `Ok(None)` if the index is 0 or not written yet. With
    /// `final_flush`, an unterminated last line counts as an entry.
    pub fn resolve(&mut self, index: u32, final_flush: bool) -> io::Result<Option<&str>> {
        let Some(position) = (index as usize).checked_sub(1) else {
            return Ok(None);
        };

        while position >= self.entries.len() {
            let chunk = self.tail.read_available(final_flush)?;
            if chunk.is_empty() {
                break;
            }
            let lines = self.lines.feed(&chunk);
            if !lines.is_empty() {
                self.warned = false;
            }
            self.entries.extend(lines);
        }

        if position >= self.entries.len() && self.lines.pending_len() > 0 {
            if final_flush {
                self.entries.extend(self.lines.take_fragment());
                self.warned = false;
            } else if !self.warned {
                tracing::warn!(
                    path = %self.tail.path().display(),
                    bytes = self.lines.pending_len(),
                    "strings file ends with an unterminated line"
                );
                self.warned = true;
            }
        }

        Ok(self.entries.get(position).map(String::as_str))
    }
}
