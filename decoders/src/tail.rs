//! Bounded reads from a file another process is still writing

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Maximum bytes read per non-final poll (1MB)
pub const MAX_READ_PER_POLL: u64 = 1024 * 1024;

/// Read cursor over an append-only file
///
/// The file is opened lazily, so a tail can be created before the writer
/// has produced anything.
#[derive(Debug)]
pub struct FileTail {
    path: PathBuf,
    file: Option<File>,
    offset: u64,
}

impl FileTail {
    /// Create a tail; nothing is opened until the first read
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            offset: 0,
        }
    }

    /// Path being tailed
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read whatever was appended since the last call
    ///
    /// Reads at most [`MAX_READ_PER_POLL`] bytes unless `to_eof` is set.
    /// A file that does not exist yet reads as empty.
    pub fn read_available(&mut self, to_eof: bool) -> io::Result<Vec<u8>> {
        if self.file.is_none() {
            match File::open(&self.path) {
                Ok(file) => {
                    tracing::debug!(path = %self.path.display(), "opened file for tailing");
                    self.file = Some(file);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e),
            }
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(Vec::new());
        };

        let mut buf = Vec::new();
        if to_eof {
            file.read_to_end(&mut buf)?;
        } else {
            file.take(MAX_READ_PER_POLL).read_to_end(&mut buf)?;
        }
        self.offset += buf.len() as u64;
        if !to_eof && buf.len() as u64 == MAX_READ_PER_POLL {
            tracing::debug!(
                path = %self.path.display(),
                offset = self.offset,
                "read limit reached, rest deferred to next poll"
            );
        }
        Ok(buf)
    }
}
