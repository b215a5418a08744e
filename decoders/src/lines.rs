//! Newline framing over appended byte chunks

/// Fragment size above which a warning is logged once (1MB)
const FRAGMENT_WARN_SIZE: usize = 1024 * 1024;

/// Splits appended bytes into complete lines
///
/// Bytes after the last `\n` are a fragment and stay buffered until a later
/// chunk terminates them. Fragments are never dropped, only reported when
/// they grow suspiciously large.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    warned: bool,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every line they complete, without terminators
    ///
    /// Both `\n` and `\r\n` endings are accepted.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            if self.pending.len() > FRAGMENT_WARN_SIZE && !self.warned {
                tracing::warn!(
                    bytes = self.pending.len(),
                    "unterminated line exceeds {} bytes, still buffering",
                    FRAGMENT_WARN_SIZE
                );
                self.warned = true;
            }
            return Vec::new();
        };

        let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
        self.warned = false;

        complete[..last_newline]
            .split(|&b| b == b'\n')
            .map(decode_line)
            .collect()
    }

    /// Take the buffered fragment, if any
    pub fn take_fragment(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let fragment = std::mem::take(&mut self.pending);
        self.warned = false;
        Some(decode_line(&fragment))
    }

    /// Bytes held as a fragment
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
