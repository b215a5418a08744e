//! Worker-pool health from the generator's log
//!
//! The generator periodically logs a line such as
//!
//! ```text
//! time="2024-01-01T10:00:00Z" level=info msg="Workers: waiting: 0, working: 5, sleeping: 0, busy: 0, lag: 0s, reqs: 10"
//! ```
//!
//! Only lines containing the `Workers: ` marker carry an update.

use crate::lines::LineBuffer;
use crate::tail::FileTail;
use loadwire_core::HealthSnapshot;
use std::io;
use std::path::PathBuf;

/// Token that marks a status line
pub const HEALTH_MARKER: &str = "Workers: ";

/// Keys expected before each value, in order
const KEYS: [&str; 5] = ["waiting:", "working:", "sleeping:", "busy:", "lag:"];

/// Parse a status line
///
/// Returns `None` for lines without the marker. Returns `Some(Err)` with a
/// reason when the marker is present but the fields are unusable.
pub fn parse_health_line(line: &str) -> Option<Result<HealthSnapshot, String>> {
    if !line.contains(HEALTH_MARKER) {
        return None;
    }
    Some(parse_fields(line))
}

fn parse_fields(line: &str) -> Result<HealthSnapshot, String> {
    // Timestamp and level come first; then `msg="Workers:` and key/value pairs.
    let tokens: Vec<&str> = line.split_whitespace().skip(2).collect();

    let mut values = [""; 5];
    for (i, key) in KEYS.iter().enumerate() {
        let key_pos = 1 + 2 * i;
        match tokens.get(key_pos) {
            Some(found) if found == key => {}
            other => return Err(format!("expected '{key}' at token {key_pos}, found {other:?}")),
        }
        let value = tokens
            .get(key_pos + 1)
            .ok_or_else(|| format!("missing value for '{key}'"))?;
        values[i] = value.trim_end_matches([',', '"']);
    }

    let count = |i: usize| {
        values[i]
            .parse::<u64>()
            .map_err(|e| format!("bad value '{}' for '{}': {e}", values[i], KEYS[i]))
    };

    let lag = values[4];
    if lag.is_empty() {
        return Err("empty lag value".to_string());
    }

    Ok(HealthSnapshot {
        waiting: count(0)?,
        working: count(1)?,
        sleeping: count(2)?,
        busy: count(3)?,
        lag: lag.to_string(),
    })
}

/// Tails the generator log and keeps the latest snapshot
#[derive(Debug)]
pub struct HealthMonitor {
    tail: FileTail,
    lines: LineBuffer,
    snapshot: HealthSnapshot,
    updates: u64,
}

impl HealthMonitor {
    /// Create a monitor over a log file that may not exist yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            tail: FileTail::new(path),
            lines: LineBuffer::new(),
            snapshot: HealthSnapshot::default(),
            updates: 0,
        }
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> &HealthSnapshot {
        &self.snapshot
    }

    /// Number of status lines applied so far
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Apply every complete line appended since the last poll
    pub fn poll(&mut self, final_flush: bool) -> io::Result<&HealthSnapshot> {
        let chunk = self.tail.read_available(final_flush)?;
        let mut lines = self.lines.feed(&chunk);
        if final_flush {
            lines.extend(self.lines.take_fragment());
        }

        for line in &lines {
            self.apply(line);
        }
        Ok(&self.snapshot)
    }

    /// Apply one line; a malformed status line leaves the snapshot untouched
    pub fn apply(&mut self, line: &str) {
        match parse_health_line(line) {
            None => {}
            Some(Ok(snapshot)) => {
                tracing::trace!(?snapshot, "health update");
                self.snapshot = snapshot;
                self.updates += 1;
            }
            Some(Err(reason)) => {
                tracing::warn!(%reason, line, "failed to parse health line");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"time="2024-01-01T10:00:00Z" level=info msg="Workers: waiting: 2, working: 5, sleeping: 1, busy: 7, lag: 20ms, reqs: 10""#;

    #[test]
    fn test_parse_full_line() {
        let snapshot = parse_health_line(LINE).unwrap().unwrap();
        assert_eq!(
            snapshot,
            HealthSnapshot {
                waiting: 2,
                working: 5,
                sleeping: 1,
                busy: 7,
                lag: "20ms".into(),
            }
        );
    }

    #[test]
    fn test_lag_as_last_field() {
        let line = r#"time=x level=info msg="Workers: waiting: 0, working: 1, sleeping: 0, busy: 1, lag: 0s""#;
        assert_eq!(parse_health_line(line).unwrap().unwrap().lag, "0s");
    }

    #[test]
    fn test_line_without_marker() {
        assert!(parse_health_line("time=x level=info msg=\"started\"").is_none());
    }

    #[test]
    fn test_unchanged_without_marker() {
        let mut monitor = HealthMonitor::new("unused.log");
        monitor.apply(LINE);
        let before = monitor.snapshot().clone();

        monitor.apply("time=x level=info msg=\"connection pool resized\"");
        assert_eq!(monitor.snapshot(), &before);
        assert_eq!(monitor.updates(), 1);
    }

    #[test]
    fn test_bad_field_keeps_previous_snapshot() {
        let mut monitor = HealthMonitor::new("unused.log");
        monitor.apply(LINE);
        let before = monitor.snapshot().clone();

        // Only `busy` is broken; no field may change.
        let broken = LINE.replace("busy: 7,", "busy: x,");
        monitor.apply(&broken);
        assert_eq!(monitor.snapshot(), &before);

        let truncated = r#"time=x level=info msg="Workers: waiting: 9, working: 9"#;
        monitor.apply(truncated);
        assert_eq!(monitor.snapshot(), &before);
        assert_eq!(monitor.updates(), 1);
    }

    #[test]
    fn test_poll_reads_log_incrementally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generator.err");
        let mut monitor = HealthMonitor::new(&path);
        assert_eq!(monitor.poll(false).unwrap(), &HealthSnapshot::default());

        std::fs::write(&path, format!("time=x level=info msg=\"starting\"\n{LINE}\n")).unwrap();
        assert_eq!(monitor.poll(false).unwrap().waiting, 2);
    }
}
