//! Decoded result samples and worker-pool health snapshots

use serde::{Deserialize, Serialize};

/// One request outcome reported by the load generator
///
/// Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSample {
    /// Request start, whole seconds since the Unix epoch
    pub timestamp: u64,
    /// Request label
    pub label: String,
    /// Generator concurrency when the request started
    pub concurrency: u32,
    /// Total elapsed time
    pub elapsed: f64,
    /// Connection establishment time
    pub connect: f64,
    /// Time to first response byte
    pub first_byte: f64,
    /// Time spent sending the request
    pub send_time: f64,
    /// Time spent reading the response
    pub receive_time: f64,
    /// Response code, as text
    pub response_code: String,
    /// Error message, if the request failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Bytes sent plus bytes received
    pub bytes: u64,
    /// Generator worker that executed the request
    pub worker: u32,
}

impl ResultSample {
    /// Returns true if the sample carries an error
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Latest worker-pool status reported by the generator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Workers waiting for input; nonzero means the schedule outpaces generation
    pub waiting: u64,
    /// Workers executing a request
    pub working: u64,
    /// Workers sleeping until their scheduled start
    pub sleeping: u64,
    /// Workers busy overall
    pub busy: u64,
    /// Average schedule lag, as the generator prints it (e.g. `"0s"`, `"20ms"`)
    pub lag: String,
}

impl HealthSnapshot {
    /// Whether the generator reports back-pressure
    pub fn is_backlogged(&self) -> bool {
        self.waiting > 0
    }

    /// Whether requests start later than scheduled
    pub fn is_lagging(&self) -> bool {
        !self.lag.is_empty() && self.lag != "0s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(error: Option<&str>) -> ResultSample {
        ResultSample {
            timestamp: 1000,
            label: "home".into(),
            concurrency: 5,
            elapsed: 0.25,
            connect: 0.01,
            first_byte: 0.05,
            send_time: 0.001,
            receive_time: 0.02,
            response_code: "200".into(),
            error: error.map(str::to_string),
            bytes: 3000,
            worker: 1,
        }
    }

    #[test]
    fn test_sample_failure() {
        assert!(!sample(None).is_failure());
        assert!(sample(Some("timeout")).is_failure());
    }

    #[test]
    fn test_sample_skips_absent_error() {
        let json = serde_json::to_string(&sample(None)).unwrap();
        assert!(!json.contains("error"));
        assert!(json.contains("\"response_code\":\"200\""));
    }

    #[test]
    fn test_health_flags() {
        let mut snapshot = HealthSnapshot::default();
        assert!(!snapshot.is_backlogged());
        assert!(!snapshot.is_lagging());

        snapshot.waiting = 2;
        snapshot.lag = "30ms".into();
        assert!(snapshot.is_backlogged());
        assert!(snapshot.is_lagging());

        snapshot.lag = "0s".into();
        assert!(!snapshot.is_lagging());
    }
}
