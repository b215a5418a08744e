//! Scenario and load profile types

use crate::fields::Fields;
use crate::request::RequestKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Protocol driver that generates synthetic results without network traffic
pub const SYNTHETIC_DRIVER: &str = "dummy";

/// A compiled-ready scenario
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Base address for requests given as bare paths (`scheme://host[:port]`)
    pub default_address: Option<String>,
    /// When false, every request carries `Connection: close`
    pub keepalive: bool,
    /// Scenario-level headers, applied before request-level headers
    pub headers: Fields,
    /// Runtime variables handed to the generator; their names count as produced
    pub variables: Fields,
    /// Ordered request entries
    pub requests: Vec<RequestKind>,
    /// Protocol driver name
    pub protocol: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// TLS options passed through to the generator untouched
    pub tls_config: serde_yaml::Mapping,
    /// Minimum status code written to the request/response trace (1000 disables it)
    pub trace_level: u16,
    /// Explicit override of the regex-extraction switch
    pub enable_regex: Option<bool>,
    /// Reject scenarios whose records resolve to more than one address
    pub single_target: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            default_address: None,
            keepalive: true,
            headers: Fields::new(),
            variables: Fields::new(),
            requests: Vec::new(),
            protocol: "http".to_string(),
            timeout: Duration::from_secs(10),
            tls_config: serde_yaml::Mapping::new(),
            trace_level: 1000,
            enable_regex: None,
            single_target: false,
        }
    }
}

impl Scenario {
    /// Create a scenario from a list of requests
    pub fn with_requests(requests: impl IntoIterator<Item = impl Into<RequestKind>>) -> Self {
        Self {
            requests: requests.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Set the default address
    pub fn default_address(mut self, address: impl Into<String>) -> Self {
        self.default_address = Some(address.into());
        self
    }

    /// Whether the protocol driver is the synthetic no-op driver
    pub fn is_synthetic(&self) -> bool {
        self.protocol == SYNTHETIC_DRIVER
    }

    /// Whether a request/response trace file should be produced
    pub fn trace_enabled(&self) -> bool {
        self.trace_level < 1000
    }
}

/// Load shape applied by the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LoadProfile {
    /// Target concurrency (also caps connections and workers)
    pub concurrency: u32,
    /// Target throughput in requests per second; switches the generator to open mode
    pub throughput: Option<f64>,
    /// Ramp-up duration
    #[serde(with = "humantime_serde")]
    pub ramp_up: Option<Duration>,
    /// Number of flat steps during ramp-up
    pub steps: Option<u32>,
    /// Duration to hold the final level
    #[serde(with = "humantime_serde")]
    pub hold: Option<Duration>,
    /// Iteration limit over the payload file (0 = unlimited)
    pub iterations: u64,
}

impl Default for LoadProfile {
    fn default() -> Self {
        Self {
            concurrency: 1,
            throughput: None,
            ramp_up: None,
            steps: None,
            hold: None,
            iterations: 0,
        }
    }
}

impl LoadProfile {
    /// The level reached at the end of ramp-up
    pub fn final_level(&self) -> f64 {
        match self.throughput {
            Some(rps) if rps > 0.0 => rps,
            _ => f64::from(self.concurrency),
        }
    }

    /// Whether a target throughput is configured
    pub fn is_open(&self) -> bool {
        matches!(self.throughput, Some(rps) if rps > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestSpec;

    #[test]
    fn test_scenario_defaults() {
        let scenario = Scenario::default();
        assert!(scenario.keepalive);
        assert_eq!(scenario.protocol, "http");
        assert_eq!(scenario.timeout, Duration::from_secs(10));
        assert!(!scenario.trace_enabled());
        assert!(!scenario.is_synthetic());
    }

    #[test]
    fn test_scenario_with_requests() {
        let scenario = Scenario::with_requests([RequestSpec::get("/a"), RequestSpec::get("/b")])
            .default_address("http://localhost:8080");
        assert_eq!(scenario.requests.len(), 2);
        assert_eq!(
            scenario.default_address.as_deref(),
            Some("http://localhost:8080")
        );
    }

    #[test]
    fn test_final_level_prefers_throughput() {
        let mut load = LoadProfile {
            concurrency: 10,
            ..Default::default()
        };
        assert_eq!(load.final_level(), 10.0);
        assert!(!load.is_open());

        load.throughput = Some(250.0);
        assert_eq!(load.final_level(), 250.0);
        assert!(load.is_open());
    }

    #[test]
    fn test_load_profile_from_yaml() {
        let yaml = "concurrency: 20\nramp-up: 1m\nsteps: 4\nhold: 30s\n";
        let load: LoadProfile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(load.concurrency, 20);
        assert_eq!(load.ramp_up, Some(Duration::from_secs(60)));
        assert_eq!(load.steps, Some(4));
        assert_eq!(load.hold, Some(Duration::from_secs(30)));
        assert_eq!(load.iterations, 0);
    }
}
