//! Generator configuration document
//!
//! A typed mirror of the YAML file the load generator reads at startup.
//! Field names follow the generator's (lowercased, unseparated) keys.

use crate::error::{Error, Result};
use crate::fields::Fields;
use crate::scenario::{LoadProfile, Scenario};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Result codec the generator writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Fixed-width little-endian records plus a strings side file
    #[default]
    Binary,
    /// One JSON object per line
    Ldjson,
}

impl OutputFormat {
    /// File extension used for the results artifact
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Binary => "bin",
            OutputFormat::Ldjson => "ldjson",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bin" | "binary" => Ok(OutputFormat::Binary),
            "ldjson" => Ok(OutputFormat::Ldjson),
            other => Err(Error::UnsupportedOutput(other.to_string())),
        }
    }
}

/// Generator worker mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerMode {
    /// Requests are scheduled at a target rate
    Open,
    /// A fixed pool of workers loops over the payload
    Closed,
}

/// One segment of the workload schedule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadLevel {
    /// Level at segment start
    #[serde(rename = "levelstart")]
    pub level_start: f64,
    /// Level at segment end
    #[serde(rename = "levelend")]
    pub level_end: f64,
    /// Segment duration
    #[serde(serialize_with = "go_duration")]
    pub duration: Duration,
}

impl WorkloadLevel {
    /// A flat segment
    pub fn flat(level: f64, duration: Duration) -> Self {
        Self {
            level_start: level,
            level_end: level,
            duration,
        }
    }
}

/// Derive the workload schedule from a load profile
///
/// Stepped ramp-up yields `steps` flat segments at `level * i / steps`, with
/// ties rounded to even; plain ramp-up yields one linear segment from 0; hold
/// appends a flat segment at the final level.
pub fn workload_schedule(load: &LoadProfile) -> Vec<WorkloadLevel> {
    let level = load.final_level();
    let mut schedule = Vec::new();

    if let Some(ramp_up) = load.ramp_up.filter(|d| !d.is_zero()) {
        match load.steps.filter(|s| *s > 0) {
            Some(steps) => {
                let step_duration = ramp_up / steps;
                for step in 1..=steps {
                    let step_level =
                        (level * f64::from(step) / f64::from(steps)).round_ties_even();
                    schedule.push(WorkloadLevel::flat(step_level, step_duration));
                }
            }
            None => schedule.push(WorkloadLevel {
                level_start: 0.0,
                level_end: level,
                duration: ramp_up,
            }),
        }
    }

    if let Some(hold) = load.hold.filter(|d| !d.is_zero()) {
        schedule.push(WorkloadLevel::flat(level, hold));
    }

    schedule
}

/// `protocol` section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolSection {
    /// Driver name
    pub driver: String,
    /// Per-request timeout
    #[serde(serialize_with = "go_duration")]
    pub timeout: Duration,
    /// Connection pool size
    #[serde(rename = "maxconnections")]
    pub max_connections: u32,
    /// TLS options, passed through
    #[serde(rename = "tlsconf")]
    pub tls_conf: serde_yaml::Mapping,
}

/// `input` section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSection {
    /// Compiled payload file
    #[serde(rename = "payloadfile")]
    pub payload_file: PathBuf,
    /// String table for interned metadata; empty when interning is off
    #[serde(rename = "stringsfile", serialize_with = "optional_path")]
    pub strings_file: Option<PathBuf>,
    /// Iteration limit (0 = unlimited)
    #[serde(rename = "iterationlimit")]
    pub iteration_limit: u64,
    /// Whether extraction regexes must be evaluated
    #[serde(rename = "enableregexes")]
    pub enable_regexes: bool,
}

/// `output` section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSection {
    /// Request/response trace file; empty when tracing is off
    #[serde(rename = "reqrespfile", serialize_with = "optional_path")]
    pub trace_file: Option<PathBuf>,
    /// Minimum status written to the trace
    #[serde(rename = "reqrespfilelevel")]
    pub trace_level: u16,
    /// Binary results file
    #[serde(rename = "binaryfile", skip_serializing_if = "Option::is_none")]
    pub binary_file: Option<PathBuf>,
    /// Strings side file for binary results
    #[serde(rename = "stringsfile", skip_serializing_if = "Option::is_none")]
    pub strings_file: Option<PathBuf>,
    /// Line-delimited JSON results file
    #[serde(rename = "ldjsonfile", skip_serializing_if = "Option::is_none")]
    pub ldjson_file: Option<PathBuf>,
}

/// `workers` section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkersSection {
    /// Open or closed workload
    pub mode: WorkerMode,
    /// Ordered level segments
    #[serde(rename = "workloadschedule")]
    pub workload_schedule: Vec<WorkloadLevel>,
    /// Worker cap
    #[serde(rename = "maxworkers")]
    pub max_workers: u32,
    /// Named runtime variable values
    pub values: Fields,
}

/// Complete generator configuration document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratorConfig {
    /// Protocol options
    pub protocol: ProtocolSection,
    /// Input files
    pub input: InputSection,
    /// Output files
    pub output: OutputSection,
    /// Worker scheduling
    pub workers: WorkersSection,
}

/// Artifact paths the config points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Compiled payload
    pub payload: PathBuf,
    /// Input string table, when interning is on
    pub input_strings: Option<PathBuf>,
    /// Result file
    pub results: PathBuf,
    /// Output strings side file (binary codec only)
    pub output_strings: Option<PathBuf>,
    /// Request/response trace, when enabled
    pub trace: Option<PathBuf>,
}

impl ArtifactPaths {
    /// Standard artifact names inside a directory
    pub fn in_dir(dir: &Path, format: OutputFormat, intern: bool, trace: bool) -> Self {
        Self {
            payload: dir.join("payload.inp"),
            input_strings: intern.then(|| dir.join("payload.istr")),
            results: dir.join(format!("results.{}", format.extension())),
            output_strings: (format == OutputFormat::Binary).then(|| dir.join("results.ostr")),
            trace: trace.then(|| dir.join("trace.txt")),
        }
    }
}

impl GeneratorConfig {
    /// Assemble the config document for a compiled scenario
    pub fn build(
        scenario: &Scenario,
        load: &LoadProfile,
        paths: &ArtifactPaths,
        format: OutputFormat,
        enable_regexes: bool,
    ) -> Self {
        let (binary_file, strings_file, ldjson_file) = match format {
            OutputFormat::Binary => (
                Some(paths.results.clone()),
                paths.output_strings.clone(),
                None,
            ),
            OutputFormat::Ldjson => (None, None, Some(paths.results.clone())),
        };

        let schedule = workload_schedule(load);
        let mode = if load.is_open() {
            WorkerMode::Open
        } else {
            WorkerMode::Closed
        };
        tracing::debug!(?mode, segments = schedule.len(), %format, "generator config assembled");

        Self {
            protocol: ProtocolSection {
                driver: scenario.protocol.clone(),
                timeout: scenario.timeout,
                max_connections: load.concurrency,
                tls_conf: scenario.tls_config.clone(),
            },
            input: InputSection {
                payload_file: paths.payload.clone(),
                strings_file: paths.input_strings.clone(),
                iteration_limit: load.iterations,
                enable_regexes,
            },
            output: OutputSection {
                trace_file: paths.trace.clone(),
                trace_level: scenario.trace_level,
                binary_file,
                strings_file,
                ldjson_file,
            },
            workers: WorkersSection {
                mode,
                workload_schedule: schedule,
                max_workers: load.concurrency,
                values: scenario.variables.clone(),
            },
        }
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the YAML document to a file
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}

/// Durations in the generator's syntax: seconds with millisecond precision
fn go_duration<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.3}s", duration.as_secs_f64()))
}

/// The generator treats an empty string as "not configured"
fn optional_path<S: Serializer>(
    path: &Option<PathBuf>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match path {
        Some(path) => serializer.serialize_str(&path.to_string_lossy()),
        None => serializer.serialize_str(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Option<Duration> {
        Some(Duration::from_secs(s))
    }

    #[test]
    fn test_schedule_stepped_ramp_up() {
        let load = LoadProfile {
            concurrency: 10,
            ramp_up: secs(30),
            steps: Some(3),
            hold: secs(60),
            ..Default::default()
        };
        let schedule = workload_schedule(&load);

        assert_eq!(
            schedule,
            vec![
                WorkloadLevel::flat(3.0, Duration::from_secs(10)),
                WorkloadLevel::flat(7.0, Duration::from_secs(10)),
                WorkloadLevel::flat(10.0, Duration::from_secs(10)),
                WorkloadLevel::flat(10.0, Duration::from_secs(60)),
            ]
        );
    }

    #[test]
    fn test_schedule_step_levels_round_half_to_even() {
        let load = LoadProfile {
            concurrency: 10,
            ramp_up: secs(40),
            steps: Some(4),
            ..Default::default()
        };
        let levels: Vec<f64> = workload_schedule(&load)
            .iter()
            .map(|segment| segment.level_start)
            .collect();

        assert_eq!(levels, vec![2.0, 5.0, 8.0, 10.0]);
    }

    #[test]
    fn test_schedule_linear_ramp_up_uses_throughput() {
        let load = LoadProfile {
            concurrency: 5,
            throughput: Some(100.0),
            ramp_up: secs(20),
            ..Default::default()
        };
        let schedule = workload_schedule(&load);

        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].level_start, 0.0);
        assert_eq!(schedule[0].level_end, 100.0);
        assert_eq!(schedule[0].duration, Duration::from_secs(20));
    }

    #[test]
    fn test_schedule_empty_without_durations() {
        assert!(workload_schedule(&LoadProfile::default()).is_empty());
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("bin".parse::<OutputFormat>().unwrap(), OutputFormat::Binary);
        assert_eq!(
            "ldjson".parse::<OutputFormat>().unwrap(),
            OutputFormat::Ldjson
        );
        assert!(matches!(
            "csv".parse::<OutputFormat>(),
            Err(Error::UnsupportedOutput(f)) if f == "csv"
        ));
    }

    #[test]
    fn test_config_yaml_binary() {
        let scenario = Scenario::default();
        let load = LoadProfile {
            concurrency: 4,
            hold: secs(5),
            ..Default::default()
        };
        let dir = Path::new("/tmp/run");
        let paths = ArtifactPaths::in_dir(dir, OutputFormat::Binary, true, false);
        let config = GeneratorConfig::build(&scenario, &load, &paths, OutputFormat::Binary, false);
        let yaml = config.to_yaml().unwrap();

        assert!(yaml.contains("driver: http"));
        assert!(yaml.contains("timeout: 10.000s"));
        assert!(yaml.contains("maxconnections: 4"));
        assert!(yaml.contains("payloadfile: /tmp/run/payload.inp"));
        assert!(yaml.contains("stringsfile: /tmp/run/payload.istr"));
        assert!(yaml.contains("binaryfile: /tmp/run/results.bin"));
        assert!(yaml.contains("stringsfile: /tmp/run/results.ostr"));
        assert!(yaml.contains("reqrespfile: ''"));
        assert!(yaml.contains("mode: closed"));
        assert!(yaml.contains("duration: 5.000s"));
        assert!(!yaml.contains("ldjsonfile"));
    }

    #[test]
    fn test_config_open_mode_ldjson() {
        let scenario = Scenario::default();
        let load = LoadProfile {
            concurrency: 2,
            throughput: Some(50.0),
            ..Default::default()
        };
        let paths = ArtifactPaths::in_dir(Path::new("out"), OutputFormat::Ldjson, false, false);
        let config = GeneratorConfig::build(&scenario, &load, &paths, OutputFormat::Ldjson, true);

        assert_eq!(config.workers.mode, WorkerMode::Open);
        assert_eq!(config.output.ldjson_file, Some(PathBuf::from("out/results.ldjson")));
        assert!(config.output.binary_file.is_none());
        assert!(config.input.strings_file.is_none());
        assert!(config.input.enable_regexes);
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path(), OutputFormat::Binary, true, true);
        let config = GeneratorConfig::build(
            &Scenario::default(),
            &LoadProfile::default(),
            &paths,
            OutputFormat::Binary,
            false,
        );
        let target = dir.path().join("loadwire.yml");
        config.write_to(&target).unwrap();

        let written = std::fs::read_to_string(&target).unwrap();
        assert_eq!(written, config.to_yaml().unwrap());
        assert!(written.contains("trace.txt"));
    }
}
