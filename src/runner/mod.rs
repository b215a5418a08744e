//! Run controller
//!
//! Launches the load generator on emitted artifacts and drives the decoders
//! on a fixed tick until the process exits.

mod overload;
mod summary;

pub use overload::OverloadDetector;
pub use summary::RunSummary;

use loadwire_compiler::Artifacts;
use loadwire_core::{DecodeError, OutputFormat, ResultDecoder};
use loadwire_decoders::{open_decoder, HealthMonitor};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};

/// Interval between liveness and decode polls
pub const TICK: Duration = Duration::from_secs(1);

/// Bytes of stdout/stderr kept for failure diagnostics
const DIAGNOSTIC_TAIL: u64 = 4 * 1024;

/// Errors that end a run
#[derive(Error, Debug)]
pub enum RunError {
    /// The generator exited unsuccessfully
    #[error("{tool} exited with {status}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}")]
    ProcessFailed {
        /// Generator binary
        tool: String,
        /// Exit status
        status: ExitStatus,
        /// Last bytes of stdout
        stdout: String,
        /// Last bytes of stderr
        stderr: String,
    },

    /// The result stream is corrupt; the generator was stopped
    #[error("decoding results failed: {0}")]
    Decode(#[from] DecodeError),

    /// Interrupted by Ctrl+C; the generator was stopped
    #[error("run interrupted")]
    Interrupted,

    /// Setup errors
    #[error(transparent)]
    Setup(#[from] loadwire_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Last `limit` bytes of a file, lossily decoded and trimmed
fn file_tail(path: &Path, limit: u64) -> String {
    let read = || -> io::Result<String> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        file.seek(SeekFrom::Start(len.saturating_sub(limit)))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).trim().to_string())
    };
    read().unwrap_or_else(|e| format!("<unavailable: {e}>"))
}

/// Drives one generator process
pub struct RunController {
    tool: PathBuf,
    artifacts: Artifacts,
    format: OutputFormat,
    stdout_path: PathBuf,
    stderr_path: PathBuf,
}

impl RunController {
    /// Create a controller for emitted artifacts
    ///
    /// Generator stdout and stderr are written next to the config; stderr
    /// doubles as the health log.
    pub fn new(tool: impl Into<PathBuf>, artifacts: Artifacts, format: OutputFormat) -> Self {
        let dir = artifacts
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            tool: tool.into(),
            artifacts,
            format,
            stdout_path: dir.join("generator.out"),
            stderr_path: dir.join("generator.err"),
        }
    }

    /// Health log path
    pub fn health_log(&self) -> &Path {
        &self.stderr_path
    }

    fn spawn(&self) -> Result<Child, RunError> {
        tracing::info!(
            tool = %self.tool.display(),
            config = %self.artifacts.config_path.display(),
            "starting load generator"
        );
        let stdout = File::create(&self.stdout_path)?;
        let stderr = File::create(&self.stderr_path)?;
        let child = Command::new(&self.tool)
            .arg(&self.artifacts.config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()?;
        Ok(child)
    }

    /// Run the generator to completion
    pub async fn run(self) -> Result<RunSummary, RunError> {
        let mut decoder = open_decoder(
            self.format,
            &self.artifacts.paths.results,
            self.artifacts.paths.output_strings.clone(),
        )?;
        let mut health = HealthMonitor::new(&self.stderr_path);
        let mut detector = OverloadDetector::default();
        let mut summary = RunSummary::default();

        let mut child = self.spawn()?;
        let mut ticker = tokio::time::interval(TICK);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let status = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(status) = child.try_wait()? {
                        break status;
                    }
                    if let Err(e) = self.tick_once(decoder.as_mut(), &mut health, &mut detector, &mut summary) {
                        tracing::error!(error = %e, "stopping load generator");
                        stop(&mut child).await;
                        return Err(e);
                    }
                }
                signal = &mut ctrl_c => {
                    if let Err(e) = signal {
                        tracing::error!(error = %e, "failed to listen for Ctrl+C");
                    }
                    tracing::info!("received Ctrl+C, stopping load generator");
                    stop(&mut child).await;
                    return Err(RunError::Interrupted);
                }
            }
        };

        tracing::info!(%status, "load generator exited");

        if !status.success() {
            // Flush what was written for the log, but the exit status wins.
            match decoder.poll(true) {
                Ok(samples) => summary.extend(&samples),
                Err(e) => tracing::warn!(error = %e, "final decode after failed run"),
            }
            if let Err(e) = health.poll(true) {
                tracing::warn!(error = %e, "final health read after failed run");
            }
            tracing::debug!(samples = summary.samples, "results before failure");
            return Err(RunError::ProcessFailed {
                tool: self.tool.display().to_string(),
                status,
                stdout: file_tail(&self.stdout_path, DIAGNOSTIC_TAIL),
                stderr: file_tail(&self.stderr_path, DIAGNOSTIC_TAIL),
            });
        }

        summary.extend(&decoder.poll(true)?);
        summary.health = health.poll(true)?.clone();
        summary.finish();

        tracing::info!(
            samples = summary.samples,
            failures = summary.failures,
            bytes = summary.bytes,
            failure_rate = summary.failure_rate(),
            mean_elapsed = summary.mean_elapsed(),
            "run completed"
        );
        Ok(summary)
    }

    fn tick_once(
        &self,
        decoder: &mut dyn ResultDecoder,
        health: &mut HealthMonitor,
        detector: &mut OverloadDetector,
        summary: &mut RunSummary,
    ) -> Result<(), RunError> {
        let snapshot = health.poll(false)?;
        if detector.observe(snapshot) {
            tracing::warn!(
                waiting = snapshot.waiting,
                polls = detector.streak(),
                "load generator has workers waiting for input, is it overloaded?"
            );
        }
        if snapshot.is_lagging() {
            tracing::debug!(lag = %snapshot.lag, "requests start behind schedule");
        }
        tracing::debug!(
            waiting = snapshot.waiting,
            busy = snapshot.busy,
            sleeping = snapshot.sleeping,
            lag = %snapshot.lag,
            "generator health"
        );
        summary.health = snapshot.clone();

        let samples = decoder.poll(false)?;
        if !samples.is_empty() {
            tracing::debug!(
                codec = decoder.name(),
                samples = samples.len(),
                pending = decoder.pending_bytes(),
                "decoded results"
            );
        }
        summary.extend(&samples);
        Ok(())
    }
}

async fn stop(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "failed to kill load generator");
    }
}

impl std::fmt::Debug for RunController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunController")
            .field("tool", &self.tool)
            .field("config", &self.artifacts.config_path)
            .field("format", &self.format)
            .finish()
    }
}

#[cfg(test)]
mod tests;
