//! loadwire-compiler: scenario to generator input
//!
//! This crate turns a scenario into the files the external load generator
//! reads:
//!
//! - The payload file: one metadata line plus raw HTTP/1.1 bytes per request
//! - The input string table, when metadata interning is on
//! - The generator's YAML config document
//!
//! # Example
//!
//! ```no_run
//! use loadwire_compiler::{emit, load_run, CompileOptions};
//! use loadwire_core::OutputFormat;
//! use std::path::Path;
//!
//! let (scenario, load) = load_run(Path::new("scenario.yml"))?;
//! let artifacts = emit(&scenario, &load, Path::new("out"), OutputFormat::Binary, CompileOptions::default())?;
//! println!("config at {}", artifacts.config_path.display());
//! # Ok::<(), loadwire_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compile;
pub mod http;
pub mod loader;
pub mod metadata;
pub mod vars;

pub use compile::{CompileOptions, CompiledPayload, PayloadCompiler};
pub use http::{build_request, resolve_target, Target, CONTENT_LENGTH_PLACEHOLDER};
pub use loader::{load_run, parse_request_lines, parse_run};
pub use metadata::{IndexedMeta, LiteralMeta, RecordMeta, WireRecord};

use loadwire_core::{ArtifactPaths, GeneratorConfig, LoadProfile, OutputFormat, Result, Scenario};
use std::path::{Path, PathBuf};

/// File name of the generator config inside the artifact directory
pub const CONFIG_FILE_NAME: &str = "loadwire.yml";

/// Everything written by [`emit`]
#[derive(Debug, Clone)]
pub struct Artifacts {
    /// Paths of payload, strings and result files
    pub paths: ArtifactPaths,
    /// Generator config document
    pub config: GeneratorConfig,
    /// Where the config was written
    pub config_path: PathBuf,
    /// Number of compiled records
    pub records: usize,
}

/// Compile a scenario and write payload, string table and config into `dir`
pub fn emit(
    scenario: &Scenario,
    load: &LoadProfile,
    dir: &Path,
    format: OutputFormat,
    options: CompileOptions,
) -> Result<Artifacts> {
    std::fs::create_dir_all(dir)?;

    let compiled = PayloadCompiler::new(scenario, options).compile()?;
    let paths = ArtifactPaths::in_dir(dir, format, options.intern_strings, scenario.trace_enabled());

    compiled.write_payload(&paths.payload)?;
    if let Some(strings) = &paths.input_strings {
        compiled.write_strings(strings)?;
    }

    let config = GeneratorConfig::build(scenario, load, &paths, format, compiled.uses_regex);
    let config_path = dir.join(CONFIG_FILE_NAME);
    config.write_to(&config_path)?;

    tracing::info!(
        dir = %dir.display(),
        records = compiled.records.len(),
        format = %format,
        "generator inputs written"
    );

    Ok(Artifacts {
        paths,
        config,
        config_path,
        records: compiled.records.len(),
    })
}
