//! Command handlers

use super::{Cli, Commands, CompileArgs};
use crate::runner::RunController;
use anyhow::{Context, Result};
use loadwire_compiler::{emit, load_run, Artifacts, CompileOptions};
use loadwire_core::{LoadProfile, OutputFormat};
use loadwire_decoders::{open_decoder, HealthMonitor};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Run the parsed command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Compile { args } => {
            let artifacts = compile(&args)?;
            println!("{}", artifacts.config_path.display());
            Ok(())
        }
        Commands::Run { tool, args } => {
            let artifacts = compile(&args)?;
            let controller = RunController::new(tool, artifacts, args.output_format);
            tracing::info!(health_log = %controller.health_log().display(), "generator log");
            let summary = controller.run().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Decode {
            format,
            results,
            strings,
        } => decode(format, &results, strings),
        Commands::Health { log } => {
            let mut monitor = HealthMonitor::new(&log);
            let snapshot = monitor
                .poll(true)
                .with_context(|| format!("reading {}", log.display()))?
                .clone();
            if monitor.updates() == 0 {
                tracing::warn!(log = %log.display(), "no worker status lines found");
            }
            println!("{}", serde_json::to_string(&snapshot)?);
            Ok(())
        }
    }
}

fn load_profile(path: &Path) -> Result<LoadProfile> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn compile(args: &CompileArgs) -> Result<Artifacts> {
    let (scenario, mut load) = load_run(&args.scenario)
        .with_context(|| format!("loading scenario {}", args.scenario.display()))?;
    if let Some(path) = &args.load {
        load = load_profile(path)?;
    }

    let options = CompileOptions {
        intern_strings: !args.no_intern,
    };
    let artifacts = emit(&scenario, &load, &args.out_dir, args.output_format, options)
        .context("compiling scenario")?;
    Ok(artifacts)
}

fn decode(format: OutputFormat, results: &Path, strings: Option<PathBuf>) -> Result<()> {
    let mut decoder = open_decoder(format, results, strings)?;
    let samples = decoder
        .poll(true)
        .with_context(|| format!("decoding {}", results.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for sample in &samples {
        serde_json::to_writer(&mut out, sample)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    tracing::info!(samples = samples.len(), "decode finished");
    Ok(())
}
