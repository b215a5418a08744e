//! CLI argument parsing and command dispatch

mod commands;

use clap::{Args, Parser, Subcommand};
use loadwire_core::OutputFormat;
use std::path::PathBuf;

pub use commands::execute;

#[derive(Parser)]
#[command(name = "loadwire")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Inputs shared by `compile` and `run`
#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    /// Scenario YAML file
    #[arg(short, long, env = "LOADWIRE_SCENARIO")]
    pub scenario: PathBuf,

    /// Load profile YAML file, replacing the scenario's `load` section
    #[arg(short, long)]
    pub load: Option<PathBuf>,

    /// Directory for payload, config and result files
    #[arg(short, long, default_value = "loadwire-out")]
    pub out_dir: PathBuf,

    /// Result format the generator writes (bin or ldjson)
    #[arg(long, default_value = "bin")]
    pub output_format: OutputFormat,

    /// Keep literal strings in record metadata
    #[arg(long)]
    pub no_intern: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write generator inputs for a scenario
    Compile {
        #[command(flatten)]
        args: CompileArgs,
    },
    /// Compile a scenario, run the generator on it and decode its results
    Run {
        /// Load generator binary
        #[arg(short, long, env = "LOADWIRE_TOOL")]
        tool: PathBuf,

        #[command(flatten)]
        args: CompileArgs,
    },
    /// Print samples from a result file as JSON lines
    Decode {
        /// Result format (bin or ldjson)
        #[arg(short, long)]
        format: OutputFormat,
        /// Result file
        #[arg(short, long)]
        results: PathBuf,
        /// Strings side file (binary format; defaults to the results path with `.ostr`)
        #[arg(short, long)]
        strings: Option<PathBuf>,
    },
    /// Print the latest worker health from a generator log
    Health {
        /// Generator log file
        #[arg(short, long)]
        log: PathBuf,
    },
}
