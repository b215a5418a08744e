//! loadwire - scenario compiler and result decoder for an external load generator

use anyhow::Result;
use clap::Parser;

mod cli;
mod runner;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "loadwire starting");

    cli::execute(cli).await
}
