//! deep-research binary.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use deep_research::cli::{Cli, execute};
use tracing_subscriber::EnvFilter;

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let output = execute(&cli)?;
    io::stdout()
        .lock()
        .write_all(output.as_bytes())
        .context("failed to write to stdout")
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = writeln!(io::stderr(), "Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
