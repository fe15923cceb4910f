//! CLI layer for deep-research.
//!
//! Provides the command-line interface using clap: running a research
//! loop from files, listing supported models, and writing prompt
//! templates.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
