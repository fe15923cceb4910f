//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Self-grading deep-research controller.
///
/// Works a question through a tool-using reasoning model, scores every
/// answer with an independent judge, and revises until the answer passes.
#[derive(Parser, Debug)]
#[command(name = "deep-research")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a question read from a file and write the final answer.
    ///
    /// Model roles, keys and limits come from the environment
    /// (`RESEARCH_*`, `<SERVICE>_API_KEY`); flags override the answering
    /// model and the loop settings.
    #[command(after_help = r#"Examples:
  deep-research run --input question.txt --output answer.md
  deep-research run -i q.txt -o a.md --transcript steps.log
  deep-research run -i q.txt -o a.md --service deepseek --model deepseek-reasoner --expansion
  deep-research --format json run -i q.txt -o a.md | jq '.termination'
"#)]
    Run {
        /// File holding the question.
        #[arg(short, long)]
        input: PathBuf,

        /// File the final answer is written to.
        #[arg(short, long)]
        output: PathBuf,

        /// File intermediate steps are appended to (cleared first).
        #[arg(short, long)]
        transcript: Option<PathBuf>,

        /// Optional persona prompt file used as the first user turn.
        #[arg(long)]
        seed: Option<PathBuf>,

        /// Service for the answering model.
        #[arg(long)]
        service: Option<String>,

        /// Answering model.
        #[arg(short, long)]
        model: Option<String>,

        /// Passing judge rating (0.0-1.0).
        #[arg(long)]
        threshold: Option<f64>,

        /// Maximum answering-model calls.
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Research open questions found in hidden reasoning.
        #[arg(long)]
        expansion: bool,

        /// Ask the model to re-answer before each answer is scored.
        #[arg(long)]
        test_time_scaling: bool,

        /// Directory containing prompt template overrides.
        #[arg(long, env = "RESEARCH_PROMPT_DIR")]
        prompt_dir: Option<PathBuf>,
    },

    /// List every supported (service, model) pair.
    Models,

    /// Write default prompt templates to a directory for customization.
    ///
    /// Existing files are never overwritten.
    #[command(name = "init-prompts")]
    #[command(after_help = r#"Examples:
  deep-research init-prompts                    # Write to ~/.config/deep-research/prompts/
  deep-research init-prompts --dir ./prompts    # Write to custom directory
"#)]
    InitPrompts {
        /// Target directory for prompt templates.
        ///
        /// Defaults to `~/.config/deep-research/prompts/`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}
