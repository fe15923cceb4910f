//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::agent::config::{ModelRole, ResearchConfig};
use crate::agent::orchestrator::Orchestrator;
use crate::agent::prompt::PromptSet;
use crate::agent::transcript::{TranscriptKind, TranscriptSink};
use crate::cli::output::{OutputFormat, format_models, format_outcome};
use crate::cli::parser::{Cli, Commands};
use crate::error::{CommandError, Result};

/// Parameters for the run command.
#[derive(Debug, Clone)]
pub struct RunParams<'a> {
    /// File holding the question.
    pub input: &'a Path,
    /// File the final answer is written to.
    pub output: &'a Path,
    /// Transcript file, cleared then appended to.
    pub transcript: Option<&'a Path>,
    /// Persona prompt file for the first user turn.
    pub seed: Option<&'a Path>,
    /// Answering-model service override.
    pub service: Option<&'a str>,
    /// Answering-model override.
    pub model: Option<&'a str>,
    /// Passing rating override.
    pub threshold: Option<f64>,
    /// Iteration cap override.
    pub max_iterations: Option<usize>,
    /// Enable reasoning expansion.
    pub expansion: bool,
    /// Enable test-time scaling.
    pub test_time_scaling: bool,
    /// Prompt template directory.
    pub prompt_dir: Option<&'a Path>,
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Run {
            input,
            output,
            transcript,
            seed,
            service,
            model,
            threshold,
            max_iterations,
            expansion,
            test_time_scaling,
            prompt_dir,
        } => {
            let params = RunParams {
                input,
                output,
                transcript: transcript.as_deref(),
                seed: seed.as_deref(),
                service: service.as_deref(),
                model: model.as_deref(),
                threshold: *threshold,
                max_iterations: *max_iterations,
                expansion: *expansion,
                test_time_scaling: *test_time_scaling,
                prompt_dir: prompt_dir.as_deref(),
            };
            cmd_run(&params, format)
        }
        Commands::Models => Ok(format_models(format)),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| {
        CommandError::Io {
            path: path.display().to_string(),
            source,
        }
        .into()
    })
}

/// Builds the research configuration from env plus CLI overrides.
fn research_config(params: &RunParams<'_>) -> Result<ResearchConfig> {
    let mut builder = ResearchConfig::builder();
    if let Some(service) = params.service {
        builder = builder.service(ModelRole::Reasoning, service);
    }
    if let Some(model) = params.model {
        builder = builder.model(ModelRole::Reasoning, model);
    }
    if let Some(t) = params.threshold {
        builder = builder.threshold(t);
    }
    if let Some(n) = params.max_iterations {
        builder = builder.max_iterations(n);
    }
    if params.expansion {
        builder = builder.reasoning_expansion(true);
    }
    if params.test_time_scaling {
        builder = builder.test_time_scaling(true);
    }
    if let Some(dir) = params.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    builder
        .from_env()
        .build()
        .map_err(|e| CommandError::ExecutionFailed(format!("Configuration error: {e}")).into())
}

/// Transcript sink appending `### label` sections to `path`.
///
/// Write failures are logged and otherwise ignored; the transcript is
/// advisory.
fn file_transcript(path: &Path) -> Result<TranscriptSink> {
    fs::write(path, "").map_err(|source| CommandError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let path: PathBuf = path.to_path_buf();
    Ok(Arc::new(move |kind: TranscriptKind, text: &str| {
        let written = OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "### {}\n{text}\n", kind.label()));
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "failed to append transcript");
        }
    }))
}

/// Expands literal `\n` sequences the models sometimes emit.
fn expand_newlines(answer: &str) -> String {
    answer.replace("\\n", "\n")
}

fn cmd_run(params: &RunParams<'_>, format: OutputFormat) -> Result<String> {
    let question = read_text(params.input)?;
    let question = question.trim();
    if question.is_empty() {
        return Err(CommandError::ExecutionFailed(format!(
            "Question file is empty: {}",
            params.input.display()
        ))
        .into());
    }
    let seed = match params.seed {
        Some(path) => format!("{}\n\n{question}", read_text(path)?.trim()),
        None => question.to_string(),
    };

    let config = research_config(params)?;
    let mut orchestrator = Orchestrator::from_config(config)
        .map_err(|e| CommandError::ExecutionFailed(format!("Setup failed: {e}")))?;
    if let Some(path) = params.transcript {
        orchestrator = orchestrator.with_transcript(file_transcript(path)?);
    }

    // Create tokio runtime as sync/async bridge
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;
    let outcome = rt
        .block_on(orchestrator.run(question, &seed))
        .map_err(|e| CommandError::ExecutionFailed(format!("Research failed: {e}")))?;

    fs::write(params.output, expand_newlines(&outcome.answer)).map_err(|source| {
        CommandError::Io {
            path: params.output.display().to_string(),
            source,
        }
    })?;
    info!(output = %params.output.display(), "final answer written");

    Ok(format_outcome(
        &outcome,
        &params.output.display().to_string(),
        format,
    ))
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                output.push_str("  ");
                output.push_str(
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown"),
                );
                output.push('\n');
            }
            output.push_str("\nEdit these files to customize the research prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}
