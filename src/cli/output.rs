//! Output formatting for CLI commands.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::json;

use crate::agent::model::{CompletionLimit, DESCRIPTORS, MAX_PROMPT_TOKENS};
use crate::agent::orchestrator::ResearchOutcome;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; anything unrecognised is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON with a trailing newline.
    #[must_use]
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        serde_json::to_string_pretty(value)
            .map(|s| s + "\n")
            .unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}\n"))
    }
}

/// One-line summary of a finished run.
#[must_use]
pub fn format_outcome(outcome: &ResearchOutcome, output: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let scores: Vec<String> = outcome.scores.iter().map(|s| format!("{s:.2}")).collect();
            format!(
                "Answer written to {output} | {} | iterations: {} | scores: [{}] | cost: ${:.4} | time: {:.1}s\n",
                outcome.termination.as_str(),
                outcome.iterations,
                scores.join(", "),
                outcome.cost_usd,
                outcome.elapsed.as_secs_f64()
            )
        }
        OutputFormat::Json => format.to_json(&json!({
            "output": output,
            "termination": outcome.termination.as_str(),
            "iterations": outcome.iterations,
            "scores": outcome.scores,
            "cost_usd": outcome.cost_usd,
            "elapsed_secs": outcome.elapsed.as_secs_f64(),
        })),
    }
}

/// Table of every supported model pair.
#[must_use]
pub fn format_models(format: OutputFormat) -> String {
    let completion = |limit: Option<CompletionLimit>| match limit {
        Some(CompletionLimit::MaxCompletionTokens(n) | CompletionLimit::MaxTokens(n)) => {
            Some(n)
        }
        None => None,
    };
    match format {
        OutputFormat::Text => {
            let mut out = format!(
                "{:<12} {:<45} {:>8} {:>12}  tools\n",
                "SERVICE", "MODEL", "PROMPT", "COMPLETION"
            );
            for d in DESCRIPTORS {
                let limit = completion(d.completion_limit)
                    .map_or_else(|| "-".to_string(), |n| n.to_string());
                let tools = if d.native_tools { "native" } else { "fenced" };
                let _ = writeln!(
                    out,
                    "{:<12} {:<45} {:>8} {:>12}  {tools}",
                    d.service.as_str(),
                    d.model,
                    MAX_PROMPT_TOKENS,
                    limit
                );
            }
            out
        }
        OutputFormat::Json => {
            let models: Vec<_> = DESCRIPTORS
                .iter()
                .map(|d| {
                    json!({
                        "service": d.service.as_str(),
                        "model": d.model,
                        "max_prompt_tokens": MAX_PROMPT_TOKENS,
                        "max_completion_tokens": completion(d.completion_limit),
                        "native_tools": d.native_tools,
                        "fold_roles": d.fold_roles,
                    })
                })
                .collect();
            format.to_json(&json!({ "models": models }))
        }
    }
}
