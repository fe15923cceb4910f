//! Judge agent for rubric scoring.
//!
//! Grades the answering model's latest answer against the question using an
//! independent model. The raw payload goes through the best-effort parser;
//! an unusable payload is a failing score, not an error.

use tracing::warn;

use super::gateway::ModelGateway;
use super::message::ChatMessage;
use super::model::ModelSpec;
use super::rating::{RatingParse, parse_rating};
use super::traits::Agent;
use crate::error::AgentError;

/// One judged answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    /// The judge's text, hidden reasoning removed.
    pub raw: String,
    /// Parsed verdict or failure marker.
    pub parse: RatingParse,
}

impl Judgement {
    /// Rating to record; `0.0` when the payload was unusable.
    #[must_use]
    pub fn rating(&self) -> f64 {
        self.parse.rating()
    }

    /// Feedback to show the answering model: the parsed pros and cons,
    /// or the raw payload when parsing failed.
    #[must_use]
    pub fn feedback(&self) -> String {
        self.parse
            .evaluation()
            .map_or_else(|| self.raw.clone(), super::rating::Evaluation::pros_and_cons)
    }
}

/// Agent that rates answers with a fixed rubric.
pub struct JudgeAgent {
    spec: ModelSpec,
    rubric: String,
}

impl JudgeAgent {
    /// Creates a judge. `rubric` is the judge template with a `{question}` slot.
    #[must_use]
    pub const fn new(spec: ModelSpec, rubric: String) -> Self {
        Self { spec, rubric }
    }

    /// Grades the conversation's latest answer to `question`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] only when the judge call itself fails.
    pub async fn judge(
        &self,
        gateway: &ModelGateway,
        question: &str,
        conversation: &[ChatMessage],
    ) -> Result<Judgement, AgentError> {
        let prompt = self.rubric.replace("{question}", question);
        let response = self.execute(gateway, conversation, &prompt).await?;
        let parse = parse_rating(&response.content);
        if let RatingParse::Failed { reason } = &parse {
            warn!(reason = %reason, "judge payload unusable, scoring as 0.0");
        }
        Ok(Judgement {
            raw: response.content,
            parse,
        })
    }
}

impl Agent for JudgeAgent {
    fn name(&self) -> &'static str {
        "judge"
    }

    fn spec(&self) -> &ModelSpec {
        &self.spec
    }
}
