//! Synthesizer agent for the final report.
//!
//! Runs once an answer passes: it reads the whole conversation and writes
//! the exhaustive narrative report that becomes the run's result.

use super::gateway::ModelGateway;
use super::message::ChatMessage;
use super::model::ModelSpec;
use super::traits::Agent;
use crate::error::AgentError;

/// Agent that turns the research conversation into a final report.
pub struct SynthesizerAgent {
    spec: ModelSpec,
    template: String,
}

impl SynthesizerAgent {
    /// Creates a synthesizer. `template` has a `{question}` slot.
    #[must_use]
    pub const fn new(spec: ModelSpec, template: String) -> Self {
        Self { spec, template }
    }

    /// Writes the final report for `question` from `conversation`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures.
    pub async fn synthesize(
        &self,
        gateway: &ModelGateway,
        question: &str,
        conversation: &[ChatMessage],
    ) -> Result<String, AgentError> {
        let prompt = self.template.replace("{question}", question);
        Ok(self.execute(gateway, conversation, &prompt).await?.content)
    }
}

impl Agent for SynthesizerAgent {
    fn name(&self) -> &'static str {
        "synthesizer"
    }

    fn spec(&self) -> &ModelSpec {
        &self.spec
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message::{assistant_message, user_message};
    use crate::agent::model::{self, OPENAI_O1_MINI, Service};
    use crate::agent::prompt::FINAL_REPORT_PROMPT;
    use crate::agent::testing::{ScriptedProvider, gateway, reply};

    #[tokio::test]
    async fn test_report_reads_whole_conversation() {
        let provider = ScriptedProvider::new([reply("<think>outline</think>\nThe report.")]);
        let gw = gateway(&[Service::OpenAi], &provider);
        let agent = SynthesizerAgent::new(
            model::resolve(Service::OpenAi, OPENAI_O1_MINI).unwrap_or_else(|e| panic!("{e}")),
            FINAL_REPORT_PROMPT.to_string(),
        );
        let conversation = [user_message("q"), assistant_message("draft")];

        let report = agent
            .synthesize(&gw, "What is X?", &conversation)
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(report, "The report.");
        let sent = &provider.requests()[0];
        assert_eq!(sent.messages.len(), 3);
        assert!(sent.messages[2].content.ends_with("What is X?"));
        assert_eq!(sent.args.model, OPENAI_O1_MINI);
    }
}
