//! Agent trait definition.
//!
//! The judge, manager, synthesizer and subquery roles are one-shot model
//! calls with a fixed purpose. They share this trait, which handles the
//! request shape, the date header and hidden-reasoning removal.

use async_trait::async_trait;

use super::gateway::ModelGateway;
use super::message::{ChatMessage, FinishReason, TokenUsage, user_message};
use super::model::ModelSpec;
use super::normalize::strip_hidden_reasoning;
use super::prompt::current_datetime_header;
use crate::error::AgentError;

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// Visible output with hidden reasoning stripped.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating.
    pub finish_reason: Option<FinishReason>,
}

/// Trait implemented by all single-purpose agents.
///
/// Agents encapsulate a role with a resolved model. The orchestrator calls
/// [`Agent::execute`] with whatever conversation context the role needs.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model this agent calls.
    fn spec(&self) -> &ModelSpec;

    /// Sends `history` followed by `prompt` as a user turn.
    ///
    /// With no history the prompt is prefixed with the current date header,
    /// since the model has no other clue about "now".
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures.
    async fn execute(
        &self,
        gateway: &ModelGateway,
        history: &[ChatMessage],
        prompt: &str,
    ) -> Result<AgentResponse, AgentError> {
        let mut messages = history.to_vec();
        if history.is_empty() {
            messages.push(user_message(&format!(
                "{}\n{prompt}",
                current_datetime_header()
            )));
        } else {
            messages.push(user_message(prompt));
        }

        let response = gateway
            .complete(self.name(), self.spec(), &messages, &[])
            .await?;

        Ok(AgentResponse {
            content: strip_hidden_reasoning(&response.content).trim().to_string(),
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message::{Role, assistant_message};
    use crate::agent::model::{self, OPENAI_GPT_4O, Service};
    use crate::agent::testing::{ScriptedProvider, gateway, reply};

    struct Plain(ModelSpec);

    impl Agent for Plain {
        fn name(&self) -> &'static str {
            "plain"
        }

        fn spec(&self) -> &ModelSpec {
            &self.0
        }
    }

    fn plain() -> Plain {
        Plain(model::resolve(Service::OpenAi, OPENAI_GPT_4O).unwrap_or_else(|e| panic!("{e}")))
    }

    #[tokio::test]
    async fn test_empty_history_gets_date_header() {
        let provider = ScriptedProvider::new([reply("<think>hmm</think>\n\nanswer")]);
        let gw = gateway(&[Service::OpenAi], &provider);

        let response = plain()
            .execute(&gw, &[], "question")
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(response.content, "answer");
        let sent = &provider.requests()[0].messages;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content.starts_with("Current date and time:"));
        assert!(sent[0].content.ends_with("\nquestion"));
    }

    #[tokio::test]
    async fn test_history_is_sent_before_prompt() {
        let provider = ScriptedProvider::new([reply("ok")]);
        let gw = gateway(&[Service::OpenAi], &provider);
        let history = [user_message("q"), assistant_message("a")];

        plain()
            .execute(&gw, &history, "grade it")
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let sent = &provider.requests()[0].messages;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].role, Role::User);
        assert_eq!(sent[2].content, "grade it");
    }
}
