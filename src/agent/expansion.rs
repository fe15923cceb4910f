//! Reasoning expansion.
//!
//! Mines the answering model's hidden reasoning for questions it raised but
//! never answered, drops those already asked, and researches the rest in
//! parallel. Each answer lands in the conversation as a trusted user turn.

use tracing::{debug, info, warn};

use super::conversation::RESEARCH_QUESTIONS;
use super::dispatch::DispatchTarget;
use super::executor::ToolExecutor;
use super::gateway::ModelGateway;
use super::message::user_message;
use super::model::ModelSpec;
use super::pool::WorkerPool;
use super::prompt::PromptSet;
use super::tool::ToolCall;
use super::traits::Agent;
use super::transcript::TranscriptKind;
use crate::error::AgentError;

/// Marker that identifies a judge payload leaking into reasoning.
const SCORING_MARKER: &str = "Critical_Evaluation";

/// Formats one researched question for the conversation.
#[must_use]
pub fn trusted_answer(question: &str, answer: &str) -> String {
    format!("Trusted Research to Question:\n{question}\n\nAnswer:\n{answer}")
}

/// Keeps the non-blank lines of `text`, trimmed, at most `max` of them.
fn question_lines(text: &str, max: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(max)
        .map(ToString::to_string)
        .collect()
}

/// Runs the expansion sub-loop.
pub struct ReasoningExpander {
    spec: ModelSpec,
    prompts: PromptSet,
    max_questions: usize,
}

impl ReasoningExpander {
    /// Creates an expander asking `spec` for at most `max_questions` questions.
    #[must_use]
    pub const fn new(spec: ModelSpec, prompts: PromptSet, max_questions: usize) -> Self {
        Self {
            spec,
            prompts,
            max_questions,
        }
    }

    /// Whether `reasoning` is worth expanding.
    #[must_use]
    pub fn applies(reasoning: &str) -> bool {
        !reasoning.trim().is_empty() && !reasoning.contains(SCORING_MARKER)
    }

    /// Proposes follow-up questions and deduplicates them against what the
    /// run already asked.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when either model call fails.
    pub async fn propose(
        &self,
        gateway: &ModelGateway,
        reasoning: &str,
        tool_calls: &[ToolCall],
        prior_questions: &[String],
    ) -> Result<Vec<String>, AgentError> {
        let extract = self.prompts.expansion_extract(reasoning, self.max_questions);
        let proposed = self.execute(gateway, &[], &extract).await?.content;

        let calls = serde_json::to_string(tool_calls).unwrap_or_default();
        let consolidate =
            self.prompts
                .expansion_consolidate(&proposed, &calls, &prior_questions.join("\n"));
        let consolidated = self.execute(gateway, &[], &consolidate).await?.content;

        Ok(question_lines(&consolidated, self.max_questions))
    }

    /// Expands `reasoning` into researched answers appended to the
    /// conversation.
    ///
    /// Returns how many answers were appended. A question whose search
    /// fails is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when proposing questions fails. Search
    /// failures never surface.
    pub async fn expand(
        &self,
        gateway: &ModelGateway,
        reasoning: &str,
        tool_calls: &[ToolCall],
        executor: &ToolExecutor,
        pool: WorkerPool,
        target: &DispatchTarget,
    ) -> Result<usize, AgentError> {
        if !Self::applies(reasoning) {
            return Ok(0);
        }
        info!("expanding hidden reasoning");

        let prior = target.context.lock().await.strings(RESEARCH_QUESTIONS);
        let questions = self.propose(gateway, reasoning, tool_calls, &prior).await?;
        if questions.is_empty() {
            debug!("expansion found no new questions");
            return Ok(0);
        }
        {
            let mut ctx = target.context.lock().await;
            for q in &questions {
                ctx.push_str(RESEARCH_QUESTIONS, q);
            }
        }

        let outcomes = pool
            .run_all(questions.clone(), |question| {
                let search = executor.search_capability();
                let recency = executor.recency().to_string();
                async move {
                    let answer = search.search(&question, &recency).await?;
                    Ok(trusted_answer(&question, &answer))
                }
            })
            .await;

        let mut appended = 0;
        for (question, outcome) in questions.iter().zip(outcomes) {
            match outcome {
                Ok(text) => {
                    target.conversation.lock().await.push(user_message(&text));
                    (target.transcript)(TranscriptKind::ToolResult, &text);
                    appended += 1;
                }
                Err(e) => warn!(question = %question, error = %e, "expansion question dropped"),
            }
        }
        Ok(appended)
    }
}

impl Agent for ReasoningExpander {
    fn name(&self) -> &'static str {
        "expansion"
    }

    fn spec(&self) -> &ModelSpec {
        &self.spec
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::capability::{SearchCapability, Unconfigured};
    use crate::agent::conversation::{Context, Conversation};
    use crate::agent::message::ChatResponse;
    use crate::agent::model::{self, OPENAI_GPT_4O, Service};
    use crate::agent::testing::{ScriptedProvider, gateway, reply};
    use crate::agent::transcript;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Search;

    #[async_trait]
    impl SearchCapability for Search {
        async fn search(&self, query: &str, _recency: &str) -> Result<String, AgentError> {
            if query.contains("fail") {
                Err(AgentError::Capability {
                    name: "search".to_string(),
                    message: "down".to_string(),
                })
            } else {
                Ok(format!("answer to {query}"))
            }
        }
    }

    fn executor() -> ToolExecutor {
        ToolExecutor::new(
            Arc::new(Search),
            Arc::new(Unconfigured::new("retrieval")),
            Arc::new(Unconfigured::new("subquery")),
            "month",
        )
    }

    fn target() -> DispatchTarget {
        DispatchTarget::new(
            Conversation::new().into_shared(),
            Context::new().into_shared(),
            transcript::discard(),
        )
    }

    fn expander(max: usize) -> ReasoningExpander {
        ReasoningExpander::new(
            model::resolve(Service::OpenAi, OPENAI_GPT_4O).unwrap_or_else(|e| panic!("{e}")),
            PromptSet::defaults(),
            max,
        )
    }

    #[test]
    fn test_scoring_payload_not_expanded() {
        assert!(!ReasoningExpander::applies("{\"Critical_Evaluation\": {}}"));
        assert!(!ReasoningExpander::applies("   "));
        assert!(ReasoningExpander::applies("Should I check the population?"));
    }

    #[test]
    fn test_question_lines_truncate() {
        let lines = question_lines("a\n\n  b  \nc\nd", 3);
        assert_eq!(lines, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_expand_appends_answers_and_skips_failures() {
        let provider = ScriptedProvider::new([
            reply("Q1 Context: x\nQ2 fail Context: y\nQ3 Context: z"),
            reply("Q1 Context: x\n\nQ2 fail Context: y"),
        ]);
        let gw = gateway(&[Service::OpenAi], &provider);
        let target = target();
        target
            .context
            .lock()
            .await
            .push_str(RESEARCH_QUESTIONS, "Q0 earlier");

        let appended = expander(3)
            .expand(
                &gw,
                "I wonder about Q1 and Q2.",
                &[],
                &executor(),
                WorkerPool::new(2),
                &target,
            )
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(appended, 1);
        let conv = target.conversation.lock().await;
        assert_eq!(conv.len(), 1);
        assert!(conv.messages()[0].content.starts_with("Trusted Research to Question:\nQ1"));
        assert!(conv.messages()[0].content.ends_with("answer to Q1 Context: x"));

        let recorded = target.context.lock().await.strings(RESEARCH_QUESTIONS);
        assert_eq!(recorded.len(), 3);

        let consolidate = &provider.requests()[1].messages[0].content;
        assert!(consolidate.contains("Q0 earlier"));
    }

    #[tokio::test]
    async fn test_scoring_payload_makes_no_calls() {
        let provider = ScriptedProvider::new(Vec::<ChatResponse>::new());
        let gw = gateway(&[Service::OpenAi], &provider);
        let appended = expander(3)
            .expand(
                &gw,
                "Critical_Evaluation",
                &[],
                &executor(),
                WorkerPool::new(1),
                &target(),
            )
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(appended, 0);
        assert!(provider.requests().is_empty());
    }
}
