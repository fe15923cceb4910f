//! Manager agent: turns scores and judge feedback into a revision push.

use super::convergence::ScoreRecord;
use super::gateway::ModelGateway;
use super::model::ModelSpec;
use super::traits::Agent;
use crate::error::AgentError;

/// Agent playing the answering model's manager.
pub struct ManagerAgent {
    spec: ModelSpec,
    template: String,
}

impl ManagerAgent {
    /// Creates a manager. `template` has `{question}`, `{scores}` and
    /// `{feedback}` slots.
    #[must_use]
    pub const fn new(spec: ModelSpec, template: String) -> Self {
        Self { spec, template }
    }

    /// Builds the manager prompt.
    #[must_use]
    pub fn prompt(&self, question: &str, scores: &ScoreRecord, judge_feedback: &str) -> String {
        self.template
            .replace("{question}", question)
            .replace("{scores}", &format!("Scores:{}", scores.to_text()))
            .replace("{feedback}", judge_feedback)
    }

    /// Asks the manager for feedback on a failing answer.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures.
    pub async fn feedback(
        &self,
        gateway: &ModelGateway,
        question: &str,
        scores: &ScoreRecord,
        judge_feedback: &str,
    ) -> Result<String, AgentError> {
        let prompt = self.prompt(question, scores, judge_feedback);
        Ok(self.execute(gateway, &[], &prompt).await?.content)
    }
}

impl Agent for ManagerAgent {
    fn name(&self) -> &'static str {
        "manager"
    }

    fn spec(&self) -> &ModelSpec {
        &self.spec
    }
}
