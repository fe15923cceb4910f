//! Subquery agent backing the `call_research_professional` tool.
//!
//! Answers a self-contained question with an independent model that never
//! sees the research conversation.

use std::sync::Arc;

use async_trait::async_trait;

use super::capability::SubqueryCapability;
use super::gateway::ModelGateway;
use super::model::ModelSpec;
use super::traits::Agent;
use crate::error::AgentError;

/// One-shot expert consulted by the answering model.
pub struct SubqueryAgent {
    spec: ModelSpec,
    gateway: Arc<ModelGateway>,
}

impl SubqueryAgent {
    /// Creates an agent calling `spec` through `gateway`.
    #[must_use]
    pub const fn new(spec: ModelSpec, gateway: Arc<ModelGateway>) -> Self {
        Self { spec, gateway }
    }
}

impl Agent for SubqueryAgent {
    fn name(&self) -> &'static str {
        "subquery"
    }

    fn spec(&self) -> &ModelSpec {
        &self.spec
    }
}

#[async_trait]
impl SubqueryCapability for SubqueryAgent {
    async fn subquery(&self, prompt: &str) -> Result<String, AgentError> {
        Ok(self.execute(&self.gateway, &[], prompt).await?.content)
    }
}
