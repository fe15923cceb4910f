//! Text-in, text-out collaborators the tools delegate to.
//!
//! Each capability may fail; the executor turns failures into error-text
//! tool results so a single backend outage never aborts an iteration.

use async_trait::async_trait;

use crate::error::AgentError;

/// Web search returning a prose answer.
#[async_trait]
pub trait SearchCapability: Send + Sync {
    /// Answers `query`, preferring sources newer than `recency`
    /// (`day`, `week`, `month`, `year`).
    async fn search(&self, query: &str, recency: &str) -> Result<String, AgentError>;
}

/// Fetches the content of one page.
#[async_trait]
pub trait RetrievalCapability: Send + Sync {
    /// Returns the page at `url`, typically as markdown.
    async fn retrieve(&self, url: &str) -> Result<String, AgentError>;
}

/// Answers a self-contained question with an independent model.
#[async_trait]
pub trait SubqueryCapability: Send + Sync {
    /// Answers `prompt` with no access to the current conversation.
    async fn subquery(&self, prompt: &str) -> Result<String, AgentError>;
}

/// Placeholder for a backend that has no credentials configured.
///
/// Every call fails with a [`AgentError::Capability`] naming the backend,
/// which the model sees as tool error text.
#[derive(Debug, Clone)]
pub struct Unconfigured {
    name: &'static str,
}

impl Unconfigured {
    /// Creates a placeholder for the backend called `name`.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    fn error(&self) -> AgentError {
        AgentError::Capability {
            name: self.name.to_string(),
            message: "backend is not configured".to_string(),
        }
    }
}

#[async_trait]
impl SearchCapability for Unconfigured {
    async fn search(&self, _query: &str, _recency: &str) -> Result<String, AgentError> {
        Err(self.error())
    }
}

#[async_trait]
impl RetrievalCapability for Unconfigured {
    async fn retrieve(&self, _url: &str) -> Result<String, AgentError> {
        Err(self.error())
    }
}

#[async_trait]
impl SubqueryCapability for Unconfigured {
    async fn subquery(&self, _prompt: &str) -> Result<String, AgentError> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_fails_with_name() {
        let search = Unconfigured::new("perplexity");
        let err = search.search("q", "month").await;
        assert!(matches!(
            err,
            Err(AgentError::Capability { ref name, .. }) if name == "perplexity"
        ));
    }
}
