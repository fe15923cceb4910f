//! Tool executor that dispatches tool calls to the research capabilities.
//!
//! Maps tool names to search, retrieval and subquery backends. Failures are
//! folded into the returned [`ToolResult`], never raised.

use std::sync::Arc;

use tracing::debug;

use crate::error::AgentError;

use super::capability::{RetrievalCapability, SearchCapability, SubqueryCapability};
use super::tool::{
    CALL_OPENAI_ALIAS, RESEARCH_PROFESSIONAL, ToolCall, ToolResult, WEB_CONTENT_RETRIEVER,
    WEB_SEARCH,
};

/// Maximum raw byte length of tool argument JSON from the LLM.
const MAX_TOOL_ARGS_LEN: usize = 100_000;

/// Executes tool calls against injected capabilities.
///
/// Cheap to clone; every clone shares the same backends, so one executor
/// can be handed to each concurrent worker.
#[derive(Clone)]
pub struct ToolExecutor {
    search: Arc<dyn SearchCapability>,
    retrieval: Arc<dyn RetrievalCapability>,
    subquery: Arc<dyn SubqueryCapability>,
    recency: String,
}

impl ToolExecutor {
    /// Creates an executor over the given backends.
    ///
    /// `recency` is forwarded to every search.
    #[must_use]
    pub fn new(
        search: Arc<dyn SearchCapability>,
        retrieval: Arc<dyn RetrievalCapability>,
        subquery: Arc<dyn SubqueryCapability>,
        recency: impl Into<String>,
    ) -> Self {
        Self {
            search,
            retrieval,
            subquery,
            recency: recency.into(),
        }
    }

    /// The search backend, shared with the expansion sub-loop.
    #[must_use]
    pub fn search_capability(&self) -> Arc<dyn SearchCapability> {
        Arc::clone(&self.search)
    }

    /// The recency filter passed to searches.
    #[must_use]
    pub fn recency(&self) -> &str {
        &self.recency
    }

    /// Runs one search and wraps the answer the way the model expects it.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub async fn search(&self, query: &str) -> Result<String, AgentError> {
        let answer = self.search.search(query, &self.recency).await?;
        Ok(format!("Tool Response to query '{query}': {answer}"))
    }

    /// Dispatches a tool call to the matching capability.
    ///
    /// Validates raw argument size before dispatch. Malformed argument JSON
    /// is treated as an empty argument map.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            return Self::error_result(
                call,
                format!(
                    "tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
            );
        }

        debug!(tool = %call.name, id = %call.id, "executing tool call");

        let result = match call.name.as_str() {
            WEB_SEARCH => self.search(&call.str_argument("query")).await,
            WEB_CONTENT_RETRIEVER => self.retrieval.retrieve(&call.str_argument("url")).await,
            RESEARCH_PROFESSIONAL | CALL_OPENAI_ALIAS => {
                self.subquery.subquery(&call.str_argument("prompt")).await
            }
            other => {
                return Self::error_result(call, format!("Tool {other} is not implemented."));
            }
        };

        match result {
            Ok(content) => ToolResult {
                tool_call_id: call.id.clone(),
                name: call.name.clone(),
                content,
                is_error: false,
            },
            Err(e) => Self::error_result(call, format!("Error while calling {}: {e}", call.name)),
        }
    }

    fn error_result(call: &ToolCall, content: String) -> ToolResult {
        ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content,
            is_error: true,
        }
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("recency", &self.recency)
            .finish_non_exhaustive()
    }
}
