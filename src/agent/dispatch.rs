//! Concurrent tool-call dispatch.
//!
//! All calls of one iteration run on a [`WorkerPool`]. Each worker appends
//! its result to the shared conversation as soon as it finishes, so the
//! merge order follows completion order. The dispatcher returns only after
//! every call has produced exactly one result message.

use tracing::{debug, warn};

use super::conversation::{ISSUED_QUERIES, SharedContext, SharedConversation};
use super::executor::ToolExecutor;
use super::message::{ChatMessage, tool_message, user_message};
use super::pool::WorkerPool;
use super::tool::{ToolCall, ToolResult, WEB_SEARCH};
use super::transcript::{TranscriptKind, TranscriptSink};

/// Shared state the dispatcher writes to.
#[derive(Clone)]
pub struct DispatchTarget {
    /// Conversation receiving one message per call.
    pub conversation: SharedConversation,
    /// Context recording issued search queries.
    pub context: SharedContext,
    /// Progressive transcript.
    pub transcript: TranscriptSink,
}

impl DispatchTarget {
    /// Bundles the shared handles.
    #[must_use]
    pub fn new(
        conversation: SharedConversation,
        context: SharedContext,
        transcript: TranscriptSink,
    ) -> Self {
        Self {
            conversation,
            context,
            transcript,
        }
    }
}

impl std::fmt::Debug for DispatchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTarget").finish_non_exhaustive()
    }
}

/// The message a tool result becomes.
///
/// Native tool calls are answered with tool-role messages bound to the
/// call id; fenced calls are answered as user turns.
#[must_use]
pub fn result_message(result: &ToolResult, native: bool) -> ChatMessage {
    if native {
        tool_message(&result.tool_call_id, &result.content)
    } else {
        user_message(&result.content)
    }
}

async fn merge(target: &DispatchTarget, result: &ToolResult, native: bool) {
    target
        .conversation
        .lock()
        .await
        .push(result_message(result, native));
    (target.transcript)(TranscriptKind::ToolResult, &result.content);
}

/// Executes `calls` concurrently and merges their results into the target.
///
/// Returns the results in call order. Every call yields one result, and a
/// failing or panicking worker is reported as error text for its call.
pub async fn dispatch_tool_calls(
    calls: Vec<ToolCall>,
    native: bool,
    executor: &ToolExecutor,
    pool: WorkerPool,
    target: &DispatchTarget,
) -> Vec<ToolResult> {
    if calls.is_empty() {
        return Vec::new();
    }
    debug!(calls = calls.len(), native, "dispatching tool calls");

    {
        let mut ctx = target.context.lock().await;
        for call in calls.iter().filter(|c| c.name == WEB_SEARCH) {
            ctx.push_str(ISSUED_QUERIES, &call.str_argument("query"));
        }
    }

    let outcomes = pool
        .run_all(calls.clone(), |call| {
            let executor = executor.clone();
            let target = target.clone();
            async move {
                let result = executor.execute(&call).await;
                merge(&target, &result, native).await;
                Ok(result)
            }
        })
        .await;

    let mut results = Vec::with_capacity(calls.len());
    for (call, outcome) in calls.iter().zip(outcomes) {
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!(tool = %call.name, id = %call.id, error = %e, "tool worker failed");
                let result = ToolResult {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    content: format!("Error while calling {}: {e}", call.name),
                    is_error: true,
                };
                merge(target, &result, native).await;
                results.push(result);
            }
        }
    }
    results
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::capability::{RetrievalCapability, SearchCapability, SubqueryCapability};
    use crate::agent::conversation::{Context, Conversation};
    use crate::agent::message::Role;
    use crate::agent::transcript;
    use crate::error::AgentError;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    /// Search that fails for "boom", panics for "panic" and otherwise
    /// sleeps a query-dependent time so completion order differs from call
    /// order.
    struct Flaky;

    #[async_trait]
    impl SearchCapability for Flaky {
        async fn search(&self, query: &str, _recency: &str) -> Result<String, AgentError> {
            match query {
                "boom" => Err(AgentError::Capability {
                    name: "search".to_string(),
                    message: "backend down".to_string(),
                }),
                "panic" => panic!("search worker panicked"),
                _ => {
                    let delay = u64::try_from(query.len()).unwrap_or(1);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok(query.to_uppercase())
                }
            }
        }
    }

    #[async_trait]
    impl RetrievalCapability for Flaky {
        async fn retrieve(&self, _url: &str) -> Result<String, AgentError> {
            Ok(String::new())
        }
    }

    #[async_trait]
    impl SubqueryCapability for Flaky {
        async fn subquery(&self, _prompt: &str) -> Result<String, AgentError> {
            Ok(String::new())
        }
    }

    fn search_call(i: usize, query: &str) -> ToolCall {
        ToolCall {
            id: format!("call_{i}"),
            name: WEB_SEARCH.to_string(),
            arguments: serde_json::json!({ "query": query }).to_string(),
        }
    }

    fn target() -> DispatchTarget {
        DispatchTarget::new(
            Conversation::new().into_shared(),
            Context::new().into_shared(),
            transcript::discard(),
        )
    }

    fn executor() -> ToolExecutor {
        ToolExecutor::new(Arc::new(Flaky), Arc::new(Flaky), Arc::new(Flaky), "month")
    }

    #[tokio::test]
    async fn test_every_call_yields_one_message_despite_failures() {
        let target = target();
        let calls = vec![
            search_call(0, "a much longer query"),
            search_call(1, "boom"),
            search_call(2, "panic"),
            search_call(3, "q"),
        ];

        let results =
            dispatch_tool_calls(calls, false, &executor(), WorkerPool::new(4), &target).await;

        assert_eq!(results.len(), 4);
        assert!(!results[0].is_error);
        assert!(results[1].is_error);
        assert!(results[2].is_error);
        assert!(!results[3].is_error);
        assert_eq!(target.conversation.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn test_fenced_results_are_user_turns() {
        let target = target();
        dispatch_tool_calls(
            vec![search_call(0, "paris")],
            false,
            &executor(),
            WorkerPool::new(1),
            &target,
        )
        .await;
        let conv = target.conversation.lock().await;
        assert_eq!(conv.messages()[0].role, Role::User);
        assert_eq!(
            conv.messages()[0].content,
            "Tool Response to query 'paris': PARIS"
        );
    }

    #[tokio::test]
    async fn test_native_results_bind_call_id() {
        let target = target();
        dispatch_tool_calls(
            vec![search_call(7, "x")],
            true,
            &executor(),
            WorkerPool::new(1),
            &target,
        )
        .await;
        let conv = target.conversation.lock().await;
        assert_eq!(conv.messages()[0].role, Role::Tool);
        assert_eq!(conv.messages()[0].tool_call_id.as_deref(), Some("call_7"));
    }

    #[tokio::test]
    async fn test_search_queries_recorded_in_context() {
        let target = target();
        dispatch_tool_calls(
            vec![search_call(0, "one"), search_call(1, "two")],
            false,
            &executor(),
            WorkerPool::new(2),
            &target,
        )
        .await;
        assert_eq!(
            target.context.lock().await.strings(ISSUED_QUERIES),
            ["one", "two"]
        );
    }

    #[tokio::test]
    async fn test_no_calls_is_noop() {
        let target = target();
        let results =
            dispatch_tool_calls(Vec::new(), false, &executor(), WorkerPool::new(1), &target).await;
        assert!(results.is_empty());
        assert!(target.conversation.lock().await.is_empty());
    }
}
