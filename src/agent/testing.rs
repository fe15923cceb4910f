//! Scripted provider shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::gateway::ModelGateway;
use super::message::{ChatRequest, ChatResponse, FinishReason};
use super::model::Service;
use super::provider::LlmProvider;
use super::retry::RetryPolicy;
use crate::error::AgentError;

/// Replays canned responses in order and records every request.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ChatResponse>>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .ok_or_else(|| AgentError::Orchestration {
                message: "script exhausted".to_string(),
            })
    }
}

/// A `stop` reply with `content`.
pub fn reply(content: &str) -> ChatResponse {
    ChatResponse {
        content: content.to_string(),
        finish_reason: Some(FinishReason::Stop),
        ..ChatResponse::default()
    }
}

/// Gateway that routes every listed service to `provider`, without retry
/// pauses.
pub fn gateway(services: &[Service], provider: &Arc<ScriptedProvider>) -> ModelGateway {
    services.iter().fold(
        ModelGateway::new(RetryPolicy::new(1, Duration::ZERO)),
        |g, service| g.with_provider(*service, Arc::clone(provider) as Arc<dyn LlmProvider>),
    )
}
