//! Provider-agnostic message types for chat completion calls.
//!
//! These types decouple the research loop from any specific SDK, so the
//! same controller runs against `OpenAI`, Groq, Together, Fireworks and
//! `DeepSeek` endpoints, or against stubs in tests.

use serde::{Deserialize, Serialize};

use super::model::ModelArgs;
use super::tool::{ToolCall, ToolDefinition};

/// Role of a chat message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
    /// Tool result.
    Tool,
}

impl Role {
    /// Uppercase label used when folding turns into one message.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
            Self::Tool => "TOOL",
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Message content.
    pub content: String,
    /// Tool calls requested by the assistant (only for `Role::Assistant`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Tool call ID this message responds to (only for `Role::Tool`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the answer.
    Stop,
    /// Completion limit hit.
    Length,
    /// Completion limit hit (Anthropic-style naming some proxies forward).
    MaxTokens,
    /// Output withheld by a content filter.
    ContentFilter,
    /// Model is waiting on native tool calls.
    ToolCalls,
    /// Anything else the provider reported.
    Other(String),
}

impl FinishReason {
    /// Parses a provider's finish-reason string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "max_tokens" => Self::MaxTokens,
            "content_filter" => Self::ContentFilter,
            "tool_calls" | "function_call" => Self::ToolCalls,
            other => Self::Other(other.to_string()),
        }
    }

    /// The model was cut off and its output cannot be trusted as an answer.
    #[must_use]
    pub const fn is_truncation(&self) -> bool {
        matches!(self, Self::Length | Self::MaxTokens | Self::ContentFilter)
    }
}

/// A chat completion request (provider-agnostic).
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Resolved argument template: model, limits, temperature, flags.
    pub args: ModelArgs,
    /// Ordered conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Tool definitions sent natively. Empty for models without tool support.
    pub tools: Vec<ToolDefinition>,
}

/// Token usage statistics from a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated in the completion.
    pub completion_tokens: u32,
    /// Total tokens used.
    pub total_tokens: u32,
}

/// A chat completion response (provider-agnostic).
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Generated text content.
    pub content: String,
    /// Hidden reasoning, when the provider returns it in a separate field.
    pub reasoning: Option<String>,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Native tool calls requested by the model.
    pub tool_calls: Vec<ToolCall>,
    /// Finish reason from the model.
    pub finish_reason: Option<FinishReason>,
}

/// Creates a system message.
#[must_use]
pub fn system_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::System,
        content: content.to_string(),
        tool_calls: Vec::new(),
        tool_call_id: None,
    }
}

/// Creates a user message.
#[must_use]
pub fn user_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::User,
        content: content.to_string(),
        tool_calls: Vec::new(),
        tool_call_id: None,
    }
}

/// Creates a plain assistant message.
#[must_use]
pub fn assistant_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::Assistant,
        content: content.to_string(),
        tool_calls: Vec::new(),
        tool_call_id: None,
    }
}

/// Creates an assistant message carrying native tool calls.
#[must_use]
pub fn assistant_tool_calls_message(content: &str, tool_calls: Vec<ToolCall>) -> ChatMessage {
    ChatMessage {
        role: Role::Assistant,
        content: content.to_string(),
        tool_calls,
        tool_call_id: None,
    }
}

/// Creates a tool result message.
#[must_use]
pub fn tool_message(tool_call_id: &str, content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::Tool,
        content: content.to_string(),
        tool_calls: Vec::new(),
        tool_call_id: Some(tool_call_id.to_string()),
    }
}

/// Folds every turn into a single user message.
///
/// Each turn becomes `\n=====\n[ROLE]:\n=====\n{content}\n\n`.
#[must_use]
pub fn fold_into_user_message(messages: &[ChatMessage]) -> ChatMessage {
    let folded: String = messages
        .iter()
        .map(|m| format!("\n=====\n[{}]:\n=====\n{}\n\n", m.role.label(), m.content))
        .collect();
    user_message(&folded)
}
