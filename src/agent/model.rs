//! Model argument resolution.
//!
//! Maps a `(service, model)` pair to a prompt-token budget and the
//! provider-call argument template for that model. Every quirk lives in
//! [`DESCRIPTORS`]; adding a model is a new table row.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Prompt-token budget shared by every supported model.
pub const MAX_PROMPT_TOKENS: u32 = 60_000;

/// `OpenAI` `o1`.
pub const OPENAI_O1: &str = "o1";
/// `OpenAI` `o1-mini`.
pub const OPENAI_O1_MINI: &str = "o1-mini";
/// `OpenAI` `o3-mini`.
pub const OPENAI_O3_MINI: &str = "o3-mini";
/// `OpenAI` `gpt-4o`.
pub const OPENAI_GPT_4O: &str = "gpt-4o";
/// `DeepSeek` R1 served by `DeepSeek` itself.
pub const DEEPSEEK_R1: &str = "deepseek-reasoner";
/// R1 distilled onto Llama 70B, served by Groq.
pub const GROQ_DEEPSEEK_R1_LLAMA: &str = "deepseek-r1-distill-llama-70b";
/// Qwen `QwQ` 32B, served by Groq.
pub const GROQ_QWEN_QWQ: &str = "qwen-qwq-32b";
/// Llama 3.3 70B versatile, served by Groq.
pub const GROQ_LLAMA_3_VERSATILE: &str = "llama-3.3-70b-versatile";
/// Llama 4 Scout, Groq naming.
pub const GROQ_LLAMA_4_SCOUT: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
/// Llama 4 Maverick, Groq naming.
pub const GROQ_LLAMA_4_MAVERICK: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";
/// Llama 4 Maverick FP8, Together naming.
pub const TOGETHER_LLAMA_4_MAVERICK: &str = "meta-llama/Llama-4-Maverick-17B-128E-Instruct-FP8";
/// `DeepSeek` V3, Together naming.
pub const TOGETHER_DEEPSEEK_V3: &str = "deepseek-ai/DeepSeek-V3";
/// Llama 4 Maverick, Fireworks naming.
pub const FIREWORKS_LLAMA_4_MAVERICK: &str = "accounts/fireworks/models/llama4-maverick-instruct-basic";
/// Llama 4 Scout, Fireworks naming.
pub const FIREWORKS_LLAMA_4_SCOUT: &str = "accounts/fireworks/models/llama4-scout-instruct-basic";
/// Perplexity `sonar`.
pub const PERPLEXITY_SONAR: &str = "sonar";
/// Perplexity `sonar-pro`.
pub const PERPLEXITY_SONAR_PRO: &str = "sonar-pro";

/// An upstream chat-completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// `OpenAI`.
    OpenAi,
    /// Groq.
    Groq,
    /// Together AI.
    Together,
    /// Fireworks AI.
    Fireworks,
    /// `DeepSeek` (self-hosted endpoint by default).
    Deepseek,
    /// Perplexity.
    Perplexity,
}

impl Service {
    /// All services, in display order.
    pub const ALL: [Self; 6] = [
        Self::OpenAi,
        Self::Groq,
        Self::Together,
        Self::Fireworks,
        Self::Deepseek,
        Self::Perplexity,
    ];

    /// Lowercase identifier used in config and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Groq => "groq",
            Self::Together => "together",
            Self::Fireworks => "fireworks",
            Self::Deepseek => "deepseek",
            Self::Perplexity => "perplexity",
        }
    }

    /// Default OpenAI-compatible API base. `None` means the SDK default.
    #[must_use]
    pub const fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => None,
            Self::Groq => Some("https://api.groq.com/openai/v1"),
            Self::Together => Some("https://api.together.xyz/v1"),
            Self::Fireworks => Some("https://api.fireworks.ai/inference/v1"),
            Self::Deepseek => Some("http://localhost:9001"),
            Self::Perplexity => Some("https://api.perplexity.ai"),
        }
    }

    /// Environment variable holding this service's API key.
    #[must_use]
    pub const fn api_key_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Groq => "GROQ_API_KEY",
            Self::Together => "TOGETHER_API_KEY",
            Self::Fireworks => "FIREWORKS_API_KEY",
            Self::Deepseek => "DEEPSEEK_API_KEY",
            Self::Perplexity => "PERPLEXITY_API_KEY",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|svc| svc.as_str() == lowered)
            .ok_or_else(|| AgentError::UnknownService {
                name: s.to_string(),
            })
    }
}

/// Reasoning-effort hint for models that accept one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// Low effort.
    Low,
    /// Medium effort.
    Medium,
    /// High effort.
    High,
}

/// Which request field carries the completion limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionLimit {
    /// `max_completion_tokens` (current `OpenAI` field).
    MaxCompletionTokens(u32),
    /// Legacy `max_tokens`, for endpoints that never adopted the new field.
    MaxTokens(u32),
}

/// Static description of one supported `(service, model)` pair.
#[derive(Debug, Clone, Copy)]
pub struct ModelDescriptor {
    /// Service the model is served from.
    pub service: Service,
    /// Model identifier as the service expects it.
    pub model: &'static str,
    /// Completion limit and the field that carries it.
    pub completion_limit: Option<CompletionLimit>,
    /// Sampling temperature override.
    pub temperature: Option<f32>,
    /// Reasoning-effort hint.
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Request plain-text response format explicitly.
    pub text_response_format: bool,
    /// Model accepts native tool schemas and returns structured tool calls.
    pub native_tools: bool,
    /// Endpoint rejects multi-message or system input; fold into one user turn.
    pub fold_roles: bool,
}

impl ModelDescriptor {
    const fn plain(service: Service, model: &'static str) -> Self {
        Self {
            service,
            model,
            completion_limit: None,
            temperature: None,
            reasoning_effort: None,
            text_response_format: false,
            native_tools: false,
            fold_roles: false,
        }
    }

    const fn limit(mut self, limit: CompletionLimit) -> Self {
        self.completion_limit = Some(limit);
        self
    }

    const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    const fn text_format(mut self) -> Self {
        self.text_response_format = true;
        self
    }

    const fn native_tools(mut self) -> Self {
        self.native_tools = true;
        self.reasoning_effort = Some(ReasoningEffort::High);
        self
    }

    const fn fold_roles(mut self) -> Self {
        self.fold_roles = true;
        self
    }
}

use CompletionLimit::{MaxCompletionTokens, MaxTokens};

/// Every supported `(service, model)` pair.
pub static DESCRIPTORS: &[ModelDescriptor] = &[
    // Groq
    ModelDescriptor::plain(Service::Groq, GROQ_DEEPSEEK_R1_LLAMA)
        .limit(MaxCompletionTokens(131_072))
        .temperature(0.6),
    ModelDescriptor::plain(Service::Groq, GROQ_QWEN_QWQ)
        .limit(MaxCompletionTokens(32_768))
        .temperature(0.6),
    ModelDescriptor::plain(Service::Groq, GROQ_LLAMA_3_VERSATILE).limit(MaxCompletionTokens(32_768)),
    ModelDescriptor::plain(Service::Groq, TOGETHER_LLAMA_4_MAVERICK).limit(MaxCompletionTokens(8_192)),
    ModelDescriptor::plain(Service::Groq, GROQ_LLAMA_4_MAVERICK),
    ModelDescriptor::plain(Service::Groq, GROQ_LLAMA_4_SCOUT),
    // Together
    ModelDescriptor::plain(Service::Together, TOGETHER_DEEPSEEK_V3).limit(MaxCompletionTokens(12_288)),
    ModelDescriptor::plain(Service::Together, TOGETHER_LLAMA_4_MAVERICK)
        .limit(MaxCompletionTokens(524_000 - MAX_PROMPT_TOKENS)),
    // Fireworks
    ModelDescriptor::plain(Service::Fireworks, FIREWORKS_LLAMA_4_MAVERICK)
        .limit(MaxCompletionTokens(16_384)),
    ModelDescriptor::plain(Service::Fireworks, FIREWORKS_LLAMA_4_SCOUT).limit(MaxCompletionTokens(16_384)),
    // OpenAI
    ModelDescriptor::plain(Service::OpenAi, OPENAI_O1)
        .limit(MaxCompletionTokens(100_000))
        .text_format()
        .native_tools(),
    ModelDescriptor::plain(Service::OpenAi, OPENAI_O3_MINI)
        .limit(MaxCompletionTokens(100_000))
        .text_format()
        .native_tools(),
    ModelDescriptor::plain(Service::OpenAi, OPENAI_O1_MINI)
        .limit(MaxCompletionTokens(65_536))
        .text_format(),
    ModelDescriptor::plain(Service::OpenAi, OPENAI_GPT_4O),
    // DeepSeek
    ModelDescriptor::plain(Service::Deepseek, DEEPSEEK_R1)
        .limit(MaxTokens(8_192))
        .temperature(1.5)
        .fold_roles(),
    // Perplexity
    ModelDescriptor::plain(Service::Perplexity, PERPLEXITY_SONAR),
    ModelDescriptor::plain(Service::Perplexity, PERPLEXITY_SONAR_PRO),
];

/// Provider-call argument template for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelArgs {
    /// Model identifier sent to the provider.
    pub model: String,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion limit via `max_completion_tokens`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    /// Completion limit via legacy `max_tokens`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Reasoning-effort hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Ask for `response_format: text`.
    pub text_response_format: bool,
    /// Streaming is never requested.
    pub stream: bool,
}

/// A resolved model: identity, budget, call template and handling rules.
///
/// Immutable once resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    /// Service to call.
    pub service: Service,
    /// Prompt tokens above which the run cuts over to a final answer.
    pub max_prompt_tokens: u32,
    /// Provider-call argument template.
    pub args: ModelArgs,
    /// Tool schemas are sent natively and tool calls come back structured.
    pub native_tools: bool,
    /// All turns must be folded into one user message.
    pub fold_roles: bool,
}

impl ModelSpec {
    /// Model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.args.model
    }
}

impl From<&ModelDescriptor> for ModelSpec {
    fn from(d: &ModelDescriptor) -> Self {
        let (max_completion_tokens, max_tokens) = match d.completion_limit {
            Some(MaxCompletionTokens(n)) => (Some(n), None),
            Some(MaxTokens(n)) => (None, Some(n)),
            None => (None, None),
        };
        Self {
            service: d.service,
            max_prompt_tokens: MAX_PROMPT_TOKENS,
            args: ModelArgs {
                model: d.model.to_string(),
                temperature: d.temperature,
                max_completion_tokens,
                max_tokens,
                reasoning_effort: d.reasoning_effort,
                text_response_format: d.text_response_format,
                stream: false,
            },
            native_tools: d.native_tools,
            fold_roles: d.fold_roles,
        }
    }
}

/// Looks up the descriptor for a `(service, model)` pair.
#[must_use]
pub fn descriptor(service: Service, model: &str) -> Option<&'static ModelDescriptor> {
    DESCRIPTORS
        .iter()
        .find(|d| d.service == service && d.model == model)
}

/// Resolves a `(service, model)` pair into a [`ModelSpec`].
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedModel`] when the pair has no descriptor.
/// This is a configuration error; callers must not retry it.
pub fn resolve(service: Service, model: &str) -> Result<ModelSpec, AgentError> {
    descriptor(service, model)
        .map(ModelSpec::from)
        .ok_or_else(|| AgentError::UnsupportedModel {
            service: service.to_string(),
            model: model.to_string(),
        })
}
