//! Self-grading research agent.
//!
//! An answering model works a question through a bounded tool-using loop.
//! An independent judge scores each finished answer, and a manager model
//! turns low scores into revision feedback. All models are reached through
//! `OpenAI`-compatible chat APIs.
//!
//! # Architecture
//!
//! ```text
//! question → Orchestrator
//!   ├── ModelGateway (provider per service, retry gate, cost meter)
//!   ├── normalize → ToolExecutor (search / retrieve / subquery)
//!   ├── ReasoningExpander (optional)
//!   ├── JudgeAgent → ConvergenceEngine → ManagerAgent
//!   └── SynthesizerAgent → final report
//! ```

pub mod capability;
pub mod client;
pub mod config;
pub mod convergence;
pub mod conversation;
pub mod dispatch;
pub mod executor;
pub mod expansion;
pub mod feedback;
pub mod gateway;
pub mod judge;
pub mod message;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod pool;
pub mod pricing;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod rating;
pub mod retry;
pub mod subquery;
pub mod synthesizer;
pub mod tool;
pub mod traits;
pub mod transcript;

#[cfg(test)]
mod testing;

// Re-export key types
pub use capability::{RetrievalCapability, SearchCapability, SubqueryCapability};
pub use config::{ModelChoice, ModelRole, ResearchConfig, ResearchConfigBuilder};
pub use convergence::{ConvergenceEngine, ConvergencePolicy, ScoreRecord, Severity, Verdict};
pub use conversation::{Context, Conversation};
pub use gateway::ModelGateway;
pub use judge::{JudgeAgent, Judgement};
pub use message::{ChatMessage, ChatRequest, ChatResponse, FinishReason, Role, TokenUsage};
pub use model::{ModelSpec, Service};
pub use orchestrator::{
    INSUFFICIENT_INFORMATION, Orchestrator, ResearchOutcome, Termination, run_research,
};
pub use pricing::CostMeter;
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use rating::{Evaluation, RatingParse, parse_rating};
pub use retry::RetryPolicy;
pub use synthesizer::SynthesizerAgent;
pub use tool::{ToolCall, ToolDefinition, ToolResult, ToolSet};
pub use traits::{Agent, AgentResponse};
pub use transcript::{TranscriptKind, TranscriptSink};
