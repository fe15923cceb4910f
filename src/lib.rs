//! # deep-research
//!
//! A self-grading research controller. A reasoning model works a question
//! through a bounded tool-using loop (web search, page retrieval, delegated
//! sub-questions); an independent judge scores every finished answer, and
//! a manager model turns low scores into revision feedback until an answer
//! passes, the score stalls, or the budget runs out.
//!
//! ```no_run
//! # async fn demo() -> Result<(), deep_research::AgentError> {
//! let answer = deep_research::run_research(
//!     "What is the capital of France?",
//!     "What is the capital of France?",
//!     "",
//! )
//! .await?;
//! # let _ = answer;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod error;
pub mod web;

pub use agent::{
    INSUFFICIENT_INFORMATION, ModelRole, Orchestrator, ResearchConfig, ResearchOutcome, Service,
    Termination, run_research,
};
pub use error::{AgentError, CommandError, Error, Result};
