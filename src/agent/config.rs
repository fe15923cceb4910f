//! Research configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.
//! API keys are read here but only checked when providers are created, so a
//! config without keys still builds for runs against stub providers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use super::model::{
    GROQ_QWEN_QWQ, OPENAI_GPT_4O, OPENAI_O1_MINI, PERPLEXITY_SONAR, Service,
};
use super::retry::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF, RetryPolicy};
use crate::error::AgentError;

/// Default passing rating.
const DEFAULT_THRESHOLD: f64 = 1.0;
/// Default equal-score streak that forces a pass.
const DEFAULT_MAX_SAME_SCORE: usize = 3;
/// Default concurrent tool calls.
const DEFAULT_MAX_PARALLEL: usize = 20;
/// Hard iteration cap for one run.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
/// Default follow-up questions per expansion.
const DEFAULT_MAX_EXPANSION_QUESTIONS: usize = 3;
/// Default extra "think twice" rounds.
const DEFAULT_MAX_TEST_TIME_ROUNDS: usize = 2;
/// Default search recency filter.
const DEFAULT_SEARCH_RECENCY: &str = "month";
/// Default Perplexity search context size.
const DEFAULT_SEARCH_CONTEXT_SIZE: &str = "high";
/// Environment variable holding the Firecrawl key.
pub const FIRECRAWL_API_KEY_VAR: &str = "FIRECRAWL_API_KEY";

/// One model role's `(service, model)` choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    /// Service to call.
    pub service: Service,
    /// Model identifier on that service.
    pub model: String,
}

impl ModelChoice {
    /// Creates a choice.
    #[must_use]
    pub fn new(service: Service, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
        }
    }
}

/// The model roles a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    /// The answering model driving the loop.
    Reasoning,
    /// Rubric scorer.
    Judge,
    /// Manager feedback generator.
    Feedback,
    /// Final report writer.
    Summary,
    /// Reasoning expansion question miner.
    Expansion,
    /// `call_research_professional` backend.
    Subquery,
}

impl ModelRole {
    /// All roles.
    pub const ALL: [Self; 6] = [
        Self::Reasoning,
        Self::Judge,
        Self::Feedback,
        Self::Summary,
        Self::Expansion,
        Self::Subquery,
    ];

    const fn env_prefix(self) -> &'static str {
        match self {
            Self::Reasoning => "RESEARCH",
            Self::Judge => "RESEARCH_JUDGE",
            Self::Feedback => "RESEARCH_FEEDBACK",
            Self::Summary => "RESEARCH_SUMMARY",
            Self::Expansion => "RESEARCH_EXPANSION",
            Self::Subquery => "RESEARCH_SUBQUERY",
        }
    }

    fn default_choice(self) -> ModelChoice {
        match self {
            Self::Reasoning => ModelChoice::new(Service::Groq, GROQ_QWEN_QWQ),
            Self::Summary => ModelChoice::new(Service::OpenAi, OPENAI_O1_MINI),
            Self::Judge | Self::Feedback | Self::Expansion | Self::Subquery => {
                ModelChoice::new(Service::OpenAi, OPENAI_GPT_4O)
            }
        }
    }
}

/// Configuration for one research run.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Answering model.
    pub reasoning: ModelChoice,
    /// Judge model.
    pub judge: ModelChoice,
    /// Manager feedback model.
    pub feedback: ModelChoice,
    /// Final report model.
    pub summary: ModelChoice,
    /// Expansion model.
    pub expansion: ModelChoice,
    /// Subquery tool model.
    pub subquery: ModelChoice,
    /// Rating at or above which an answer passes.
    pub threshold: f64,
    /// Equal-score streak that forces a pass. `0` disables it.
    pub max_same_score_retries: usize,
    /// Maximum concurrent tool calls or expansion searches.
    pub max_parallel: usize,
    /// Iteration cap for the loop.
    pub max_iterations: usize,
    /// Retry gate for every upstream call.
    pub retry: RetryPolicy,
    /// Mine hidden reasoning for follow-up questions.
    pub reasoning_expansion: bool,
    /// Follow-up questions per expansion.
    pub max_expansion_questions: usize,
    /// Ask the model to re-answer before scoring.
    pub test_time_scaling: bool,
    /// Extra re-answer rounds.
    pub max_test_time_rounds: usize,
    /// Recency filter for web search.
    pub search_recency: String,
    /// Perplexity model used for web search.
    pub search_model: String,
    /// Perplexity search context size (`low`, `medium`, `high`).
    pub search_context_size: String,
    /// Directory containing prompt template overrides.
    pub prompt_dir: Option<PathBuf>,
    /// API base override for the `DeepSeek` service.
    pub deepseek_base_url: Option<String>,
    /// API keys by service.
    pub api_keys: HashMap<Service, String>,
    /// Firecrawl API key.
    pub firecrawl_api_key: Option<String>,
}

impl ResearchConfig {
    /// Creates a new builder for `ResearchConfig`.
    #[must_use]
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownService`] or [`AgentError::Config`] for
    /// unusable values.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }

    /// The model choice for `role`.
    #[must_use]
    pub const fn choice(&self, role: ModelRole) -> &ModelChoice {
        match role {
            ModelRole::Reasoning => &self.reasoning,
            ModelRole::Judge => &self.judge,
            ModelRole::Feedback => &self.feedback,
            ModelRole::Summary => &self.summary,
            ModelRole::Expansion => &self.expansion,
            ModelRole::Subquery => &self.subquery,
        }
    }

    /// The API key for `service`, if configured.
    #[must_use]
    pub fn api_key(&self, service: Service) -> Option<&str> {
        self.api_keys.get(&service).map(String::as_str)
    }

    /// Services any role calls, deduplicated, in role order.
    #[must_use]
    pub fn services(&self) -> Vec<Service> {
        let mut out = Vec::new();
        for role in ModelRole::ALL {
            let service = self.choice(role).service;
            if !out.contains(&service) {
                out.push(service);
            }
        }
        out
    }
}

/// Builder for [`ResearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct ResearchConfigBuilder {
    services: HashMap<ModelRole, String>,
    models: HashMap<ModelRole, String>,
    threshold: Option<f64>,
    max_same_score_retries: Option<usize>,
    max_parallel: Option<usize>,
    max_iterations: Option<usize>,
    retry_attempts: Option<u32>,
    retry_backoff: Option<Duration>,
    reasoning_expansion: Option<bool>,
    max_expansion_questions: Option<usize>,
    test_time_scaling: Option<bool>,
    max_test_time_rounds: Option<usize>,
    search_recency: Option<String>,
    search_model: Option<String>,
    search_context_size: Option<String>,
    prompt_dir: Option<PathBuf>,
    deepseek_base_url: Option<String>,
    api_keys: HashMap<Service, String>,
    firecrawl_api_key: Option<String>,
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env(key)?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        warn!(key, value = %raw, "ignoring unparsable environment value");
    }
    parsed
}

fn env_flag(key: &str) -> Option<bool> {
    env(key).map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl ResearchConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        for role in ModelRole::ALL {
            let prefix = role.env_prefix();
            if let Some(v) = env(&format!("{prefix}_SERVICE")) {
                self.services.entry(role).or_insert(v);
            }
            if let Some(v) = env(&format!("{prefix}_MODEL")) {
                self.models.entry(role).or_insert(v);
            }
        }
        if self.threshold.is_none() {
            self.threshold = env_parsed("RESEARCH_THRESHOLD");
        }
        if self.max_same_score_retries.is_none() {
            self.max_same_score_retries = env_parsed("RESEARCH_MAX_SAME_SCORE");
        }
        if self.max_parallel.is_none() {
            self.max_parallel = env_parsed("RESEARCH_MAX_PARALLEL");
        }
        if self.retry_attempts.is_none() {
            self.retry_attempts = env_parsed("RESEARCH_RETRY_ATTEMPTS");
        }
        if self.retry_backoff.is_none() {
            self.retry_backoff = env_parsed("RESEARCH_RETRY_WAIT_SECS").map(Duration::from_secs);
        }
        if self.reasoning_expansion.is_none() {
            self.reasoning_expansion = env_flag("RESEARCH_REASONING_EXPANSION");
        }
        if self.test_time_scaling.is_none() {
            self.test_time_scaling = env_flag("RESEARCH_TEST_TIME_SCALING");
        }
        if self.search_recency.is_none() {
            self.search_recency = env("RESEARCH_SEARCH_RECENCY");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = env("RESEARCH_PROMPT_DIR").map(PathBuf::from);
        }
        if self.deepseek_base_url.is_none() {
            self.deepseek_base_url = env("DEEPSEEK_BASE_URL");
        }
        for service in Service::ALL {
            if let Some(key) = env(service.api_key_var()) {
                self.api_keys.entry(service).or_insert(key);
            }
        }
        if self.firecrawl_api_key.is_none() {
            self.firecrawl_api_key = env(FIRECRAWL_API_KEY_VAR);
        }
        self
    }

    /// Sets the service for `role`. Parsed at build time.
    #[must_use]
    pub fn service(mut self, role: ModelRole, service: impl Into<String>) -> Self {
        self.services.insert(role, service.into());
        self
    }

    /// Sets the model for `role`.
    #[must_use]
    pub fn model(mut self, role: ModelRole, model: impl Into<String>) -> Self {
        self.models.insert(role, model.into());
        self
    }

    /// Sets the passing threshold.
    #[must_use]
    pub const fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Sets the equal-score streak that forces a pass.
    #[must_use]
    pub const fn max_same_score_retries(mut self, n: usize) -> Self {
        self.max_same_score_retries = Some(n);
        self
    }

    /// Sets the maximum parallel tool calls.
    #[must_use]
    pub const fn max_parallel(mut self, n: usize) -> Self {
        self.max_parallel = Some(n);
        self
    }

    /// Sets the iteration cap.
    #[must_use]
    pub const fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Sets the retry budget and the fixed pause between attempts.
    #[must_use]
    pub const fn retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.retry_attempts = Some(attempts);
        self.retry_backoff = Some(backoff);
        self
    }

    /// Turns reasoning expansion on or off.
    #[must_use]
    pub const fn reasoning_expansion(mut self, enabled: bool) -> Self {
        self.reasoning_expansion = Some(enabled);
        self
    }

    /// Sets the follow-up questions per expansion.
    #[must_use]
    pub const fn max_expansion_questions(mut self, n: usize) -> Self {
        self.max_expansion_questions = Some(n);
        self
    }

    /// Turns test-time scaling on or off.
    #[must_use]
    pub const fn test_time_scaling(mut self, enabled: bool) -> Self {
        self.test_time_scaling = Some(enabled);
        self
    }

    /// Sets the extra re-answer rounds.
    #[must_use]
    pub const fn max_test_time_rounds(mut self, n: usize) -> Self {
        self.max_test_time_rounds = Some(n);
        self
    }

    /// Sets the search recency filter.
    #[must_use]
    pub fn search_recency(mut self, recency: impl Into<String>) -> Self {
        self.search_recency = Some(recency.into());
        self
    }

    /// Sets the Perplexity search model.
    #[must_use]
    pub fn search_model(mut self, model: impl Into<String>) -> Self {
        self.search_model = Some(model.into());
        self
    }

    /// Sets the Perplexity search context size.
    #[must_use]
    pub fn search_context_size(mut self, size: impl Into<String>) -> Self {
        self.search_context_size = Some(size.into());
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the `DeepSeek` API base.
    #[must_use]
    pub fn deepseek_base_url(mut self, url: impl Into<String>) -> Self {
        self.deepseek_base_url = Some(url.into());
        self
    }

    /// Sets the API key for `service`.
    #[must_use]
    pub fn api_key(mut self, service: Service, key: impl Into<String>) -> Self {
        self.api_keys.insert(service, key.into());
        self
    }

    /// Sets the Firecrawl API key.
    #[must_use]
    pub fn firecrawl_api_key(mut self, key: impl Into<String>) -> Self {
        self.firecrawl_api_key = Some(key.into());
        self
    }

    fn choice(&self, role: ModelRole) -> Result<ModelChoice, AgentError> {
        let default = role.default_choice();
        let service = match self.services.get(&role) {
            Some(name) => name.parse()?,
            None => default.service,
        };
        let model = self.models.get(&role).cloned().unwrap_or(default.model);
        Ok(ModelChoice { service, model })
    }

    /// Builds the [`ResearchConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownService`] for an unrecognised service
    /// name and [`AgentError::Config`] for out-of-range values.
    pub fn build(self) -> Result<ResearchConfig, AgentError> {
        let threshold = self.threshold.unwrap_or(DEFAULT_THRESHOLD);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AgentError::Config {
                message: format!("threshold must be within [0, 1], got {threshold}"),
            });
        }
        let max_parallel = self.max_parallel.unwrap_or(DEFAULT_MAX_PARALLEL);
        if max_parallel == 0 {
            return Err(AgentError::Config {
                message: "max_parallel must be at least 1".to_string(),
            });
        }
        let attempts = self.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS);
        if attempts == 0 {
            return Err(AgentError::Config {
                message: "retry attempts must be at least 1".to_string(),
            });
        }
        let max_iterations = self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS);
        if max_iterations == 0 {
            return Err(AgentError::Config {
                message: "max_iterations must be at least 1".to_string(),
            });
        }

        let reasoning = self.choice(ModelRole::Reasoning)?;
        let mut reasoning_expansion = self.reasoning_expansion.unwrap_or(false);
        if reasoning_expansion && reasoning.service == Service::OpenAi {
            warn!("reasoning expansion disabled: OpenAI does not expose hidden reasoning");
            reasoning_expansion = false;
        }

        Ok(ResearchConfig {
            judge: self.choice(ModelRole::Judge)?,
            feedback: self.choice(ModelRole::Feedback)?,
            summary: self.choice(ModelRole::Summary)?,
            expansion: self.choice(ModelRole::Expansion)?,
            subquery: self.choice(ModelRole::Subquery)?,
            reasoning,
            threshold,
            max_same_score_retries: self
                .max_same_score_retries
                .unwrap_or(DEFAULT_MAX_SAME_SCORE),
            max_parallel,
            max_iterations,
            retry: RetryPolicy::new(attempts, self.retry_backoff.unwrap_or(DEFAULT_RETRY_BACKOFF)),
            reasoning_expansion,
            max_expansion_questions: self
                .max_expansion_questions
                .unwrap_or(DEFAULT_MAX_EXPANSION_QUESTIONS),
            test_time_scaling: self.test_time_scaling.unwrap_or(false),
            max_test_time_rounds: self
                .max_test_time_rounds
                .unwrap_or(DEFAULT_MAX_TEST_TIME_ROUNDS),
            search_recency: self
                .search_recency
                .unwrap_or_else(|| DEFAULT_SEARCH_RECENCY.to_string()),
            search_model: self
                .search_model
                .unwrap_or_else(|| PERPLEXITY_SONAR.to_string()),
            search_context_size: self
                .search_context_size
                .unwrap_or_else(|| DEFAULT_SEARCH_CONTEXT_SIZE.to_string()),
            prompt_dir: self.prompt_dir,
            deepseek_base_url: self.deepseek_base_url,
            api_keys: self.api_keys,
            firecrawl_api_key: self.firecrawl_api_key,
        })
    }
}
