//! Orchestrator for the self-grading research loop.
//!
//! Drives the answering model through a bounded ReAct loop: each iteration
//! sends the conversation, dispatches any requested tools, and once the
//! model stops with an answer, has an independent judge score it. Failing
//! answers are revised under manager feedback until one passes, the score
//! stalls, the token budget forces a cutover, or the iteration cap runs out.
//!
//! # Architecture
//!
//! ```text
//! question → Orchestrator
//!   ├── answering model (via ModelGateway + retry gate)
//!   ├── normalize → tool calls → WorkerPool fan-out → Conversation
//!   ├── ReasoningExpander (optional) → trusted Q/A turns
//!   ├── JudgeAgent → ConvergenceEngine verdict
//!   │     ├── Rollback: drop last answer, go again
//!   │     └── Revise: ManagerAgent feedback → next user turn
//!   └── Pass → SynthesizerAgent → final report
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::capability::{RetrievalCapability, SearchCapability, Unconfigured};
use super::client;
use super::config::{ModelChoice, ModelRole, ResearchConfig};
use super::convergence::{ConvergenceEngine, ConvergencePolicy, Verdict};
use super::conversation::{Context, Conversation};
use super::dispatch::{DispatchTarget, dispatch_tool_calls};
use super::executor::ToolExecutor;
use super::expansion::ReasoningExpander;
use super::feedback::ManagerAgent;
use super::gateway::ModelGateway;
use super::judge::JudgeAgent;
use super::message::{FinishReason, system_message, user_message};
use super::model::{self, ModelSpec};
use super::normalize::normalize;
use super::pool::WorkerPool;
use super::prompt::{PromptSet, current_datetime_header, reanswer_prompt, revise_prompt};
use super::subquery::SubqueryAgent;
use super::synthesizer::SynthesizerAgent;
use super::tool::ToolSet;
use super::transcript::{self, TranscriptKind, TranscriptSink};
use crate::error::AgentError;

/// Answer returned when the loop ends without a usable answer.
pub const INSUFFICIENT_INFORMATION: &str = "insufficient information to complete request";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The judge passed an answer and the report was synthesized.
    Passed,
    /// The score stalled and the answer was accepted anyway.
    ForcedPass,
    /// The prompt outgrew the token budget; the next answer was taken as final.
    TokenCutover,
    /// The model ended without `stop` but produced text, which is returned.
    Unscored,
    /// The model was cut off (length or content filter).
    Truncated,
    /// The iteration cap ran out.
    IterationBudget,
}

impl Termination {
    /// Short label for summaries and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::ForcedPass => "forced_pass",
            Self::TokenCutover => "token_cutover",
            Self::Unscored => "unscored",
            Self::Truncated => "truncated",
            Self::IterationBudget => "iteration_budget",
        }
    }
}

/// Result of one research run.
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    /// Final answer text, or [`INSUFFICIENT_INFORMATION`].
    pub answer: String,
    /// How the run ended.
    pub termination: Termination,
    /// Calls made to the answering model.
    pub iterations: usize,
    /// Ratings kept after rollbacks.
    pub scores: Vec<f64>,
    /// Advisory spend in USD.
    pub cost_usd: f64,
    /// Wall-clock time.
    pub elapsed: Duration,
}

/// Resolved model for every role, checked before any network call.
#[derive(Debug, Clone)]
struct RoleSpecs {
    reasoning: ModelSpec,
    judge: ModelSpec,
    feedback: ModelSpec,
    summary: ModelSpec,
    expansion: ModelSpec,
    subquery: ModelSpec,
}

impl RoleSpecs {
    fn resolve(config: &ResearchConfig) -> Result<Self, AgentError> {
        let spec = |c: &ModelChoice| model::resolve(c.service, &c.model);
        Ok(Self {
            reasoning: spec(&config.reasoning)?,
            judge: spec(&config.judge)?,
            feedback: spec(&config.feedback)?,
            summary: spec(&config.summary)?,
            expansion: spec(&config.expansion)?,
            subquery: spec(&config.subquery)?,
        })
    }
}

/// Orchestrates one research run.
pub struct Orchestrator {
    gateway: Arc<ModelGateway>,
    config: ResearchConfig,
    prompts: PromptSet,
    specs: RoleSpecs,
    tools: ToolSet,
    search: Arc<dyn SearchCapability>,
    retrieval: Arc<dyn RetrievalCapability>,
    transcript: TranscriptSink,
}

impl Orchestrator {
    /// Creates an orchestrator over `gateway`.
    ///
    /// Every role's `(service, model)` pair is resolved here, so an
    /// unsupported pair fails before anything is sent. Prompts load from
    /// [`ResearchConfig::prompt_dir`]; search and retrieval start
    /// unconfigured.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnsupportedModel`] for any unsupported pair.
    pub fn new(gateway: ModelGateway, config: ResearchConfig) -> Result<Self, AgentError> {
        let specs = RoleSpecs::resolve(&config)?;
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Ok(Self {
            gateway: Arc::new(gateway),
            config,
            prompts,
            specs,
            tools: ToolSet::research_tools(),
            search: Arc::new(Unconfigured::new("web_search")),
            retrieval: Arc::new(Unconfigured::new("call_web_content_retriever")),
            transcript: transcript::discard(),
        })
    }

    /// Creates an orchestrator with real providers and web backends.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnsupportedModel`] before checking keys, then
    /// [`AgentError::ApiKeyMissing`] for a role whose service has no key.
    pub fn from_config(config: ResearchConfig) -> Result<Self, AgentError> {
        RoleSpecs::resolve(&config)?;
        let gateway = client::create_gateway(&config)?;
        let search = client::create_search(&config, gateway.cost_meter().clone());
        let retrieval = client::create_retrieval(&config);
        Ok(Self::new(gateway, config)?
            .with_search(search)
            .with_retrieval(retrieval))
    }

    /// Replaces the search backend.
    #[must_use]
    pub fn with_search(mut self, search: Arc<dyn SearchCapability>) -> Self {
        self.search = search;
        self
    }

    /// Replaces the retrieval backend.
    #[must_use]
    pub fn with_retrieval(mut self, retrieval: Arc<dyn RetrievalCapability>) -> Self {
        self.retrieval = retrieval;
        self
    }

    /// Replaces the prompt templates.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Streams intermediate steps to `sink`.
    #[must_use]
    pub fn with_transcript(mut self, sink: TranscriptSink) -> Self {
        self.transcript = sink;
        self
    }

    /// The configuration in force.
    #[must_use]
    pub const fn config(&self) -> &ResearchConfig {
        &self.config
    }

    fn executor(&self) -> ToolExecutor {
        let subquery = SubqueryAgent::new(self.specs.subquery.clone(), Arc::clone(&self.gateway));
        ToolExecutor::new(
            Arc::clone(&self.search),
            Arc::clone(&self.retrieval),
            Arc::new(subquery),
            self.config.search_recency.clone(),
        )
    }

    fn seed(&self, prompt: &str) -> Conversation {
        let mut conversation = Conversation::new();
        if !self.specs.reasoning.native_tools {
            let tools = self.tools.to_prompt_json();
            conversation.push(system_message(&self.prompts.tool_instructions(&tools)));
        }
        conversation.push(user_message(&format!(
            "{}\n{prompt}",
            current_datetime_header()
        )));
        conversation
    }

    fn notice(&self, text: &str) {
        (self.transcript)(TranscriptKind::Notice, text);
    }

    /// Runs the loop for `question`, starting from `seed_prompt`.
    ///
    /// `question` is what the judge grades against; `seed_prompt` is the
    /// first user turn (often the question wrapped in a persona).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] for an empty question and
    /// propagates upstream failures that outlast the retry gate. Running out
    /// of iterations is not an error.
    #[allow(clippy::too_many_lines)]
    pub async fn run(
        &self,
        question: &str,
        seed_prompt: &str,
    ) -> Result<ResearchOutcome, AgentError> {
        if question.trim().is_empty() {
            return Err(AgentError::Orchestration {
                message: "Question cannot be empty".to_string(),
            });
        }
        let seed_prompt = if seed_prompt.trim().is_empty() {
            question
        } else {
            seed_prompt
        };

        let start = Instant::now();
        let spec = &self.specs.reasoning;
        let pool = WorkerPool::new(self.config.max_parallel);
        let executor = self.executor();
        let target = DispatchTarget::new(
            self.seed(seed_prompt).into_shared(),
            Context::new().into_shared(),
            Arc::clone(&self.transcript),
        );
        let judge = JudgeAgent::new(self.specs.judge.clone(), self.prompts.judge.clone());
        let manager = ManagerAgent::new(
            self.specs.feedback.clone(),
            self.prompts.manager_feedback.clone(),
        );
        let expander = self.config.reasoning_expansion.then(|| {
            ReasoningExpander::new(
                self.specs.expansion.clone(),
                self.prompts.clone(),
                self.config.max_expansion_questions,
            )
        });
        let mut engine = ConvergenceEngine::new(ConvergencePolicy {
            threshold: self.config.threshold,
            max_same_score_retries: self.config.max_same_score_retries,
        });
        let mut cutover = false;
        let mut reanswer_rounds = 0;
        let mut reanswer_prompt_at: Option<usize> = None;

        let finish = |answer: String,
                      termination: Termination,
                      iterations: usize,
                      engine: &ConvergenceEngine| {
            let outcome = ResearchOutcome {
                answer,
                termination,
                iterations,
                scores: engine.scores().scores().to_vec(),
                cost_usd: self.gateway.cost_meter().total(),
                elapsed: start.elapsed(),
            };
            info!(
                termination = termination.as_str(),
                iterations,
                cost_usd = outcome.cost_usd,
                elapsed_ms = u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
                "research finished"
            );
            (self.transcript)(TranscriptKind::FinalAnswer, &outcome.answer);
            outcome
        };

        let mut iteration = 0;
        while iteration < self.config.max_iterations {
            iteration += 1;
            info!(iteration, service = %spec.service, model = spec.model(), "reasoning iteration");

            let messages = target.conversation.lock().await.messages().to_vec();
            let response = self
                .gateway
                .complete("reasoning", spec, &messages, self.tools.definitions())
                .await?;

            if !cutover && response.usage.prompt_tokens > spec.max_prompt_tokens {
                warn!(
                    prompt_tokens = response.usage.prompt_tokens,
                    budget = spec.max_prompt_tokens,
                    "token budget exceeded, cutting over to final answer"
                );
                cutover = true;
                target
                    .conversation
                    .lock()
                    .await
                    .push(user_message(&self.prompts.token_cutover(question)));
                self.notice("Token budget exceeded; requesting final answer.");
                continue;
            }

            // Messages this turn wrote: hidden reasoning, then the visible answer.
            let (turn, mut answer_span) = {
                let mut conv = target.conversation.lock().await;
                let start = conv.len();
                let turn = normalize(&response, &mut conv);
                (turn, start..conv.len())
            };
            if let Some(reasoning) = &turn.reasoning {
                (self.transcript)(TranscriptKind::Reasoning, reasoning);
            }
            if !turn.visible.is_empty() {
                (self.transcript)(TranscriptKind::Assistant, &turn.visible);
            }

            if let (Some(expander), Some(reasoning)) = (&expander, &turn.reasoning) {
                if let Err(e) = expander
                    .expand(
                        &self.gateway,
                        reasoning,
                        &turn.tool_calls,
                        &executor,
                        pool,
                        &target,
                    )
                    .await
                {
                    warn!(error = %e, "reasoning expansion failed, continuing without it");
                }
            }

            if !turn.tool_calls.is_empty() {
                let results =
                    dispatch_tool_calls(turn.tool_calls, turn.native_calls, &executor, pool, &target)
                        .await;
                debug!(iteration, results = results.len(), "tool results merged");
                continue;
            }

            match response.finish_reason {
                Some(FinishReason::Stop) => {}
                Some(ref reason) if reason.is_truncation() => {
                    warn!(iteration, ?reason, "model output truncated, giving up");
                    return Ok(finish(
                        INSUFFICIENT_INFORMATION.to_string(),
                        Termination::Truncated,
                        iteration,
                        &engine,
                    ));
                }
                _ => {
                    if turn.visible.trim().is_empty() {
                        continue;
                    }
                    return Ok(finish(
                        turn.visible,
                        Termination::Unscored,
                        iteration,
                        &engine,
                    ));
                }
            }

            if cutover {
                return Ok(finish(
                    turn.visible,
                    Termination::TokenCutover,
                    iteration,
                    &engine,
                ));
            }

            if self.config.test_time_scaling && !turn.visible.is_empty() {
                let mut conv = target.conversation.lock().await;
                if reanswer_rounds <= self.config.max_test_time_rounds {
                    reanswer_rounds += 1;
                    conv.remove_span(answer_span);
                    if let Some(prompt) = reanswer_prompt_at.take() {
                        conv.remove(prompt);
                    }
                    reanswer_prompt_at = Some(conv.len());
                    conv.push(user_message(&reanswer_prompt(&turn.visible)));
                    debug!(iteration, round = reanswer_rounds, "test-time scaling: re-answer");
                    continue;
                }
                // Keep the last answer; drop the re-answer request before it.
                if let Some(prompt) = reanswer_prompt_at.take() {
                    conv.remove(prompt);
                    if prompt < answer_span.start {
                        answer_span = answer_span.start - 1..answer_span.end - 1;
                    }
                }
                reanswer_rounds = 0;
            }

            let messages = target.conversation.lock().await.messages().to_vec();
            let judgement = judge.judge(&self.gateway, question, &messages).await?;
            (self.transcript)(TranscriptKind::Judge, &judgement.raw);

            match engine.record(judgement.rating()) {
                Verdict::Pass { forced } => {
                    let report = SynthesizerAgent::new(
                        self.specs.summary.clone(),
                        self.prompts.final_report.clone(),
                    )
                    .synthesize(&self.gateway, question, &messages)
                    .await?;
                    let termination = if forced {
                        Termination::ForcedPass
                    } else {
                        Termination::Passed
                    };
                    return Ok(finish(report, termination, iteration, &engine));
                }
                Verdict::Rollback => {
                    target.conversation.lock().await.remove_span(answer_span);
                    self.notice("Score did not improve; retrying the last answer once.");
                }
                Verdict::Revise(severity) => {
                    let judge_feedback = judgement.feedback();
                    let feedback = manager
                        .feedback(&self.gateway, question, engine.scores(), &judge_feedback)
                        .await?;
                    (self.transcript)(TranscriptKind::Feedback, &feedback);
                    target.conversation.lock().await.push(user_message(&revise_prompt(
                        severity,
                        &feedback,
                        &judge_feedback,
                    )));
                }
            }
        }

        warn!(iterations = iteration, "iteration budget exhausted");
        Ok(finish(
            INSUFFICIENT_INFORMATION.to_string(),
            Termination::IterationBudget,
            iteration,
            &engine,
        ))
    }
}

/// Runs one research loop with configuration from the environment.
///
/// `model_version` overrides the answering model on the configured
/// reasoning service; pass `""` to keep the configured model.
///
/// # Errors
///
/// Returns [`AgentError`] for configuration problems or upstream failures
/// that outlast the retry gate.
pub async fn run_research(
    question: &str,
    seed_prompt: &str,
    model_version: &str,
) -> Result<String, AgentError> {
    let mut builder = ResearchConfig::builder();
    if !model_version.trim().is_empty() {
        builder = builder.model(ModelRole::Reasoning, model_version.trim());
    }
    let config = builder.from_env().build()?;
    let outcome = Orchestrator::from_config(config)?
        .run(question, seed_prompt)
        .await?;
    Ok(outcome.answer)
}
