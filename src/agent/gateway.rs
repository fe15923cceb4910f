//! Single choke point for every chat completion the run makes.
//!
//! The gateway picks the provider for a [`ModelSpec`]'s service, shapes
//! the request the way that model needs it (role folding, native tool
//! schemas), runs it through the retry gate and meters its cost.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::message::{ChatMessage, ChatRequest, ChatResponse, fold_into_user_message};
use super::model::{ModelSpec, Service};
use super::pricing::{CostMeter, PricingLookup, PricingTable};
use super::provider::LlmProvider;
use super::retry::RetryPolicy;
use super::tool::ToolDefinition;
use crate::error::AgentError;

/// Routes chat completions to per-service providers.
pub struct ModelGateway {
    providers: HashMap<Service, Arc<dyn LlmProvider>>,
    retry: RetryPolicy,
    pricing: Arc<dyn PricingLookup>,
    cost: CostMeter,
}

impl ModelGateway {
    /// Creates a gateway with no providers and the compiled-in price table.
    #[must_use]
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            providers: HashMap::new(),
            retry,
            pricing: Arc::new(PricingTable),
            cost: CostMeter::new(),
        }
    }

    /// Registers the provider that serves `service`.
    #[must_use]
    pub fn with_provider(mut self, service: Service, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(service, provider);
        self
    }

    /// Replaces the price table.
    #[must_use]
    pub fn with_pricing(mut self, pricing: Arc<dyn PricingLookup>) -> Self {
        self.pricing = pricing;
        self
    }

    /// Shares an existing cost meter instead of starting a fresh one.
    #[must_use]
    pub fn with_cost_meter(mut self, meter: CostMeter) -> Self {
        self.cost = meter;
        self
    }

    /// Returns `true` when a provider is registered for `service`.
    #[must_use]
    pub fn serves(&self, service: Service) -> bool {
        self.providers.contains_key(&service)
    }

    /// The run's cost meter.
    #[must_use]
    pub const fn cost_meter(&self) -> &CostMeter {
        &self.cost
    }

    /// The price table in use.
    #[must_use]
    pub fn pricing(&self) -> Arc<dyn PricingLookup> {
        Arc::clone(&self.pricing)
    }

    /// Builds the request `spec` expects for this conversation.
    ///
    /// Folds all turns into one user message when the model requires it and
    /// drops tool schemas for models that cannot take them natively.
    #[must_use]
    pub fn build_request(
        spec: &ModelSpec,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> ChatRequest {
        let messages = if spec.fold_roles {
            vec![fold_into_user_message(messages)]
        } else {
            messages.to_vec()
        };
        let tools = if spec.native_tools {
            tools.to_vec()
        } else {
            Vec::new()
        };
        ChatRequest {
            args: spec.args.clone(),
            messages,
            tools,
        }
    }

    /// Sends one chat completion for `spec`, retrying transient failures.
    ///
    /// `label` names the call in logs and retry errors.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] when no provider serves the
    /// spec's service, or the retry gate's error.
    pub async fn complete(
        &self,
        label: &str,
        spec: &ModelSpec,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, AgentError> {
        let provider = self
            .providers
            .get(&spec.service)
            .ok_or_else(|| AgentError::ApiKeyMissing {
                service: spec.service.to_string(),
            })?
            .as_ref();

        let request = Self::build_request(spec, messages, tools);
        let request = &request;
        let response = self
            .retry
            .run(label, move || provider.chat(request))
            .await?;

        debug!(
            call = label,
            service = %spec.service,
            model = spec.model(),
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            finish_reason = ?response.finish_reason,
            "completion received"
        );
        self.cost.record(
            self.pricing.as_ref(),
            spec.service,
            spec.model(),
            None,
            response.usage,
        );

        Ok(response)
    }
}

impl std::fmt::Debug for ModelGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut services: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        services.sort_unstable();
        f.debug_struct("ModelGateway")
            .field("services", &services)
            .field("retry", &self.retry)
            .field("cost", &self.cost.total())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message::{Role, TokenUsage, system_message, user_message};
    use crate::agent::model::{self, DEEPSEEK_R1, OPENAI_GPT_4O, OPENAI_O3_MINI};
    use crate::agent::tool::ToolSet;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records requests and fails the first `failures` calls.
    struct RecordingProvider {
        failures: usize,
        calls: AtomicUsize,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl RecordingProvider {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for RecordingProvider {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(request.clone());
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(AgentError::ApiRequest {
                    message: "rate limited".to_string(),
                    status: Some(429),
                });
            }
            Ok(ChatResponse {
                content: "ok".to_string(),
                usage: TokenUsage {
                    prompt_tokens: 1_000_000,
                    completion_tokens: 0,
                    total_tokens: 1_000_000,
                },
                ..ChatResponse::default()
            })
        }
    }

    fn spec(service: Service, id: &str) -> ModelSpec {
        model::resolve(service, id).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn test_build_request_folds_roles() {
        let request = ModelGateway::build_request(
            &spec(Service::Deepseek, DEEPSEEK_R1),
            &[system_message("rules"), user_message("question")],
            &[],
        );
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert!(request.messages[0].content.contains("[SYSTEM]:"));
        assert!(request.messages[0].content.contains("[USER]:"));
    }

    #[test]
    fn test_build_request_tools_only_for_native_models() {
        let tools = ToolSet::research_tools();
        let native = ModelGateway::build_request(
            &spec(Service::OpenAi, OPENAI_O3_MINI),
            &[user_message("q")],
            tools.definitions(),
        );
        let plain = ModelGateway::build_request(
            &spec(Service::OpenAi, OPENAI_GPT_4O),
            &[user_message("q")],
            tools.definitions(),
        );
        assert_eq!(native.tools.len(), 3);
        assert!(plain.tools.is_empty());
    }

    #[tokio::test]
    async fn test_complete_without_provider_fails_fast() {
        let gateway = ModelGateway::new(RetryPolicy::default());
        let err = gateway
            .complete("chat", &spec(Service::OpenAi, OPENAI_GPT_4O), &[], &[])
            .await;
        assert!(matches!(err, Err(AgentError::ApiKeyMissing { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_retries_and_meters_cost() {
        let provider = Arc::new(RecordingProvider::new(2));
        let gateway = ModelGateway::new(RetryPolicy::new(3, Duration::from_secs(20)))
            .with_provider(Service::OpenAi, Arc::clone(&provider) as Arc<dyn LlmProvider>);

        let response = gateway
            .complete(
                "chat",
                &spec(Service::OpenAi, OPENAI_GPT_4O),
                &[user_message("q")],
                &[],
            )
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(response.content, "ok");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert!((gateway.cost_meter().total() - 2.5).abs() < 1e-9);
    }
}
