//! Provider registry and factory.
//!
//! Maps configured services to concrete [`LlmProvider`] implementations and
//! the web backends to their clients.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::agent::capability::{RetrievalCapability, SearchCapability, Unconfigured};
use crate::agent::config::ResearchConfig;
use crate::agent::gateway::ModelGateway;
use crate::agent::model::Service;
use crate::agent::pricing::CostMeter;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::AgentError;
use crate::web::{FirecrawlRetriever, PerplexitySearch};

/// Creates the [`LlmProvider`] for `service`.
///
/// Every supported service speaks the `OpenAI` dialect, so they all map to
/// [`OpenAiProvider`] with the service's API base.
///
/// # Errors
///
/// Returns [`AgentError::ApiKeyMissing`] when no key is configured.
pub fn create_provider(
    service: Service,
    config: &ResearchConfig,
) -> Result<Arc<dyn LlmProvider>, AgentError> {
    let api_key = config
        .api_key(service)
        .ok_or_else(|| AgentError::ApiKeyMissing {
            service: service.to_string(),
        })?;
    let base_url = match service {
        Service::Deepseek => config.deepseek_base_url.as_deref(),
        _ => None,
    };
    Ok(Arc::new(OpenAiProvider::new(service, api_key, base_url)))
}

/// Builds a gateway serving every service the config's roles call.
///
/// # Errors
///
/// Returns [`AgentError::ApiKeyMissing`] for the first service without a key.
pub fn create_gateway(config: &ResearchConfig) -> Result<ModelGateway, AgentError> {
    config
        .services()
        .into_iter()
        .try_fold(ModelGateway::new(config.retry), |gateway, service| {
            debug!(%service, "registering provider");
            Ok(gateway.with_provider(service, create_provider(service, config)?))
        })
}

/// Creates the web search backend, charging searches to `meter`.
///
/// Without a Perplexity key every search fails as tool error text.
#[must_use]
pub fn create_search(config: &ResearchConfig, meter: CostMeter) -> Arc<dyn SearchCapability> {
    match config.api_key(Service::Perplexity) {
        Some(key) => Arc::new(
            PerplexitySearch::new(key, &config.search_model, &config.search_context_size)
                .with_cost_meter(meter),
        ),
        None => {
            warn!("no Perplexity API key, web_search is unavailable");
            Arc::new(Unconfigured::new("web_search"))
        }
    }
}

/// Creates the page retrieval backend.
///
/// Without a Firecrawl key every retrieval fails as tool error text.
#[must_use]
pub fn create_retrieval(config: &ResearchConfig) -> Arc<dyn RetrievalCapability> {
    match config.firecrawl_api_key.as_deref() {
        Some(key) => Arc::new(FirecrawlRetriever::new(key)),
        None => {
            warn!("no Firecrawl API key, call_web_content_retriever is unavailable");
            Arc::new(Unconfigured::new("call_web_content_retriever"))
        }
    }
}
