//! Web search over the Perplexity chat completions API.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{SEARCH_TIMEOUT, capability_error};
use crate::agent::capability::SearchCapability;
use crate::agent::message::TokenUsage;
use crate::agent::model::Service;
use crate::agent::normalize::strip_hidden_reasoning;
use crate::agent::pricing::{CostMeter, PricingTable};
use crate::error::AgentError;

const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";
const NAME: &str = "perplexity";

#[derive(Debug, Serialize)]
struct SearchMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WebSearchOptions<'a> {
    search_context_size: &'a str,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    model: &'a str,
    messages: [SearchMessage<'a>; 1],
    temperature: f32,
    top_p: f32,
    search_recency_filter: &'a str,
    stream: bool,
    web_search_options: WebSearchOptions<'a>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    choices: Vec<SearchChoice>,
    #[serde(default)]
    citations: Vec<String>,
    #[serde(default)]
    usage: Option<SearchUsage>,
}

#[derive(Debug, Deserialize)]
struct SearchChoice {
    message: SearchChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct SearchChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct SearchUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl SearchResponse {
    /// Answer text with reasoning stripped and citations appended as `[n] url`.
    fn render(&self) -> Result<String, AgentError> {
        let content = self
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| capability_error(NAME, "response has no choices"))?;
        let mut text = strip_hidden_reasoning(content).trim().to_string();
        if !self.citations.is_empty() {
            text.push_str("\n\nCitations:\n");
            let lines: Vec<String> = self
                .citations
                .iter()
                .enumerate()
                .map(|(i, url)| format!("[{}] {url}", i + 1))
                .collect();
            text.push_str(&lines.join("\n"));
        }
        Ok(text)
    }
}

/// Perplexity-backed [`SearchCapability`].
#[derive(Debug, Clone)]
pub struct PerplexitySearch {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    context_size: String,
    cost: Option<CostMeter>,
}

impl PerplexitySearch {
    /// Creates a search client for `model` with the given context size.
    #[must_use]
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        context_size: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(SEARCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            context_size: context_size.into(),
            cost: None,
        }
    }

    /// Overrides the API base.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Charges every search to `meter`.
    #[must_use]
    pub fn with_cost_meter(mut self, meter: CostMeter) -> Self {
        self.cost = Some(meter);
        self
    }

    fn request<'a>(&'a self, query: &'a str, recency: &'a str) -> SearchRequest<'a> {
        SearchRequest {
            model: &self.model,
            messages: [SearchMessage {
                role: "user",
                content: query,
            }],
            temperature: 0.7,
            top_p: 0.9,
            search_recency_filter: recency,
            stream: false,
            web_search_options: WebSearchOptions {
                search_context_size: &self.context_size,
            },
        }
    }

    fn record_usage(&self, usage: Option<SearchUsage>) {
        let (Some(meter), Some(usage)) = (&self.cost, usage) else {
            return;
        };
        let usage = TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.prompt_tokens + usage.completion_tokens,
        };
        meter.record(
            &PricingTable,
            Service::Perplexity,
            &self.model,
            Some(&self.context_size),
            usage,
        );
    }
}

#[async_trait]
impl SearchCapability for PerplexitySearch {
    async fn search(&self, query: &str, recency: &str) -> Result<String, AgentError> {
        debug!(query, recency, model = %self.model, "perplexity search");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&self.request(query, recency))
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|e| capability_error(NAME, e))?;
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| capability_error(NAME, e))?;
        self.record_usage(body.usage);
        body.render()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let search = PerplexitySearch::new("k", "sonar", "high");
        let body = serde_json::to_value(search.request("capital of France", "week"))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(body["model"], "sonar");
        assert_eq!(body["messages"][0]["content"], "capital of France");
        assert_eq!(body["search_recency_filter"], "week");
        assert_eq!(body["web_search_options"]["search_context_size"], "high");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_render_appends_citations() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"<think>look</think>Paris."}}],
                "citations":["https://a.example","https://b.example"]}"#,
        )
        .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            body.render().unwrap_or_else(|e| panic!("{e}")),
            "Paris.\n\nCitations:\n[1] https://a.example\n[2] https://b.example"
        );
    }

    #[test]
    fn test_render_without_choices_is_capability_error() {
        assert!(matches!(
            SearchResponse::default().render(),
            Err(AgentError::Capability { .. })
        ));
    }
}
