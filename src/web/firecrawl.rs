//! Page retrieval over the Firecrawl scrape API.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{SCRAPE_TIMEOUT, capability_error};
use crate::agent::capability::RetrievalCapability;
use crate::error::AgentError;

const DEFAULT_BASE_URL: &str = "https://api.firecrawl.dev/v1";
const NAME: &str = "firecrawl";

#[derive(Debug, Default, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
}

impl ScrapeResponse {
    fn into_markdown(self, url: &str) -> Result<String, AgentError> {
        if !self.success {
            let reason = self.error.unwrap_or_else(|| "scrape unsuccessful".to_string());
            return Err(capability_error(NAME, format!("{url}: {reason}")));
        }
        self.data
            .and_then(|d| d.markdown)
            .ok_or_else(|| capability_error(NAME, format!("{url}: no markdown returned")))
    }
}

/// Firecrawl-backed [`RetrievalCapability`] returning page markdown.
#[derive(Debug, Clone)]
pub struct FirecrawlRetriever {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FirecrawlRetriever {
    /// Creates a retriever.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(SCRAPE_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Overrides the API base.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl RetrievalCapability for FirecrawlRetriever {
    async fn retrieve(&self, url: &str) -> Result<String, AgentError> {
        debug!(url, "firecrawl scrape");
        let timeout_ms = u64::try_from(SCRAPE_TIMEOUT.as_millis()).unwrap_or(u64::MAX);
        let body: ScrapeResponse = self
            .client
            .post(format!("{}/scrape", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&json!({ "url": url, "formats": ["markdown"], "timeout": timeout_ms }))
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|e| capability_error(NAME, e))?
            .json()
            .await
            .map_err(|e| capability_error(NAME, e))?;
        body.into_markdown(url)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ScrapeResponse {
        serde_json::from_str(raw).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn test_markdown_extracted() {
        let body = parse(r##"{"success":true,"data":{"markdown":"# Title"}}"##);
        assert_eq!(
            body.into_markdown("https://x.example").unwrap_or_else(|e| panic!("{e}")),
            "# Title"
        );
    }

    #[test]
    fn test_unsuccessful_scrape_is_error() {
        let body = parse(r#"{"success":false,"error":"blocked"}"#);
        let err = body.into_markdown("https://x.example");
        assert!(matches!(
            err,
            Err(AgentError::Capability { ref message, .. }) if message.contains("blocked")
        ));
    }

    #[test]
    fn test_missing_markdown_is_error() {
        let body = parse(r#"{"success":true,"data":{}}"#);
        assert!(body.into_markdown("u").is_err());
    }
}
