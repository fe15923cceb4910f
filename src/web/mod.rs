//! Concrete search and retrieval backends.
//!
//! Both speak plain JSON over HTTPS. Any transport, status or decoding
//! failure becomes [`AgentError::Capability`], which the tool executor
//! hands to the model as error text.

use std::fmt::Display;
use std::time::Duration;

use crate::error::AgentError;

pub mod firecrawl;
pub mod perplexity;

pub use firecrawl::FirecrawlRetriever;
pub use perplexity::PerplexitySearch;

/// Transport timeout for one search.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(180);
/// Transport timeout for one scrape.
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(180);

fn capability_error(name: &str, err: impl Display) -> AgentError {
    AgentError::Capability {
        name: name.to_string(),
        message: err.to_string(),
    }
}
