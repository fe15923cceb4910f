//! Error types for deep-research-rs.
//!
//! [`AgentError`] covers everything the research controller can surface;
//! [`CommandError`] covers the CLI layer. Both fold into [`Error`].

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Failure inside the research controller or one of its collaborators.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Failure while executing a CLI command.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Errors raised by the research controller, its providers and tools.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The (service, model) pair has no descriptor. Raised before any network call.
    #[error("unsupported service: {service} model: {model}")]
    UnsupportedModel {
        /// Service identifier.
        service: String,
        /// Model identifier.
        model: String,
    },

    /// A service name did not match any known provider.
    #[error("unknown service: {name}")]
    UnknownService {
        /// The name as supplied.
        name: String,
    },

    /// No API key configured for a service that is about to be called.
    #[error("no API key configured for {service}")]
    ApiKeyMissing {
        /// Service that needs the key.
        service: String,
    },

    /// Transport, auth or upstream failure from a chat completion call.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Upstream error text.
        message: String,
        /// HTTP status, when the transport reported one.
        status: Option<u16>,
    },

    /// The retry gate gave up.
    #[error("{operation} failed after {attempts} attempt(s): {message}")]
    RetriesExhausted {
        /// Label of the gated operation.
        operation: String,
        /// Attempts made.
        attempts: u32,
        /// The final error's text.
        message: String,
    },

    /// A search, retrieval or subquery backend failed.
    #[error("{name} failed: {message}")]
    Capability {
        /// Capability or tool name.
        name: String,
        /// Failure detail.
        message: String,
    },

    /// A model response could not be interpreted.
    #[error("failed to parse response: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// The offending content, truncated for logging.
        content: String,
    },

    /// Invalid configuration values.
    #[error("invalid configuration: {message}")]
    Config {
        /// Which value was rejected and why.
        message: String,
    },

    /// Controller-level failure (task join, semaphore, empty input).
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Failure detail.
        message: String,
    },
}

impl AgentError {
    /// Returns `true` for failures worth retrying at a fixed interval.
    ///
    /// Configuration errors (unsupported pairs, missing keys, bad values)
    /// fail the same way every time and are surfaced immediately.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ApiRequest { .. } | Self::Capability { .. } | Self::ResponseParse { .. }
        )
    }
}

/// Errors raised while executing CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Filesystem failure on an input or output path.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being read or written.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The command ran but failed.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be rendered in the requested format.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_model_message() {
        let err = AgentError::UnsupportedModel {
            service: "groq".to_string(),
            model: "o1".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported service: groq model: o1");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_api_request_is_retryable() {
        let err = AgentError::ApiRequest {
            message: "429 Too Many Requests".to_string(),
            status: Some(429),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_missing_key_not_retryable() {
        let err = AgentError::ApiKeyMissing {
            service: "openai".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_wraps_agent_error() {
        let err: Error = AgentError::Orchestration {
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "orchestration error: boom");
    }
}
