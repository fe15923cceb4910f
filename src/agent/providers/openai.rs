//! OpenAI-compatible provider implementation using the `async-openai` crate.
//!
//! Every supported service (`OpenAI`, Groq, Together, Fireworks, `DeepSeek`,
//! Perplexity) speaks the `OpenAI` chat completion dialect, so one provider
//! type serves them all with a per-service base URL. `DeepSeek` returns its
//! reasoning in a `reasoning_content` field the SDK response type drops, so
//! its replies are decoded from the raw body instead.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, CompletionUsage, CreateChatCompletionResponse, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
    ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent, ChatCompletionTool,
    ChatCompletionToolType, CreateChatCompletionRequest, FinishReason as SdkFinishReason,
    FunctionCall, FunctionObject, ReasoningEffort as SdkReasoningEffort, ResponseFormat,
};
use async_trait::async_trait;
use reqwest::{Response, header};
use serde::Deserialize;
use tracing::debug;

use crate::agent::message::{
    ChatMessage, ChatRequest, ChatResponse, FinishReason, Role, TokenUsage,
};
use crate::agent::model::{ReasoningEffort, Service};
use crate::agent::provider::LlmProvider;
use crate::agent::tool::ToolCall;
use crate::error::AgentError;

/// Transport timeout for raw completion calls.
const RAW_TIMEOUT: Duration = Duration::from_secs(600);

/// How a provider reaches its service.
enum Transport {
    Sdk(Client<OpenAIConfig>),
    /// Plain HTTP, for services whose replies carry fields the SDK drops.
    Raw {
        http: reqwest::Client,
        api_key: String,
        base_url: String,
    },
}

/// Chat completion body including the `reasoning_content` extension.
#[derive(Debug, Deserialize)]
struct ReasoningCompletion {
    #[serde(default)]
    choices: Vec<ReasoningChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ReasoningChoice {
    message: ReasoningMessage,
    #[serde(default)]
    finish_reason: Option<SdkFinishReason>,
}

#[derive(Debug, Deserialize)]
struct ReasoningMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatCompletionMessageToolCall>>,
}

impl ReasoningCompletion {
    fn into_response(self) -> ChatResponse {
        let usage = convert_usage(self.usage);
        let Some(choice) = self.choices.into_iter().next() else {
            return ChatResponse {
                usage,
                ..ChatResponse::default()
            };
        };
        ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            reasoning: choice
                .message
                .reasoning_content
                .filter(|r| !r.trim().is_empty()),
            usage,
            tool_calls: convert_tool_calls(choice.message.tool_calls.as_deref()),
            finish_reason: choice
                .finish_reason
                .as_ref()
                .map(OpenAiProvider::convert_finish_reason),
        }
    }
}

fn convert_tool_calls(calls: Option<&[ChatCompletionMessageToolCall]>) -> Vec<ToolCall> {
    calls
        .unwrap_or_default()
        .iter()
        .map(|tc| ToolCall {
            id: tc.id.clone(),
            name: tc.function.name.clone(),
            arguments: tc.function.arguments.clone(),
        })
        .collect()
}

fn convert_usage(usage: Option<CompletionUsage>) -> TokenUsage {
    usage.map_or_else(TokenUsage::default, |u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    })
}

/// OpenAI-compatible LLM provider bound to one service.
pub struct OpenAiProvider {
    service: Service,
    transport: Transport,
}

impl OpenAiProvider {
    /// Creates a provider for `service`.
    ///
    /// `base_url` overrides the service's default API base.
    #[must_use]
    pub fn new(service: Service, api_key: &str, base_url: Option<&str>) -> Self {
        let base = base_url.or_else(|| service.default_base_url());
        if service == Service::Deepseek {
            return Self {
                service,
                transport: Transport::Raw {
                    http: reqwest::Client::builder()
                        .timeout(RAW_TIMEOUT)
                        .build()
                        .unwrap_or_default(),
                    api_key: api_key.to_string(),
                    base_url: base.unwrap_or_default().trim_end_matches('/').to_string(),
                },
            };
        }

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);

        if let Some(base) = base {
            openai_config = openai_config.with_api_base(base);
        }

        // Rate-limit retries belong to the fixed-interval gate, not the SDK.
        let no_retry = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::ZERO),
            ..backoff::ExponentialBackoff::default()
        };

        Self {
            service,
            transport: Transport::Sdk(Client::with_config(openai_config).with_backoff(no_retry)),
        }
    }

    /// Converts our message type to the `OpenAI` SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            Role::Assistant => {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|tc| ChatCompletionMessageToolCall {
                                id: tc.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };

                let content = if msg.content.is_empty() {
                    None
                } else {
                    Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    ))
                };

                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content,
                    name: None,
                    tool_calls,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
            Role::Tool => ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
                content: ChatCompletionRequestToolMessageContent::Text(msg.content.clone()),
                tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
            }),
        }
    }

    const fn convert_effort(effort: ReasoningEffort) -> SdkReasoningEffort {
        match effort {
            ReasoningEffort::Low => SdkReasoningEffort::Low,
            ReasoningEffort::Medium => SdkReasoningEffort::Medium,
            ReasoningEffort::High => SdkReasoningEffort::High,
        }
    }

    const fn convert_finish_reason(reason: &SdkFinishReason) -> FinishReason {
        match reason {
            SdkFinishReason::Stop => FinishReason::Stop,
            SdkFinishReason::Length => FinishReason::Length,
            SdkFinishReason::ContentFilter => FinishReason::ContentFilter,
            SdkFinishReason::ToolCalls | SdkFinishReason::FunctionCall => FinishReason::ToolCalls,
        }
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();
        let args = &request.args;

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|td| ChatCompletionTool {
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionObject {
                            name: td.name.clone(),
                            description: Some(td.description.clone()),
                            parameters: Some(td.parameters.clone()),
                            strict: None,
                        },
                    })
                    .collect(),
            )
        };

        #[allow(deprecated)]
        CreateChatCompletionRequest {
            model: args.model.clone(),
            messages,
            temperature: args.temperature,
            max_completion_tokens: args.max_completion_tokens,
            max_tokens: args.max_tokens,
            reasoning_effort: args.reasoning_effort.map(Self::convert_effort),
            response_format: args.text_response_format.then_some(ResponseFormat::Text),
            stream: Some(args.stream),
            tools,
            ..Default::default()
        }
    }

    fn convert_error(err: &OpenAIError) -> AgentError {
        let status = match err {
            OpenAIError::Reqwest(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        };
        AgentError::ApiRequest {
            message: err.to_string(),
            status,
        }
    }

    fn convert_http_error(err: &reqwest::Error) -> AgentError {
        AgentError::ApiRequest {
            message: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
        }
    }

    fn convert_response(response: CreateChatCompletionResponse) -> ChatResponse {
        let usage = convert_usage(response.usage);
        let Some(choice) = response.choices.into_iter().next() else {
            return ChatResponse {
                usage,
                ..ChatResponse::default()
            };
        };
        ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            reasoning: None,
            usage,
            tool_calls: convert_tool_calls(choice.message.tool_calls.as_deref()),
            finish_reason: choice
                .finish_reason
                .as_ref()
                .map(Self::convert_finish_reason),
        }
    }

    async fn post_raw(
        http: &reqwest::Client,
        api_key: &str,
        base_url: &str,
        request: &CreateChatCompletionRequest,
    ) -> Result<ChatResponse, AgentError> {
        let body: ReasoningCompletion = http
            .post(format!("{base_url}/chat/completions"))
            .header(header::AUTHORIZATION, format!("Bearer {api_key}"))
            .json(request)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|e| Self::convert_http_error(&e))?
            .json()
            .await
            .map_err(|e| Self::convert_http_error(&e))?;
        Ok(body.into_response())
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("service", &self.service)
            .field(
                "transport",
                &match self.transport {
                    Transport::Sdk(_) => "<async-openai::Client>",
                    Transport::Raw { .. } => "<reqwest::Client>",
                },
            )
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        self.service.as_str()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let openai_request = Self::build_request(request);
        debug!(
            service = %self.service,
            model = %request.args.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat completion"
        );

        match &self.transport {
            Transport::Sdk(client) => client
                .chat()
                .create(openai_request)
                .await
                .map(Self::convert_response)
                .map_err(|e| Self::convert_error(&e)),
            Transport::Raw {
                http,
                api_key,
                base_url,
            } => Self::post_raw(http, api_key, base_url, &openai_request).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message;
    use crate::agent::model::{self, OPENAI_GPT_4O, OPENAI_O3_MINI, DEEPSEEK_R1};
    use crate::agent::tool::ToolSet;

    fn request_for(service: Service, model_id: &str) -> ChatRequest {
        let spec = model::resolve(service, model_id).unwrap_or_else(|e| panic!("{e}"));
        ChatRequest {
            args: spec.args,
            messages: vec![message::user_message("test")],
            tools: Vec::new(),
        }
    }

    #[test]
    fn test_convert_system_message() {
        let converted = OpenAiProvider::convert_message(&message::system_message("test"));
        assert!(matches!(converted, ChatCompletionRequestMessage::System(_)));
    }

    #[test]
    fn test_convert_tool_message() {
        let converted = OpenAiProvider::convert_message(&message::tool_message("call_1", "r"));
        assert!(matches!(converted, ChatCompletionRequestMessage::Tool(_)));
    }

    #[test]
    fn test_convert_assistant_with_tool_calls() {
        let msg = message::assistant_tool_calls_message(
            "",
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "web_search".to_string(),
                arguments: r#"{"query":"x"}"#.to_string(),
            }],
        );
        if let ChatCompletionRequestMessage::Assistant(a) = OpenAiProvider::convert_message(&msg) {
            assert_eq!(a.tool_calls.as_ref().map_or(0, Vec::len), 1);
            assert!(a.content.is_none());
        } else {
            panic!("Expected Assistant message");
        }
    }

    #[test]
    fn test_build_request_reasoning_model() {
        let mut request = request_for(Service::OpenAi, OPENAI_O3_MINI);
        request.tools = ToolSet::research_tools().definitions().to_vec();
        let built = OpenAiProvider::build_request(&request);
        assert_eq!(built.max_completion_tokens, Some(100_000));
        assert!(matches!(built.reasoning_effort, Some(SdkReasoningEffort::High)));
        assert!(matches!(built.response_format, Some(ResponseFormat::Text)));
        assert_eq!(built.tools.as_ref().map_or(0, Vec::len), 3);
        assert_eq!(built.stream, Some(false));
    }

    #[test]
    #[allow(deprecated)]
    fn test_build_request_legacy_limit() {
        let built = OpenAiProvider::build_request(&request_for(Service::Deepseek, DEEPSEEK_R1));
        assert_eq!(built.max_tokens, Some(8_192));
        assert_eq!(built.max_completion_tokens, None);
        assert_eq!(built.temperature, Some(1.5));
    }

    #[test]
    fn test_build_request_plain_model() {
        let built = OpenAiProvider::build_request(&request_for(Service::OpenAi, OPENAI_GPT_4O));
        assert!(built.response_format.is_none());
        assert!(built.reasoning_effort.is_none());
        assert!(built.tools.is_none());
    }

    #[test]
    fn test_reasoning_content_is_kept() {
        let body: ReasoningCompletion = serde_json::from_str(
            r#"{"choices":[{"index":0,"finish_reason":"stop","message":{"role":"assistant",
                "content":"Paris.","reasoning_content":"France's capital is Paris."}}],
                "usage":{"prompt_tokens":12,"completion_tokens":30,"total_tokens":42}}"#,
        )
        .unwrap_or_else(|e| panic!("{e}"));
        let response = body.into_response();
        assert_eq!(response.content, "Paris.");
        assert_eq!(response.reasoning.as_deref(), Some("France's capital is Paris."));
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.total_tokens, 42);
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn test_reasoning_body_with_tool_calls() {
        let body: ReasoningCompletion = serde_json::from_str(
            r#"{"choices":[{"finish_reason":"tool_calls","message":{"content":null,
                "reasoning_content":"  ","tool_calls":[{"id":"call_1","type":"function",
                "function":{"name":"web_search","arguments":"{\"query\":\"x\"}"}}]}}]}"#,
        )
        .unwrap_or_else(|e| panic!("{e}"));
        let response = body.into_response();
        assert!(response.reasoning.is_none());
        assert_eq!(response.content, "");
        assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "web_search");
        assert_eq!(response.usage, TokenUsage::default());
    }

    #[test]
    fn test_deepseek_uses_raw_transport() {
        let provider = OpenAiProvider::new(Service::Deepseek, "k", Some("http://localhost:9001/"));
        assert!(matches!(
            &provider.transport,
            Transport::Raw { base_url, .. } if base_url == "http://localhost:9001"
        ));
        let groq = OpenAiProvider::new(Service::Groq, "k", None);
        assert!(matches!(groq.transport, Transport::Sdk(_)));
    }

    #[test]
    fn test_provider_name_follows_service() {
        let provider = OpenAiProvider::new(Service::Groq, "k", None);
        assert_eq!(provider.name(), "groq");
    }
}
