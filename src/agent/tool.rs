//! Tool type definitions for research function-calling.
//!
//! Provides provider-agnostic types for tool definitions, calls, and results.
//! Tools expose the search, retrieval and subquery capabilities to the
//! answering model, either as native tool schemas or as a fenced-JSON
//! protocol described in the seeded instructions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Web search tool name.
pub const WEB_SEARCH: &str = "web_search";
/// Page retrieval tool name.
pub const WEB_CONTENT_RETRIEVER: &str = "call_web_content_retriever";
/// Delegated sub-question tool name.
pub const RESEARCH_PROFESSIONAL: &str = "call_research_professional";
/// Older alias for [`RESEARCH_PROFESSIONAL`] still emitted by some models.
pub const CALL_OPENAI_ALIAS: &str = "call_openai";

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match dispatch table in executor).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Renders the definition in `OpenAI` function-tool form.
    #[must_use]
    pub fn to_function_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier for this call (assigned by the provider or the normalizer).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

impl ToolCall {
    /// Decodes the arguments as a JSON object.
    ///
    /// Malformed JSON, or JSON that is not an object, yields an empty map.
    #[must_use]
    pub fn parsed_arguments(&self) -> Map<String, Value> {
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Returns a string argument, or `""` when missing or not a string.
    #[must_use]
    pub fn str_argument(&self, key: &str) -> String {
        self.parsed_arguments()
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

/// The result of executing a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Name of the tool that ran.
    pub name: String,
    /// Result content (tool output on success, error text on failure).
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

/// A set of tool definitions offered to the answering model.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    definitions: Vec<ToolDefinition>,
}

impl ToolSet {
    /// Returns the tool definitions in this set.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Returns `true` if this set contains no tools.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns the number of tools in this set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.definitions.len()
    }

    /// The research tools: web search, page retrieval, delegated sub-question.
    #[must_use]
    pub fn research_tools() -> Self {
        Self {
            definitions: vec![def_web_search(), def_web_content_retriever(), def_research_professional()],
        }
    }

    /// Pretty JSON array of the tools in function form, for prompt embedding.
    #[must_use]
    pub fn to_prompt_json(&self) -> String {
        let tools: Vec<Value> = self
            .definitions
            .iter()
            .map(ToolDefinition::to_function_json)
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

fn def_web_search() -> ToolDefinition {
    ToolDefinition {
        name: WEB_SEARCH.to_string(),
        description: "Use this to utilize a PhD grad student to perform research, they can only \
                      research one single intent question at a time, they have no context or \
                      prior knowledge of this conversation, you must give them the context and \
                      a single intention query."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "A straight to the point concise question or search query to be sent to the research assistant"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

fn def_web_content_retriever() -> ToolDefinition {
    ToolDefinition {
        name: WEB_CONTENT_RETRIEVER.to_string(),
        description: "Fetch the full content of a web page as markdown. Use it when a search \
                      result cites a URL whose details matter."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Absolute URL of the page to retrieve"
                }
            },
            "required": ["url"],
            "additionalProperties": false
        }),
    }
}

fn def_research_professional() -> ToolDefinition {
    ToolDefinition {
        name: RESEARCH_PROFESSIONAL.to_string(),
        description: "Ask an independent expert model a self-contained question. It sees none \
                      of this conversation, so include all needed context in the prompt."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Complete, self-contained question for the expert"
                }
            },
            "required": ["prompt"],
            "additionalProperties": false
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_research_tools() {
        let set = ToolSet::research_tools();
        assert_eq!(set.len(), 3);
        let names: Vec<&str> = set.definitions().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, [WEB_SEARCH, WEB_CONTENT_RETRIEVER, RESEARCH_PROFESSIONAL]);
    }

    #[test]
    fn test_schemas_are_objects() {
        for def in ToolSet::research_tools().definitions() {
            assert_eq!(def.parameters["type"], "object");
            assert!(def.parameters["required"].is_array());
        }
    }

    #[test]
    fn test_prompt_json_has_function_wrapper() {
        let rendered = ToolSet::research_tools().to_prompt_json();
        let parsed: Value = serde_json::from_str(&rendered).unwrap_or_default();
        assert_eq!(parsed[0]["type"], "function");
        assert_eq!(parsed[0]["function"]["name"], WEB_SEARCH);
    }

    #[test]
    fn test_malformed_arguments_become_empty() {
        let call = ToolCall {
            id: "1".to_string(),
            name: WEB_SEARCH.to_string(),
            arguments: "{not json".to_string(),
        };
        assert!(call.parsed_arguments().is_empty());
        assert_eq!(call.str_argument("query"), "");
    }

    #[test]
    fn test_non_object_arguments_become_empty() {
        let call = ToolCall {
            id: "1".to_string(),
            name: WEB_SEARCH.to_string(),
            arguments: "[1,2]".to_string(),
        };
        assert!(call.parsed_arguments().is_empty());
    }

    #[test]
    fn test_str_argument() {
        let call = ToolCall {
            id: "1".to_string(),
            name: WEB_SEARCH.to_string(),
            arguments: r#"{"query":"capital of France","n":3}"#.to_string(),
        };
        assert_eq!(call.str_argument("query"), "capital of France");
        assert_eq!(call.str_argument("n"), "");
    }
}
