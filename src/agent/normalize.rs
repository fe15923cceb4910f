//! Response normalization.
//!
//! Turns a raw [`ChatResponse`] into the pieces the controller acts on:
//! tool-call requests, the visible answer and any hidden reasoning. The
//! assistant's turn is appended to the conversation along the way.
//!
//! # Fenced tool-call grammar
//!
//! Models without native tool support request tools with fenced blocks:
//!
//! ````text
//! ```json
//! {"name": "web_search", "arguments": {"query": "capital of France"}}
//! ```
//! ````
//!
//! A block is a tool call iff its content parses as a JSON object with a
//! string `name` and an `arguments` key. Anything else is skipped.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::conversation::Conversation;
use super::message::{ChatResponse, assistant_message, assistant_tool_calls_message};
use super::tool::ToolCall;

/// Opening marker of an inline hidden-reasoning span.
pub const THINK_START: &str = "<think>";
/// Closing marker of an inline hidden-reasoning span.
pub const THINK_END: &str = "</think>";

static FENCED_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").ok());

/// What the controller needs from one model turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedTurn {
    /// Tool calls to dispatch, in request order.
    pub tool_calls: Vec<ToolCall>,
    /// `true` when the calls came from the provider's native field.
    pub native_calls: bool,
    /// Visible answer with hidden reasoning stripped.
    pub visible: String,
    /// Hidden reasoning, if any.
    pub reasoning: Option<String>,
}

/// Parses one fenced block body as a tool call.
///
/// Returns `None` for anything outside the grammar; never errors.
#[must_use]
pub fn parse_tool_block(body: &str, id: &str) -> Option<ToolCall> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return None;
    };
    let name = map.get("name")?.as_str()?;
    let arguments = map.get("arguments")?;
    Some(ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    })
}

/// Extracts every well-formed fenced tool call from `text`, in source order.
#[must_use]
pub fn parse_fenced_tool_calls(text: &str) -> Vec<ToolCall> {
    let Some(re) = FENCED_BLOCK.as_ref() else {
        return Vec::new();
    };
    let mut calls = Vec::new();
    for (index, caps) in re.captures_iter(text).enumerate() {
        let body = caps.get(1).map_or("", |m| m.as_str());
        let id = format!("call_{}", calls.len());
        match parse_tool_block(body, &id) {
            Some(call) => calls.push(call),
            None => debug!(block = index, "skipping fenced block that is not a tool call"),
        }
    }
    calls
}

/// Splits `text` into (hidden spans, visible text) around the think markers.
///
/// A span left open runs to the end of the text. A stray closing marker is
/// dropped.
fn split_think_spans(text: &str) -> (Vec<&str>, String) {
    let mut hidden = Vec::new();
    let mut visible = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let start = rest.find(THINK_START);
        let stray_end = rest.find(THINK_END);
        match (start, stray_end) {
            (Some(s), end) if end.is_none_or(|e| s < e) => {
                visible.push_str(&rest[..s]);
                let after = &rest[s + THINK_START.len()..];
                if let Some(e) = after.find(THINK_END) {
                    hidden.push(&after[..e]);
                    rest = &after[e + THINK_END.len()..];
                } else {
                    hidden.push(after);
                    rest = "";
                }
            }
            (_, Some(e)) => {
                visible.push_str(&rest[..e]);
                rest = &rest[e + THINK_END.len()..];
            }
            (_, None) => {
                visible.push_str(rest);
                break;
            }
        }
    }
    (hidden, visible)
}

/// Hidden reasoning embedded in `text` between think markers, if any.
#[must_use]
pub fn extract_hidden_reasoning(text: &str) -> Option<String> {
    let (hidden, _) = split_think_spans(text);
    let joined = hidden
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    (!joined.is_empty()).then_some(joined)
}

/// `text` with every think span removed.
#[must_use]
pub fn strip_hidden_reasoning(text: &str) -> String {
    if !text.contains(THINK_START) && !text.contains(THINK_END) {
        return text.to_string();
    }
    split_think_spans(text).1.trim_start().to_string()
}

/// Normalizes one model turn and appends it to `conversation`.
///
/// - Native tool calls are used verbatim and the raw assistant message
///   (content plus calls) is appended.
/// - Otherwise the visible text is scanned for fenced tool calls.
/// - A provider reasoning field wins over inline think markers. Hidden
///   reasoning is appended as its own message ahead of the answer.
pub fn normalize(response: &ChatResponse, conversation: &mut Conversation) -> NormalizedTurn {
    let reasoning = response
        .reasoning
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .or_else(|| extract_hidden_reasoning(&response.content));
    let visible = strip_hidden_reasoning(&response.content);

    if let Some(r) = &reasoning {
        conversation.push(assistant_message(r));
    }

    if !response.tool_calls.is_empty() {
        conversation.push(assistant_tool_calls_message(
            &response.content,
            response.tool_calls.clone(),
        ));
        return NormalizedTurn {
            tool_calls: response.tool_calls.clone(),
            native_calls: true,
            visible,
            reasoning,
        };
    }

    let tool_calls = parse_fenced_tool_calls(&visible);
    if !visible.trim().is_empty() {
        conversation.push(assistant_message(&visible));
    }
    NormalizedTurn {
        tool_calls,
        native_calls: false,
        visible,
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::Role;

    fn response(content: &str) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            ..ChatResponse::default()
        }
    }

    #[test]
    fn test_two_valid_blocks_and_one_malformed() {
        let text = r#"Let me look this up.
```json
{"name": "web_search", "arguments": {"query": "first"}}
```
```json
{"name": "web_search", "arguments": {"query": oops}
```
```
{"name": "call_web_content_retriever", "arguments": {"url": "https://example.com"}}
```"#;
        let calls = parse_fenced_tool_calls(text);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "web_search");
        assert_eq!(calls[0].str_argument("query"), "first");
        assert_eq!(calls[1].name, "call_web_content_retriever");
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[1].id, "call_1");
    }

    #[test]
    fn test_block_grammar() {
        assert!(parse_tool_block(r#"{"name":"x","arguments":{}}"#, "1").is_some());
        assert!(parse_tool_block(r#"{"name":"x"}"#, "1").is_none());
        assert!(parse_tool_block(r#"{"arguments":{}}"#, "1").is_none());
        assert!(parse_tool_block(r#"{"name":3,"arguments":{}}"#, "1").is_none());
        assert!(parse_tool_block(r#"["name","arguments"]"#, "1").is_none());
        assert!(parse_tool_block("plain prose", "1").is_none());
    }

    #[test]
    fn test_extract_and_strip_markers() {
        let text = "<think>\nplan the search\n</think>\n\nThe answer.";
        assert_eq!(
            extract_hidden_reasoning(text).as_deref(),
            Some("plan the search")
        );
        assert_eq!(strip_hidden_reasoning(text), "The answer.");
    }

    #[test]
    fn test_unterminated_marker_hides_rest() {
        let text = "Visible<think>never closed";
        assert_eq!(strip_hidden_reasoning(text), "Visible");
        assert_eq!(extract_hidden_reasoning(text).as_deref(), Some("never closed"));
    }

    #[test]
    fn test_stray_closing_marker_dropped() {
        assert_eq!(strip_hidden_reasoning("thinking</think>answer"), "thinkinganswer");
        assert!(extract_hidden_reasoning("thinking</think>answer").is_none());
    }

    #[test]
    fn test_text_without_markers_untouched() {
        assert_eq!(strip_hidden_reasoning("  plain  "), "  plain  ");
        assert!(extract_hidden_reasoning("plain").is_none());
    }

    #[test]
    fn test_normalize_appends_reasoning_before_answer() {
        let mut conv = Conversation::new();
        let turn = normalize(&response("<think>why</think>Paris."), &mut conv);
        assert_eq!(turn.visible, "Paris.");
        assert_eq!(turn.reasoning.as_deref(), Some("why"));
        assert!(turn.tool_calls.is_empty());
        let contents: Vec<&str> = conv.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["why", "Paris."]);
    }

    #[test]
    fn test_reasoning_field_preferred_over_markers() {
        let mut conv = Conversation::new();
        let mut resp = response("<think>inline</think>Answer");
        resp.reasoning = Some("from field".to_string());
        let turn = normalize(&resp, &mut conv);
        assert_eq!(turn.reasoning.as_deref(), Some("from field"));
        assert_eq!(turn.visible, "Answer");
    }

    #[test]
    fn test_native_tool_calls_used_verbatim() {
        let mut conv = Conversation::new();
        let call = ToolCall {
            id: "call_abc".to_string(),
            name: "web_search".to_string(),
            arguments: r#"{"query":"q"}"#.to_string(),
        };
        let mut resp = response("```json\n{\"name\":\"ignored\",\"arguments\":{}}\n```");
        resp.tool_calls = vec![call.clone()];

        let turn = normalize(&resp, &mut conv);

        assert!(turn.native_calls);
        assert_eq!(turn.tool_calls, vec![call.clone()]);
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].role, Role::Assistant);
        assert_eq!(conv.messages()[0].tool_calls, vec![call]);
    }

    #[test]
    fn test_empty_visible_not_appended() {
        let mut conv = Conversation::new();
        let turn = normalize(&response("<think>only thoughts</think>"), &mut conv);
        assert!(turn.visible.is_empty());
        assert_eq!(conv.len(), 1);
    }
}
