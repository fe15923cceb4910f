//! Best-effort structured parse of judge payloads.
//!
//! Judges are asked for
//!
//! ```json
//! {"Critical_Evaluation": {"Pros": [...], "Cons": [...], "Rating": 0.0}}
//! ```
//!
//! but often wrap it in prose or fences, leave newlines raw inside strings,
//! or drop a closing brace. [`parse_rating`] applies an ordered repair chain
//! and stops at the first candidate that parses:
//!
//! 1. strip hidden reasoning and fence lines, trim
//! 2. the text as is
//! 3. the span from the first `{` to the last `}`
//! 4. raw control characters inside strings escaped
//! 5. unclosed strings, arrays and objects closed
//! 6. the whole text wrapped in braces
//!
//! Steps 4 to 6 build on each other. A payload that survives none of them
//! is an explicit [`RatingParse::Failed`], never partial data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::normalize::strip_hidden_reasoning;

const ENVELOPE: &str = "Critical_Evaluation";

/// A parsed judge verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Strengths the judge listed.
    pub pros: Vec<String>,
    /// Weaknesses the judge listed.
    pub cons: Vec<String>,
    /// Rating clamped to `[0, 1]`.
    pub rating: f64,
}

impl Evaluation {
    /// Canonical JSON form. Parsing it yields `self` again.
    #[must_use]
    pub fn to_canonical_json(&self) -> String {
        json!({
            ENVELOPE: {
                "Pros": self.pros,
                "Cons": self.cons,
                "Rating": self.rating,
            }
        })
        .to_string()
    }

    /// Pros and cons as a bulleted block for revision prompts.
    #[must_use]
    pub fn pros_and_cons(&self) -> String {
        let mut out = String::from("Pros:\n");
        for p in &self.pros {
            out.push_str("- ");
            out.push_str(p);
            out.push('\n');
        }
        out.push_str("\nCons:\n");
        for c in &self.cons {
            out.push_str("- ");
            out.push_str(c);
            out.push('\n');
        }
        out
    }
}

/// Outcome of [`parse_rating`].
#[derive(Debug, Clone, PartialEq)]
pub enum RatingParse {
    /// A complete verdict.
    Parsed(Evaluation),
    /// Nothing usable; `reason` says why.
    Failed {
        /// Last parse error seen.
        reason: String,
    },
}

impl RatingParse {
    /// The rating, or `0.0` for an unusable payload.
    #[must_use]
    pub fn rating(&self) -> f64 {
        match self {
            Self::Parsed(e) => e.rating,
            Self::Failed { .. } => 0.0,
        }
    }

    /// The verdict, if one was parsed.
    #[must_use]
    pub const fn evaluation(&self) -> Option<&Evaluation> {
        match self {
            Self::Parsed(e) => Some(e),
            Self::Failed { .. } => None,
        }
    }
}

/// Parses a judge payload through the repair chain.
#[must_use]
pub fn parse_rating(raw: &str) -> RatingParse {
    let visible = strip_hidden_reasoning(raw);
    let cleaned = visible
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return RatingParse::Failed {
            reason: "empty payload".to_string(),
        };
    }

    let mut reason = String::new();
    let mut attempt = |candidate: &str| -> Option<Evaluation> {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => match interpret(&value) {
                Ok(eval) => Some(eval),
                Err(e) => {
                    reason = e;
                    None
                }
            },
            Err(e) => {
                reason = e.to_string();
                None
            }
        }
    };

    if let Some(eval) = attempt(cleaned) {
        return RatingParse::Parsed(eval);
    }
    let span = object_span(cleaned).unwrap_or(cleaned);
    if span != cleaned
        && let Some(eval) = attempt(span)
    {
        return RatingParse::Parsed(eval);
    }
    let escaped = escape_control_chars_in_strings(span);
    if let Some(eval) = attempt(&escaped) {
        return RatingParse::Parsed(eval);
    }
    let balanced = balance_delimiters(&escaped);
    if let Some(eval) = attempt(&balanced) {
        return RatingParse::Parsed(eval);
    }
    if !balanced.starts_with('{') {
        let wrapped = balance_delimiters(&format!("{{{escaped}"));
        if let Some(eval) = attempt(&wrapped) {
            return RatingParse::Parsed(eval);
        }
    }
    RatingParse::Failed { reason }
}

/// From the first `{` to the last `}`, if both exist in that order.
fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Escapes raw newlines, carriage returns and tabs inside string literals.
fn escape_control_chars_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if in_string {
            match ch {
                _ if escaped => {
                    escaped = false;
                    out.push(ch);
                }
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(ch),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }
    out
}

/// Closes an unterminated string and any unclosed arrays or objects.
fn balance_delimiters(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }
    let mut out = text.trim_end().trim_end_matches(',').to_string();
    if in_string {
        out.push('"');
    }
    while let Some(close) = stack.pop() {
        out.push(close);
    }
    out
}

fn interpret(value: &Value) -> Result<Evaluation, String> {
    let Value::Object(outer) = value else {
        return Err("payload is not a JSON object".to_string());
    };
    let body = match outer.get(ENVELOPE) {
        Some(Value::Object(inner)) => inner,
        Some(_) => return Err(format!("{ENVELOPE} is not an object")),
        None => outer,
    };
    let rating = rating_field(body)?;
    Ok(Evaluation {
        pros: string_list(body, "Pros")?,
        cons: string_list(body, "Cons")?,
        rating,
    })
}

fn rating_field(body: &Map<String, Value>) -> Result<f64, String> {
    let rating = match body.get("Rating") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| "missing or non-numeric Rating".to_string())?;
    if rating.is_finite() {
        Ok(rating.clamp(0.0, 1.0))
    } else {
        Err("Rating is not finite".to_string())
    }
}

fn string_list(body: &Map<String, Value>, key: &str) -> Result<Vec<String>, String> {
    match body.get(key) {
        Some(Value::Array(items)) => Ok(items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Null) => Ok(Vec::new()),
        Some(_) => Err(format!("{key} is not a list")),
        None => Err(format!("missing {key}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rating_of(raw: &str) -> Option<f64> {
        parse_rating(raw).evaluation().map(|e| e.rating)
    }

    #[test]
    fn test_clean_envelope() {
        let raw = r#"{"Critical_Evaluation":{"Pros":["clear"],"Cons":[],"Rating":0.9}}"#;
        let parsed = parse_rating(raw);
        assert_eq!(rating_of(raw), Some(0.9));
        assert_eq!(
            parsed.evaluation().map(|e| e.pros.clone()),
            Some(vec!["clear".to_string()])
        );
    }

    #[test]
    fn test_fenced_with_prose_and_think() {
        let raw = "<think>weighing it</think>Here you go:\n```json\n{\"Critical_Evaluation\": {\"Pros\": [\"a\"], \"Cons\": [\"b\"], \"Rating\": 0.7}}\n```\nThanks";
        assert_eq!(rating_of(raw), Some(0.7));
    }

    #[test]
    fn test_raw_newlines_in_strings() {
        let raw = "{\"Critical_Evaluation\": {\"Pros\": [\"line one\nline two\"], \"Cons\": [], \"Rating\": 0.4}}";
        assert_eq!(rating_of(raw), Some(0.4));
    }

    #[test]
    fn test_missing_closing_braces() {
        let raw = r#"{"Critical_Evaluation": {"Pros": ["x"], "Cons": ["y"], "Rating": 0.6"#;
        assert_eq!(rating_of(raw), Some(0.6));
    }

    #[test]
    fn test_missing_outer_braces() {
        let raw = r#""Critical_Evaluation": {"Pros": [], "Cons": [], "Rating": 0.3}"#;
        assert_eq!(rating_of(raw), Some(0.3));
    }

    #[test]
    fn test_bare_object_and_string_rating() {
        let raw = r#"{"Pros": "good", "Cons": null, "Rating": "1.0"}"#;
        let parsed = parse_rating(raw);
        let eval = parsed.evaluation();
        assert_eq!(eval.map(|e| e.rating), Some(1.0));
        assert_eq!(eval.map(|e| e.pros.clone()), Some(vec!["good".to_string()]));
    }

    #[test]
    fn test_rating_is_clamped() {
        assert_eq!(rating_of(r#"{"Pros":[],"Cons":[],"Rating":7}"#), Some(1.0));
        assert_eq!(rating_of(r#"{"Pros":[],"Cons":[],"Rating":-2}"#), Some(0.0));
    }

    #[test]
    fn test_irrecoverable_payload_fails_explicitly() {
        for raw in ["", "I refuse to grade this.", r#"{"Pros":[],"Cons":[]}"#, "[1,2,3]"] {
            let parsed = parse_rating(raw);
            assert!(matches!(parsed, RatingParse::Failed { .. }), "{raw}");
            assert!(parsed.rating().abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_pros_and_cons_block() {
        let eval = Evaluation {
            pros: vec!["cites sources".to_string()],
            cons: vec!["too short".to_string()],
            rating: 0.5,
        };
        let block = eval.pros_and_cons();
        assert!(block.contains("Pros:\n- cites sources"));
        assert!(block.contains("Cons:\n- too short"));
    }

    #[test]
    fn test_canonical_rating_keeps_every_digit() {
        let eval = Evaluation {
            pros: Vec::new(),
            cons: Vec::new(),
            rating: 0.453_203_809_542_854_83,
        };
        assert_eq!(
            parse_rating(&eval.to_canonical_json()),
            RatingParse::Parsed(eval)
        );
    }

    proptest! {
        #[test]
        fn prop_canonical_output_reparses_identically(
            pros in prop::collection::vec("[a-zA-Z0-9 .,'\"{}\\[\\]\n]{0,24}", 0..4),
            cons in prop::collection::vec("[a-zA-Z0-9 .,'\"{}\\[\\]\n]{0,24}", 0..4),
            rating in 0.0f64..=1.0,
        ) {
            let eval = Evaluation { pros, cons, rating };
            prop_assert_eq!(parse_rating(&eval.to_canonical_json()), RatingParse::Parsed(eval));
        }

        #[test]
        fn prop_repair_is_idempotent(raw in "[a-zA-Z0-9 :,.\"{}\\[\\]\n`]{0,80}") {
            if let RatingParse::Parsed(first) = parse_rating(&raw) {
                let again = parse_rating(&first.to_canonical_json());
                prop_assert_eq!(again, RatingParse::Parsed(first));
            }
        }
    }
}
