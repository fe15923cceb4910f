//! Progressive transcript events.
//!
//! The controller reports each intermediate step to a [`TranscriptSink`] as
//! it happens. The CLI appends these to a file so a long run can be watched.

use std::sync::Arc;

/// What a transcript entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranscriptKind {
    /// Visible assistant turn.
    Assistant,
    /// Hidden reasoning.
    Reasoning,
    /// Output of one tool call.
    ToolResult,
    /// Judge verdict payload.
    Judge,
    /// Manager feedback.
    Feedback,
    /// The run's final answer.
    FinalAnswer,
    /// Controller notices (cutovers, rollbacks).
    Notice,
}

impl TranscriptKind {
    /// Heading used when the entry is written out.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::Reasoning => "reasoning",
            Self::ToolResult => "tool",
            Self::Judge => "judge",
            Self::Feedback => "feedback",
            Self::FinalAnswer => "final answer",
            Self::Notice => "notice",
        }
    }
}

/// Receiver for transcript entries. Called from worker tasks too.
pub type TranscriptSink = Arc<dyn Fn(TranscriptKind, &str) + Send + Sync>;

/// A sink that drops everything.
#[must_use]
pub fn discard() -> TranscriptSink {
    Arc::new(|_, _| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_sink_receives_entries() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let sink: TranscriptSink = Arc::new(move |kind, text: &str| {
            if let Ok(mut v) = captured.lock() {
                v.push((kind, text.to_string()));
            }
        });
        sink(TranscriptKind::Judge, "Rating 1.0");
        discard()(TranscriptKind::Notice, "ignored");
        let seen = seen.lock().map(|v| v.clone()).unwrap_or_default();
        assert_eq!(seen, [(TranscriptKind::Judge, "Rating 1.0".to_string())]);
    }

    #[test]
    fn test_labels_are_distinct() {
        let kinds = [
            TranscriptKind::Assistant,
            TranscriptKind::Reasoning,
            TranscriptKind::ToolResult,
            TranscriptKind::Judge,
            TranscriptKind::Feedback,
            TranscriptKind::FinalAnswer,
            TranscriptKind::Notice,
        ];
        let labels: std::collections::HashSet<_> = kinds.iter().map(|k| k.label()).collect();
        assert_eq!(labels.len(), kinds.len());
    }
}
