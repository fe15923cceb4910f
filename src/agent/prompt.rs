//! Prompt templates and builders for the research roles.
//!
//! Templates are plain text with `{placeholder}` slots. Each can be
//! overridden by a file of the same name in the prompt directory; the
//! short control prompts (revision, re-answer, date header) are fixed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};

use super::convergence::Severity;

/// Seeded instructions for models without native tool support.
pub const TOOL_INSTRUCTIONS_PROMPT: &str = r#"I've upgraded your functionality post training data cutoff to access current data and use tools. You can now request tool executions using JSON in your responses, and I'll run them and return the results in user messages. You are a helpful AI that can use the following tools by producing JSON in your message. To call multiple tools (max 10), output multiple JSON blocks (in triple backticks, with a line ```json) in a single response. When you want to call a tool, output EXACTLY a JSON block (in triple backticks, with a line ```json) of the form:

{
  "name": "<tool_name>",
  "arguments": { "name" : "value", "name":"value", ... }
}

The valid tools are:
{tools}

Return your final answer in plain text (no JSON) once you have all information you need. Do not output extraneous text outside or after a JSON block if calling a tool."#;

/// Rubric sent to the judge model.
pub const JUDGE_PROMPT: &str = r#"Critically evaluate your response against the user's question and provide a list of both pros and cons statements and a rating between 0.0 and 1.0, with 1.0 being the highest score. If you have already given the same negative feedback before, find new feedback instead of repeating the same cons. The team working on this is very capable and would already have addressed prior negative feedback if it were possible to do so.

```User's Question
{question}
```

```Rating Guidance
0.6 - Satisfactory: mostly clear and relevant, expanded but not exhaustive, generally correct.
0.7 - Good: clear, on topic, covers most aspects, accurate overall.
0.8 - Very Good: easy to follow, highly relevant, comprehensive with minor omissions, dependable.
0.85 - Excellent: seamless flow, anticipates implicit needs, nearly exhaustive, highly accurate.
0.9 - Exceptional: precise and authoritative, complete beyond expectations, every claim supported with evidence and cited sources.
0.95 - Near Perfect: flawless structure, insightful and original, covers all key and ancillary points.
1.0 - Outstanding: crystal clear, perfectly aligned with the question, exhaustive in depth and scope, 100% accurate and verifiable.
```

Respond only in JSON following the example template below.

```json
{
    "Critical_Evaluation": {
        "Pros": [
        ],
        "Cons": [
        ],
        "Rating": 0.0
    }
}
```"#;

/// Manager persona that turns scores and judge feedback into motivation.
pub const MANAGER_FEEDBACK_PROMPT: &str = r"You are a highly successful people manager with all company resources at your disposal. Your employee is performing the following task and has received the following scores and feedback. Your response must include your best concise motivational speech to the employee to substantially increase their score on the task. If their work scored the same as last time you must be stern on requiring improvement. If their work scored worse than last time, be direct and final on the need for improvement. Provide incentives for good performance and discourage poor performance through constructive feedback or consequences.
Respond in first person as if you are talking to them directly without mentioning their name.

``` task
{question}
```

``` Iterative scores in order based on the initial draft and the latest version
{scores}
```

``` feedback
{feedback}
```";

/// Final synthesis request issued once an answer passes.
pub const FINAL_REPORT_PROMPT: &str = r"I conduct thorough research to create detailed and balanced long long long investigative reports. I explore every avenue to produce comprehensive narratives, considering that the user might not be an expert in the domain, class, or task. I explain concepts clearly and informatively, being sensitive to the user's perspective without highlighting any lack of expertise. I carefully analyze the entire conversation, ensuring no detail is overlooked, and I cite every url source in full. With this in mind, I will write a comprehensive narrative report that addresses the Who, What, When, Where, How, and Why, without using these as section titles, as a text response.

User's Question

{question}";

/// Pushed when the prompt outgrows the model's token budget.
pub const TOKEN_CUTOVER_PROMPT: &str = r"Write your long long long final answer to the user's question without missing any detail. Response must be text, not JSON.

User's Question

{question}";

/// Mines hidden reasoning for unanswered questions.
pub const EXPANSION_EXTRACT_PROMPT: &str = r"In a moment but not now, pre-read the reasoning text below. From the reasoning text identify the most important unique questions (no more than {max_questions}) which were obscurely asked but never answered. For each question identified, respond on a single line with the question and its context identified with Context:. The response must not include additional formatting, numbering, bullets, introduction, commentary, or conclusion. All I need is a list of questions, one per line, with the associated context on the same line.

```reasoning text
{reasoning}
```";

/// Deduplicates proposed questions against what was already researched.
pub const EXPANSION_CONSOLIDATE_PROMPT: &str = r"In a moment but not now, pre-read the proposed_questions, tool_calls, and prior_questions below, then consolidate the questions which are similar in proposed_questions. Eliminate any question from proposed_questions which is similar to a question in tool_calls or prior_questions. For each question identified, respond on a single line with the question and its context identified with Context:. The response must not include additional formatting, numbering, bullets, introduction, commentary, or conclusion. All I need is a list of questions, one per line, with the associated context on the same line.

```proposed_questions
{proposed}
```

```tool_calls
{tool_calls}
```

```prior_questions
{prior_questions}
```";

/// Default prompt directory under user config.
const DEFAULT_PROMPT_DIR: &str = ".config/deep-research/prompts";

const TOOL_INSTRUCTIONS_FILENAME: &str = "tool_instructions.md";
const JUDGE_FILENAME: &str = "judge.md";
const MANAGER_FEEDBACK_FILENAME: &str = "manager_feedback.md";
const FINAL_REPORT_FILENAME: &str = "final_report.md";
const TOKEN_CUTOVER_FILENAME: &str = "token_cutover.md";
const EXPANSION_EXTRACT_FILENAME: &str = "expansion_extract.md";
const EXPANSION_CONSOLIDATE_FILENAME: &str = "expansion_consolidate.md";

const TEMPLATES: [(&str, &str); 7] = [
    (TOOL_INSTRUCTIONS_FILENAME, TOOL_INSTRUCTIONS_PROMPT),
    (JUDGE_FILENAME, JUDGE_PROMPT),
    (MANAGER_FEEDBACK_FILENAME, MANAGER_FEEDBACK_PROMPT),
    (FINAL_REPORT_FILENAME, FINAL_REPORT_PROMPT),
    (TOKEN_CUTOVER_FILENAME, TOKEN_CUTOVER_PROMPT),
    (EXPANSION_EXTRACT_FILENAME, EXPANSION_EXTRACT_PROMPT),
    (EXPANSION_CONSOLIDATE_FILENAME, EXPANSION_CONSOLIDATE_PROMPT),
];

/// Templates for every prompt the controller sends.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults. Use [`PromptSet::load`] to resolve the prompt
/// directory from CLI flags, environment variables, or the default path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// Fenced-JSON tool protocol; `{tools}` slot.
    pub tool_instructions: String,
    /// Judge rubric; `{question}` slot.
    pub judge: String,
    /// Manager persona; `{question}`, `{scores}`, `{feedback}` slots.
    pub manager_feedback: String,
    /// Final report request; `{question}` slot.
    pub final_report: String,
    /// Token-budget cutover; `{question}` slot.
    pub token_cutover: String,
    /// Expansion extraction; `{max_questions}`, `{reasoning}` slots.
    pub expansion_extract: String,
    /// Expansion consolidation; `{proposed}`, `{tool_calls}`,
    /// `{prior_questions}` slots.
    pub expansion_consolidate: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::defaults()
    }
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument (from `--prompt-dir` CLI flag)
    /// 2. `RESEARCH_PROMPT_DIR` environment variable
    /// 3. `~/.config/deep-research/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("RESEARCH_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            tool_instructions: load_file(TOOL_INSTRUCTIONS_FILENAME, TOOL_INSTRUCTIONS_PROMPT),
            judge: load_file(JUDGE_FILENAME, JUDGE_PROMPT),
            manager_feedback: load_file(MANAGER_FEEDBACK_FILENAME, MANAGER_FEEDBACK_PROMPT),
            final_report: load_file(FINAL_REPORT_FILENAME, FINAL_REPORT_PROMPT),
            token_cutover: load_file(TOKEN_CUTOVER_FILENAME, TOKEN_CUTOVER_PROMPT),
            expansion_extract: load_file(EXPANSION_EXTRACT_FILENAME, EXPANSION_EXTRACT_PROMPT),
            expansion_consolidate: load_file(
                EXPANSION_CONSOLIDATE_FILENAME,
                EXPANSION_CONSOLIDATE_PROMPT,
            ),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            tool_instructions: TOOL_INSTRUCTIONS_PROMPT.to_string(),
            judge: JUDGE_PROMPT.to_string(),
            manager_feedback: MANAGER_FEEDBACK_PROMPT.to_string(),
            final_report: FINAL_REPORT_PROMPT.to_string(),
            token_cutover: TOKEN_CUTOVER_PROMPT.to_string(),
            expansion_extract: EXPANSION_EXTRACT_PROMPT.to_string(),
            expansion_consolidate: EXPANSION_CONSOLIDATE_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        for (filename, content) in &TEMPLATES {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }

    /// Tool protocol instructions embedding `tools_json`.
    #[must_use]
    pub fn tool_instructions(&self, tools_json: &str) -> String {
        self.tool_instructions.replace("{tools}", tools_json)
    }

    /// Judge rubric for `question`.
    #[must_use]
    pub fn judge(&self, question: &str) -> String {
        self.judge.replace("{question}", question)
    }

    /// Manager prompt. `scores` is the comma-separated history.
    #[must_use]
    pub fn manager_feedback(&self, question: &str, scores: &str, feedback: &str) -> String {
        self.manager_feedback
            .replace("{question}", question)
            .replace("{scores}", &format!("Scores:{scores}"))
            .replace("{feedback}", feedback)
    }

    /// Final report request for `question`.
    #[must_use]
    pub fn final_report(&self, question: &str) -> String {
        self.final_report.replace("{question}", question)
    }

    /// Token-budget cutover prompt for `question`.
    #[must_use]
    pub fn token_cutover(&self, question: &str) -> String {
        self.token_cutover.replace("{question}", question)
    }

    /// Question extraction over hidden `reasoning`.
    #[must_use]
    pub fn expansion_extract(&self, reasoning: &str, max_questions: usize) -> String {
        self.expansion_extract
            .replace("{max_questions}", &max_questions.to_string())
            .replace("{reasoning}", reasoning)
    }

    /// Consolidation of `proposed` against what was already asked.
    #[must_use]
    pub fn expansion_consolidate(
        &self,
        proposed: &str,
        tool_calls: &str,
        prior_questions: &str,
    ) -> String {
        self.expansion_consolidate
            .replace("{proposed}", proposed)
            .replace("{tool_calls}", tool_calls)
            .replace("{prior_questions}", prior_questions)
    }
}

/// Revision request after a failing score.
#[must_use]
pub fn revise_prompt(severity: Severity, manager_feedback: &str, judge_feedback: &str) -> String {
    let lead = match severity {
        Severity::Worse => "Your work has not improved, this is worse than the last work. ",
        Severity::Stalled => {
            "Your work needs to improve, this was no improvement over the last work. "
        }
        Severity::Normal => "",
    };
    format!(
        "{lead}Use more tools and revise your response based on your Manager's feedback:{manager_feedback}\n\n{judge_feedback}"
    )
}

/// Asks the model to reconsider its own answer.
#[must_use]
pub fn reanswer_prompt(answer: &str) -> String {
    format!("The assistant's previous answer is: <answer>{answer}</answer>, and please re-answer.")
}

/// `Current date and time:<Weekday, Month DD, YYYY, HH:MM:SS>` for `now`.
#[must_use]
pub fn datetime_header<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "Current date and time:{}",
        now.format("%A, %B %d, %Y, %H:%M:%S")
    )
}

/// [`datetime_header`] for the local clock.
#[must_use]
pub fn current_datetime_header() -> String {
    datetime_header(&Local::now())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_have_slots() {
        let p = PromptSet::defaults();
        assert!(p.tool_instructions.contains("{tools}"));
        assert!(p.judge.contains("{question}"));
        assert!(p.judge.contains("Critical_Evaluation"));
        assert!(p.manager_feedback.contains("{scores}"));
        assert!(p.expansion_extract.contains("{max_questions}"));
        assert!(p.expansion_consolidate.contains("{prior_questions}"));
    }

    #[test]
    fn test_builders_fill_slots() {
        let p = PromptSet::defaults();
        assert!(p.judge("Why is the sky blue?").contains("Why is the sky blue?"));
        assert!(!p.judge("q").contains("{question}"));
        assert!(p.tool_instructions("[{\"x\":1}]").contains("[{\"x\":1}]"));
        let manager = p.manager_feedback("task", "0.5, 0.6", "too short");
        assert!(manager.contains("Scores:0.5, 0.6"));
        assert!(manager.contains("too short"));
        let extract = p.expansion_extract("hmm", 3);
        assert!(extract.contains("no more than 3"));
        assert!(extract.contains("hmm"));
    }

    #[test]
    fn test_token_cutover_text() {
        assert_eq!(
            PromptSet::defaults().token_cutover("Q?"),
            "Write your long long long final answer to the user's question without missing any detail. Response must be text, not JSON.\n\nUser's Question\n\nQ?"
        );
    }

    #[test]
    fn test_revise_prompt_by_severity() {
        let worse = revise_prompt(Severity::Worse, "try harder", "Cons: thin");
        assert!(worse.starts_with("Your work has not improved"));
        assert!(worse.ends_with("feedback:try harder\n\nCons: thin"));
        assert!(revise_prompt(Severity::Stalled, "f", "j").starts_with("Your work needs to improve"));
        assert!(revise_prompt(Severity::Normal, "f", "j").starts_with("Use more tools"));
    }

    #[test]
    fn test_reanswer_prompt() {
        assert_eq!(
            reanswer_prompt("Paris"),
            "The assistant's previous answer is: <answer>Paris</answer>, and please re-answer."
        );
    }

    #[test]
    fn test_datetime_header_format() {
        let t = Utc
            .with_ymd_and_hms(2025, 3, 7, 9, 5, 1)
            .single()
            .map(|t| datetime_header(&t));
        assert_eq!(
            t.as_deref(),
            Some("Current date and time:Friday, March 07, 2025, 09:05:01")
        );
    }

    #[test]
    fn test_load_overrides_single_file() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));
        std::fs::write(dir.path().join(JUDGE_FILENAME), "custom {question}")
            .unwrap_or_else(|e| panic!("{e}"));
        let p = PromptSet::load(Some(dir.path()));
        assert_eq!(p.judge("q"), "custom q");
        assert_eq!(p.final_report, FINAL_REPORT_PROMPT);
    }

    #[test]
    fn test_write_defaults_does_not_overwrite() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));
        std::fs::write(dir.path().join(JUDGE_FILENAME), "mine").unwrap_or_else(|e| panic!("{e}"));
        let written = PromptSet::write_defaults(dir.path()).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(written.len(), TEMPLATES.len() - 1);
        let judge = std::fs::read_to_string(dir.path().join(JUDGE_FILENAME)).unwrap_or_default();
        assert_eq!(judge, "mine");
        assert_eq!(PromptSet::load(Some(dir.path())).judge, "mine");
    }
}
