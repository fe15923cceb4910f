//! Score history and the convergence state machine.
//!
//! After every judged answer the controller records the rating and gets
//! back a [`Verdict`]:
//!
//! | condition (checked in order)                          | verdict                  |
//! |-------------------------------------------------------|--------------------------|
//! | `streak >= max_same_score_retries` (and limit > 0)    | `Pass { forced }`        |
//! | `rating >= threshold`                                 | `Pass { forced: false }` |
//! | (`is_worse` or `streak > 1`) and extra attempt unused | `Rollback`               |
//! | otherwise                                             | `Revise(severity)`       |
//!
//! A rollback drops the score it was triggered by, so the history only
//! holds ratings of answers that stayed in the conversation.

use tracing::info;

/// Trailing-window statistics of a score history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreTrend {
    /// Latest score is below the one before it.
    pub is_worse: bool,
    /// Number of trailing scores equal to the latest, itself included.
    /// Zero when fewer than two scores exist.
    pub streak: usize,
}

/// Append-only rating history, one entry per judged iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreRecord {
    scores: Vec<f64>,
}

impl ScoreRecord {
    /// Creates an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self { scores: Vec::new() }
    }

    /// Appends a rating.
    pub fn push(&mut self, rating: f64) {
        self.scores.push(rating);
    }

    /// Removes the latest rating.
    pub fn pop(&mut self) -> Option<f64> {
        self.scores.pop()
    }

    /// Ratings, oldest first.
    #[must_use]
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Number of ratings.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns `true` when nothing has been recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Regression and streak of the trailing scores.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn analyze(&self) -> ScoreTrend {
        let [.., prev, last] = self.scores.as_slice() else {
            return ScoreTrend::default();
        };
        let streak = self
            .scores
            .iter()
            .rev()
            .take_while(|s| **s == *last)
            .count();
        ScoreTrend {
            is_worse: last < prev,
            streak,
        }
    }

    /// Comma-separated history, as shown to the manager.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.scores
            .iter()
            .map(f64::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// How badly a failing answer compares to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Scored lower than last time.
    Worse,
    /// Scored the same as last time.
    Stalled,
    /// First failure or an improvement that still falls short.
    Normal,
}

/// What the controller does with a judged answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Stop revising and synthesize. `forced` when the streak limit,
    /// not the threshold, ended the run.
    Pass {
        /// Passed by streak limit rather than rating.
        forced: bool,
    },
    /// Drop the last answer and its score, then retry without feedback.
    Rollback,
    /// Ask the manager for feedback and revise.
    Revise(Severity),
}

/// Thresholds that drive the verdicts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergencePolicy {
    /// Minimum passing rating.
    pub threshold: f64,
    /// Equal trailing scores that force a pass; zero disables.
    pub max_same_score_retries: usize,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            max_same_score_retries: 3,
        }
    }
}

/// Run-scoped convergence state.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceEngine {
    policy: ConvergencePolicy,
    scores: ScoreRecord,
    extra_attempt_used: bool,
}

impl ConvergenceEngine {
    /// Creates an engine with an empty history.
    #[must_use]
    pub fn new(policy: ConvergencePolicy) -> Self {
        Self {
            policy,
            scores: ScoreRecord::new(),
            extra_attempt_used: false,
        }
    }

    /// Creates an engine that continues an existing history.
    #[must_use]
    pub fn with_history(policy: ConvergencePolicy, scores: ScoreRecord) -> Self {
        Self {
            policy,
            scores,
            extra_attempt_used: false,
        }
    }

    /// The policy in force.
    #[must_use]
    pub const fn policy(&self) -> &ConvergencePolicy {
        &self.policy
    }

    /// Ratings recorded so far.
    #[must_use]
    pub const fn scores(&self) -> &ScoreRecord {
        &self.scores
    }

    /// Records `rating` and decides what happens next.
    pub fn record(&mut self, rating: f64) -> Verdict {
        self.scores.push(rating);
        let passing = rating >= self.policy.threshold;
        let trend = self.scores.analyze();
        let limit = self.policy.max_same_score_retries;

        let verdict = if limit > 0 && trend.streak >= limit {
            Verdict::Pass { forced: !passing }
        } else if passing {
            self.extra_attempt_used = false;
            Verdict::Pass { forced: false }
        } else if (trend.is_worse || trend.streak > 1) && !self.extra_attempt_used {
            self.extra_attempt_used = true;
            self.scores.pop();
            Verdict::Rollback
        } else {
            self.extra_attempt_used = false;
            Verdict::Revise(if trend.is_worse {
                Severity::Worse
            } else if trend.streak > 1 {
                Severity::Stalled
            } else {
                Severity::Normal
            })
        };

        info!(
            rating,
            streak = trend.streak,
            is_worse = trend.is_worse,
            ?verdict,
            "answer judged"
        );
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(threshold: f64, max_same: usize) -> ConvergenceEngine {
        ConvergenceEngine::new(ConvergencePolicy {
            threshold,
            max_same_score_retries: max_same,
        })
    }

    fn record_of(scores: &[f64]) -> ScoreRecord {
        let mut r = ScoreRecord::new();
        for s in scores {
            r.push(*s);
        }
        r
    }

    #[test]
    fn test_analyze_short_history() {
        assert_eq!(record_of(&[]).analyze(), ScoreTrend::default());
        assert_eq!(record_of(&[0.5]).analyze(), ScoreTrend::default());
    }

    #[test]
    fn test_analyze_streak_and_regression() {
        assert_eq!(
            record_of(&[0.2, 0.5, 0.5, 0.5]).analyze(),
            ScoreTrend {
                is_worse: false,
                streak: 3
            }
        );
        assert_eq!(
            record_of(&[0.8, 0.6]).analyze(),
            ScoreTrend {
                is_worse: true,
                streak: 1
            }
        );
    }

    #[test]
    fn test_three_equal_scores_force_pass() {
        let mut e = ConvergenceEngine::with_history(
            ConvergencePolicy {
                threshold: 1.0,
                max_same_score_retries: 3,
            },
            record_of(&[0.5, 0.5]),
        );
        assert_eq!(e.record(0.5), Verdict::Pass { forced: true });
    }

    #[test]
    fn test_regression_rolls_back_exactly_once() {
        let mut e = engine(1.0, 3);
        assert_eq!(e.record(0.8), Verdict::Revise(Severity::Normal));
        assert_eq!(e.record(0.6), Verdict::Rollback);
        assert_eq!(e.scores().scores(), [0.8]);
        assert_eq!(e.record(0.6), Verdict::Revise(Severity::Worse));
        assert_eq!(e.scores().scores(), [0.8, 0.6]);
    }

    #[test]
    fn test_stall_rolls_back_then_revises() {
        let mut e = engine(1.0, 0);
        e.record(0.4);
        assert_eq!(e.record(0.4), Verdict::Rollback);
        assert_eq!(e.record(0.4), Verdict::Revise(Severity::Stalled));
    }

    #[test]
    fn test_passing_rating_passes() {
        let mut e = engine(0.9, 3);
        assert_eq!(e.record(0.95), Verdict::Pass { forced: false });
    }

    #[test]
    fn test_streak_of_passing_scores_is_not_forced() {
        let mut e = ConvergenceEngine::with_history(
            ConvergencePolicy {
                threshold: 0.5,
                max_same_score_retries: 2,
            },
            record_of(&[0.7]),
        );
        assert_eq!(e.record(0.7), Verdict::Pass { forced: false });
    }

    #[test]
    fn test_zero_limit_never_forces() {
        let mut e = engine(1.0, 0);
        for _ in 0..10 {
            assert!(!matches!(e.record(0.3), Verdict::Pass { .. }));
        }
    }

    #[test]
    fn test_score_text() {
        assert_eq!(record_of(&[0.5, 0.75]).to_text(), "0.5, 0.75");
    }
}
