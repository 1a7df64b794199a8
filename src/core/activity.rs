//! Generic activity state machine.
//!
//! Every interactive learning activity (quiz, matching game, budget
//! allocation, reflection, scenario) is the same machine parameterized by a
//! list of stages. The session tracks the current stage, the learner's
//! tentative selection, and an append-only log of evaluated outcomes. All
//! mutations go through the transition methods below; a transition whose guard
//! is not satisfied returns `InvalidState` and leaves the session untouched.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::core::similarity::Tier;
use crate::effects::CelebrationKind;
use crate::error::{KujuaError, Result};

// =============================================================================
// Stage contract
// =============================================================================

/// What a stage reports after evaluating a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct StageEvaluation {
    /// Whether the selection was correct.
    pub correct: bool,
    /// Points earned, in [0, max_score].
    pub score: f64,
    /// Learner-facing feedback.
    pub feedback: String,
    /// Tier, for scored free-text stages.
    pub tier: Option<Tier>,
    /// Whether this outcome lets the activity signal completion.
    pub passed: bool,
}

/// One stage of an activity.
pub trait Stage {
    /// The learner's input for this stage.
    type Selection: Clone + std::fmt::Debug;

    /// Reject selections that do not fit this stage's shape.
    fn validate_selection(&self, selection: &Self::Selection) -> Result<()>;

    /// Evaluate a validated selection. Pure: no side effects.
    fn evaluate(&self, selection: &Self::Selection, config: &Config) -> StageEvaluation;

    /// Maximum points this stage can award.
    fn max_score(&self) -> f64;
}

// =============================================================================
// Session types
// =============================================================================

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Nothing has happened yet.
    NotStarted,
    /// The learner is working on a stage.
    InProgress { stage: usize },
    /// The stage has been evaluated and its feedback is showing.
    StageEvaluated { stage: usize },
    /// Every stage has been evaluated and acknowledged.
    Complete,
}

impl ActivityStatus {
    /// The current stage index, if a stage is active.
    pub fn stage(&self) -> Option<usize> {
        match self {
            ActivityStatus::InProgress { stage } | ActivityStatus::StageEvaluated { stage } => {
                Some(*stage)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityStatus::NotStarted => write!(f, "not_started"),
            ActivityStatus::InProgress { .. } => write!(f, "in_progress"),
            ActivityStatus::StageEvaluated { .. } => write!(f, "stage_evaluated"),
            ActivityStatus::Complete => write!(f, "complete"),
        }
    }
}

/// A logged evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutcome {
    /// Zero-based index of the evaluated stage.
    pub stage: usize,
    pub correct: bool,
    pub score: f64,
    pub max_score: f64,
    pub feedback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    pub passed: bool,
}

/// Final tally handed to completion listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionSummary {
    pub stage_count: usize,
    pub correct_count: usize,
    pub aggregate_score: f64,
    pub max_score: f64,
    /// Whether every outcome passed, i.e. completion is signalled.
    pub passed: bool,
    /// Celebration the host should show, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub celebration: Option<CelebrationKind>,
}

impl CompletionSummary {
    /// Share of the maximum score earned, in [0, 1].
    pub fn score_ratio(&self) -> f64 {
        if self.max_score > 0.0 {
            (self.aggregate_score / self.max_score).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Result of a successful `advance`.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Moved on to the given stage.
    Next { stage: usize },
    /// The activity finished.
    Completed(CompletionSummary),
}

/// Receives the completion summary once per finished, passing run.
pub trait CompletionListener {
    fn on_complete(&mut self, summary: &CompletionSummary);
}

impl<F: FnMut(&CompletionSummary)> CompletionListener for F {
    fn on_complete(&mut self, summary: &CompletionSummary) {
        self(summary)
    }
}

// =============================================================================
// Session
// =============================================================================

/// One learner's run through an activity.
pub struct ActivitySession<'a, S: Stage> {
    stages: Vec<S>,
    config: &'a Config,
    status: ActivityStatus,
    tentative: Option<S::Selection>,
    outcomes: Vec<StageOutcome>,
    listeners: Vec<Box<dyn CompletionListener + 'a>>,
}

impl<'a, S: Stage> std::fmt::Debug for ActivitySession<'a, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivitySession")
            .field("stages", &self.stages.len())
            .field("status", &self.status)
            .field("tentative", &self.tentative)
            .field("outcomes", &self.outcomes)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<'a, S: Stage> ActivitySession<'a, S> {
    /// Create a session over a non-empty list of stages.
    pub fn new(stages: Vec<S>, config: &'a Config) -> Result<Self> {
        if stages.is_empty() {
            return Err(KujuaError::activity("an activity needs at least one stage"));
        }

        Ok(Self {
            stages,
            config,
            status: ActivityStatus::NotStarted,
            tentative: None,
            outcomes: Vec::new(),
            listeners: Vec::new(),
        })
    }

    /// Register a listener for the completion signal.
    pub fn on_complete(&mut self, listener: impl CompletionListener + 'a) {
        self.listeners.push(Box::new(listener));
    }

    pub fn status(&self) -> ActivityStatus {
        self.status
    }

    pub fn stages(&self) -> &[S] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// The stage the learner is on, if any.
    pub fn current_stage(&self) -> Option<&S> {
        self.status.stage().and_then(|i| self.stages.get(i))
    }

    pub fn tentative(&self) -> Option<&S::Selection> {
        self.tentative.as_ref()
    }

    /// Every evaluated outcome, in order.
    pub fn outcome_log(&self) -> &[StageOutcome] {
        &self.outcomes
    }

    /// Sum of logged scores.
    pub fn aggregate_score(&self) -> f64 {
        self.outcomes.iter().map(|o| o.score).sum()
    }

    /// Sum of every stage's maximum.
    pub fn max_score(&self) -> f64 {
        self.stages.iter().map(S::max_score).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.status == ActivityStatus::Complete
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Transition: NotStarted → InProgress(0)
    pub fn start(&mut self) -> Result<()> {
        if self.status != ActivityStatus::NotStarted {
            return Err(self.guard_error("start"));
        }

        self.status = ActivityStatus::InProgress { stage: 0 };
        debug!(stages = self.stages.len(), "activity started");
        Ok(())
    }

    /// Record a tentative selection for the current stage.
    ///
    /// Replaces any earlier selection. Never touches the outcome log.
    pub fn select(&mut self, selection: S::Selection) -> Result<()> {
        let ActivityStatus::InProgress { stage } = self.status else {
            return Err(self.guard_error("select"));
        };

        self.stages[stage].validate_selection(&selection)?;
        self.tentative = Some(selection);
        Ok(())
    }

    /// Transition: InProgress(i) → StageEvaluated(i)
    ///
    /// Requires a tentative selection. Once a stage is evaluated, further
    /// calls return the logged outcome unchanged.
    pub fn evaluate(&mut self) -> Result<&StageOutcome> {
        match self.status {
            ActivityStatus::StageEvaluated { .. } => self
                .outcomes
                .last()
                .ok_or_else(|| KujuaError::invalid_state("evaluated stage has no logged outcome")),
            ActivityStatus::InProgress { stage } => {
                let Some(selection) = self.tentative.as_ref() else {
                    return Err(KujuaError::invalid_state(format!(
                        "Cannot evaluate stage {} without a selection",
                        stage
                    )));
                };

                let current = &self.stages[stage];
                let evaluation = current.evaluate(selection, self.config);
                let max_score = current.max_score();
                let outcome = StageOutcome {
                    stage,
                    correct: evaluation.correct,
                    score: evaluation.score.clamp(0.0, max_score.max(0.0)),
                    max_score,
                    feedback: evaluation.feedback,
                    tier: evaluation.tier,
                    passed: evaluation.passed,
                };
                debug!(
                    stage,
                    correct = outcome.correct,
                    score = outcome.score,
                    "stage evaluated"
                );

                self.outcomes.push(outcome);
                self.status = ActivityStatus::StageEvaluated { stage };
                self.outcomes
                    .last()
                    .ok_or_else(|| KujuaError::invalid_state("outcome log is empty"))
            }
            _ => Err(self.guard_error("evaluate")),
        }
    }

    /// Transition: StageEvaluated(i) → InProgress(i+1), or → Complete after
    /// the last stage.
    ///
    /// Completion only reports the celebration in `summary.celebration`. The
    /// session never drives an effect itself; the host draws it through a
    /// [`CelebrationGuard`](crate::effects::CelebrationGuard) over its own
    /// `EffectTrigger`, as `kujua play` does.
    pub fn advance(&mut self) -> Result<Advance> {
        let ActivityStatus::StageEvaluated { stage } = self.status else {
            return Err(self.guard_error("advance"));
        };

        self.tentative = None;

        let next = stage + 1;
        if next < self.stages.len() {
            self.status = ActivityStatus::InProgress { stage: next };
            return Ok(Advance::Next { stage: next });
        }

        self.status = ActivityStatus::Complete;
        let summary = self.summarize();
        info!(
            score = summary.aggregate_score,
            max = summary.max_score,
            passed = summary.passed,
            "activity complete"
        );

        if summary.passed {
            for listener in &mut self.listeners {
                listener.on_complete(&summary);
            }
        }

        Ok(Advance::Completed(summary))
    }

    /// Transition: any → NotStarted
    pub fn reset(&mut self) {
        self.status = ActivityStatus::NotStarted;
        self.tentative = None;
        self.outcomes.clear();
        debug!("activity reset");
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn summarize(&self) -> CompletionSummary {
        let passed = self.outcomes.iter().all(|o| o.passed);
        let mut summary = CompletionSummary {
            stage_count: self.stages.len(),
            correct_count: self.outcomes.iter().filter(|o| o.correct).count(),
            aggregate_score: self.aggregate_score(),
            max_score: self.max_score(),
            passed,
            celebration: None,
        };

        if passed && summary.score_ratio() >= self.config.celebration.grand_threshold {
            summary.celebration = Some(CelebrationKind::Fireworks);
        }
        summary
    }

    fn guard_error(&self, action: &str) -> KujuaError {
        KujuaError::invalid_state(format!("Cannot {} in {} state", action, self.status))
    }
}
