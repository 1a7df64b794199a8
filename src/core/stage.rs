//! Stage kinds for activity definitions.
//!
//! Each kind is a small pure scoring rule. `StageDef` ties them together so
//! an activity file can mix kinds, and implements [`Stage`] with a single
//! [`StageInput`] selection type.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::activity::{Stage, StageEvaluation};
use crate::core::quality::{QualityGate, QualityPreset};
use crate::core::similarity::{classify_response, Tier};
use crate::error::{KujuaError, Result};

/// Allocations are percentages and must add up to this.
pub const ALLOCATION_TOTAL: u32 = 100;

fn default_points() -> f64 {
    1.0
}

fn default_allocation_points() -> f64 {
    10.0
}

fn default_pass_ratio() -> f64 {
    0.7
}

fn default_scenario_points() -> f64 {
    10.0
}

// =============================================================================
// Definitions
// =============================================================================

/// One stage of an activity file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageDef {
    Choice(ChoiceStage),
    Matching(MatchingStage),
    Allocation(AllocationStage),
    Reflection(ReflectionStage),
    Scenario(ScenarioStage),
}

/// Pick one option. A quiz question is a choice with one scoring option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceStage {
    pub prompt: String,
    pub options: Vec<ChoiceOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: String,
    #[serde(default)]
    pub points: f64,
    #[serde(default)]
    pub feedback: String,
}

/// Match every left item to its right item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingStage {
    pub prompt: String,
    pub pairs: Vec<MatchPair>,
    #[serde(default = "default_points")]
    pub points_per_pair: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

/// Split 100% across categories, scored by distance from the ideal split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationStage {
    pub prompt: String,
    pub categories: Vec<AllocationCategory>,
    #[serde(default = "default_allocation_points")]
    pub points: f64,
    /// Share of the maximum needed to count as correct.
    #[serde(default = "default_pass_ratio")]
    pub pass_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationCategory {
    pub name: String,
    /// Recommended percentage.
    pub ideal: u32,
}

/// Free-text reflection checked by the quality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionStage {
    pub prompt: String,
    #[serde(default = "default_points")]
    pub points: f64,
}

/// Free-text scenario answer scored against a model answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStage {
    pub prompt: String,
    #[serde(default)]
    pub reference_answer: Option<String>,
    #[serde(default = "default_scenario_points")]
    pub points: f64,
}

/// A learner's input for any stage kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StageInput {
    /// Index into the choice options.
    Choice(usize),
    /// For each left item, the index of the right item it was matched to.
    Matching(Vec<usize>),
    /// Percentage per category.
    Allocation(Vec<u32>),
    /// Reflection or scenario text.
    Text(String),
}

impl StageInput {
    fn kind(&self) -> &'static str {
        match self {
            StageInput::Choice(_) => "choice",
            StageInput::Matching(_) => "matching",
            StageInput::Allocation(_) => "allocation",
            StageInput::Text(_) => "text",
        }
    }
}

impl StageDef {
    pub fn prompt(&self) -> &str {
        match self {
            StageDef::Choice(s) => &s.prompt,
            StageDef::Matching(s) => &s.prompt,
            StageDef::Allocation(s) => &s.prompt,
            StageDef::Reflection(s) => &s.prompt,
            StageDef::Scenario(s) => &s.prompt,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StageDef::Choice(_) => "choice",
            StageDef::Matching(_) => "matching",
            StageDef::Allocation(_) => "allocation",
            StageDef::Reflection(_) => "reflection",
            StageDef::Scenario(_) => "scenario",
        }
    }

    /// Check that the definition is playable.
    pub fn validate(&self) -> Result<()> {
        match self {
            StageDef::Choice(s) => {
                if s.options.is_empty() {
                    return Err(KujuaError::activity("choice stage has no options"));
                }
                if s.options.iter().any(|o| !o.points.is_finite() || o.points < 0.0) {
                    return Err(KujuaError::activity(
                        "choice option points must be non-negative",
                    ));
                }
            }
            StageDef::Matching(s) => {
                if s.pairs.is_empty() {
                    return Err(KujuaError::activity("matching stage has no pairs"));
                }
                if !s.points_per_pair.is_finite() || s.points_per_pair < 0.0 {
                    return Err(KujuaError::activity(
                        "matching points_per_pair must be non-negative",
                    ));
                }
            }
            StageDef::Allocation(s) => {
                if s.categories.is_empty() {
                    return Err(KujuaError::activity("allocation stage has no categories"));
                }
                if let Some(c) = s.categories.iter().find(|c| c.ideal > ALLOCATION_TOTAL) {
                    return Err(KujuaError::activity(format!(
                        "allocation ideal for '{}' is {} (at most {})",
                        c.name, c.ideal, ALLOCATION_TOTAL
                    )));
                }
                let total: u64 = s.categories.iter().map(|c| u64::from(c.ideal)).sum();
                if total != u64::from(ALLOCATION_TOTAL) {
                    return Err(KujuaError::activity(format!(
                        "allocation ideals sum to {} (must be {})",
                        total, ALLOCATION_TOTAL
                    )));
                }
                if !(0.0..=1.0).contains(&s.pass_ratio) {
                    return Err(KujuaError::activity(
                        "allocation pass_ratio must be between 0 and 1",
                    ));
                }
                if !s.points.is_finite() || s.points < 0.0 {
                    return Err(KujuaError::activity("allocation points must be non-negative"));
                }
            }
            StageDef::Reflection(s) if !s.points.is_finite() || s.points < 0.0 => {
                return Err(KujuaError::activity("reflection points must be non-negative"));
            }
            StageDef::Scenario(s) if !s.points.is_finite() || s.points < 0.0 => {
                return Err(KujuaError::activity("scenario points must be non-negative"));
            }
            _ => {}
        }
        Ok(())
    }
}

// =============================================================================
// Scoring rules
// =============================================================================

impl ChoiceStage {
    pub fn max_score(&self) -> f64 {
        self.options
            .iter()
            .map(|o| o.points)
            .fold(0.0, f64::max)
    }

    pub fn evaluate(&self, choice: usize) -> StageEvaluation {
        let Some(option) = self.options.get(choice) else {
            return StageEvaluation {
                correct: false,
                score: 0.0,
                feedback: "No such option.".to_string(),
                tier: None,
                passed: false,
            };
        };

        let correct = option.points >= self.max_score();
        let feedback = if !option.feedback.is_empty() {
            option.feedback.clone()
        } else if correct {
            "Correct!".to_string()
        } else {
            "Not quite.".to_string()
        };

        StageEvaluation {
            correct,
            score: option.points,
            feedback,
            tier: None,
            passed: true,
        }
    }
}

impl MatchingStage {
    pub fn max_score(&self) -> f64 {
        self.pairs.len() as f64 * self.points_per_pair
    }

    /// `matches[i]` is the right index chosen for left item `i`.
    pub fn evaluate(&self, matches: &[usize]) -> StageEvaluation {
        let correct_pairs = matches
            .iter()
            .enumerate()
            .filter(|(left, right)| left == *right)
            .count();
        let all = correct_pairs == self.pairs.len();

        StageEvaluation {
            correct: all,
            score: correct_pairs as f64 * self.points_per_pair,
            feedback: if all {
                "Every pair matched!".to_string()
            } else {
                format!("{} of {} pairs matched.", correct_pairs, self.pairs.len())
            },
            tier: None,
            passed: true,
        }
    }
}

impl AllocationStage {
    pub fn max_score(&self) -> f64 {
        self.points
    }

    /// Share of the maximum earned by an allocation, in [0, 1].
    ///
    /// Two splits of 100 can differ by at most 200 points in total.
    pub fn accuracy(&self, allocation: &[u32]) -> f64 {
        let deviation: u64 = self
            .categories
            .iter()
            .zip(allocation)
            .map(|(c, a)| u64::from(c.ideal.abs_diff(*a)))
            .sum();
        (1.0 - deviation as f64 / (2 * ALLOCATION_TOTAL) as f64).clamp(0.0, 1.0)
    }

    pub fn evaluate(&self, allocation: &[u32]) -> StageEvaluation {
        let accuracy = self.accuracy(allocation);
        let correct = accuracy >= self.pass_ratio;

        let widest = self
            .categories
            .iter()
            .zip(allocation)
            .max_by_key(|(c, a)| c.ideal.abs_diff(**a));
        let feedback = match widest {
            Some((category, given)) if !correct => format!(
                "Largest gap: {} ({}% vs recommended {}%).",
                category.name, given, category.ideal
            ),
            _ => "Well balanced allocation.".to_string(),
        };

        StageEvaluation {
            correct,
            score: self.points * accuracy,
            feedback,
            tier: None,
            passed: true,
        }
    }
}

impl ReflectionStage {
    pub fn evaluate(&self, text: &str, config: &Config) -> StageEvaluation {
        let verdict = QualityGate::for_preset(&config.quality, QualityPreset::Reflection).check(text);
        match verdict.rejection {
            None => StageEvaluation {
                correct: true,
                score: self.points,
                feedback: "Thank you for your thoughtful reflection.".to_string(),
                tier: None,
                passed: true,
            },
            Some(rejection) => StageEvaluation {
                correct: false,
                score: 0.0,
                feedback: format!("Please write a more thoughtful response: {}.", rejection),
                tier: None,
                passed: false,
            },
        }
    }
}

impl ScenarioStage {
    pub fn evaluate(&self, text: &str, config: &Config) -> StageEvaluation {
        let result = classify_response(text, self.reference_answer.as_deref(), config);
        let (score, feedback) = match result.tier {
            Tier::Excellent => (
                self.points,
                "Excellent! Your answer covers the key ideas.",
            ),
            Tier::Good => (
                self.points / 2.0,
                "Good answer. Compare it with the model answer to see what you could add.",
            ),
            Tier::NeedsWork => (
                0.0,
                "Your answer needs more work. Add detail about the evidence and how it would be used.",
            ),
        };

        StageEvaluation {
            correct: result.signals_completion(),
            score,
            feedback: feedback.to_string(),
            tier: Some(result.tier),
            passed: result.signals_completion(),
        }
    }
}

// =============================================================================
// Stage impl
// =============================================================================

impl Stage for StageDef {
    type Selection = StageInput;

    fn validate_selection(&self, selection: &StageInput) -> Result<()> {
        match (self, selection) {
            (StageDef::Choice(s), StageInput::Choice(i)) => {
                if *i >= s.options.len() {
                    return Err(KujuaError::invalid_selection(format!(
                        "option {} out of range (0..{})",
                        i,
                        s.options.len()
                    )));
                }
            }
            (StageDef::Matching(s), StageInput::Matching(matches)) => {
                let n = s.pairs.len();
                if matches.len() != n {
                    return Err(KujuaError::invalid_selection(format!(
                        "expected {} matches, got {}",
                        n,
                        matches.len()
                    )));
                }
                let mut seen = vec![false; n];
                for &right in matches {
                    if right >= n {
                        return Err(KujuaError::invalid_selection(format!(
                            "match {} out of range (0..{})",
                            right, n
                        )));
                    }
                    if seen[right] {
                        return Err(KujuaError::invalid_selection(format!(
                            "item {} matched more than once",
                            right
                        )));
                    }
                    seen[right] = true;
                }
            }
            (StageDef::Allocation(s), StageInput::Allocation(split)) => {
                if split.len() != s.categories.len() {
                    return Err(KujuaError::invalid_selection(format!(
                        "expected {} allocations, got {}",
                        s.categories.len(),
                        split.len()
                    )));
                }
                if let Some(share) = split.iter().find(|a| **a > ALLOCATION_TOTAL) {
                    return Err(KujuaError::invalid_selection(format!(
                        "allocation {}% is above {}%",
                        share, ALLOCATION_TOTAL
                    )));
                }
                let total: u64 = split.iter().copied().map(u64::from).sum();
                if total != u64::from(ALLOCATION_TOTAL) {
                    return Err(KujuaError::invalid_selection(format!(
                        "allocations sum to {}% (must be {}%)",
                        total, ALLOCATION_TOTAL
                    )));
                }
            }
            (StageDef::Reflection(_) | StageDef::Scenario(_), StageInput::Text(text)) => {
                if text.trim().is_empty() {
                    return Err(KujuaError::invalid_selection("response is empty"));
                }
            }
            (stage, input) => {
                return Err(KujuaError::invalid_selection(format!(
                    "{} input does not fit a {} stage",
                    input.kind(),
                    stage.kind()
                )));
            }
        }
        Ok(())
    }

    fn evaluate(&self, selection: &StageInput, config: &Config) -> StageEvaluation {
        match (self, selection) {
            (StageDef::Choice(s), StageInput::Choice(i)) => s.evaluate(*i),
            (StageDef::Matching(s), StageInput::Matching(m)) => s.evaluate(m),
            (StageDef::Allocation(s), StageInput::Allocation(a)) => s.evaluate(a),
            (StageDef::Reflection(s), StageInput::Text(t)) => s.evaluate(t, config),
            (StageDef::Scenario(s), StageInput::Text(t)) => s.evaluate(t, config),
            // A mismatched input earns nothing and never passes.
            _ => StageEvaluation {
                correct: false,
                score: 0.0,
                feedback: String::new(),
                tier: None,
                passed: false,
            },
        }
    }

    fn max_score(&self) -> f64 {
        match self {
            StageDef::Choice(s) => s.max_score(),
            StageDef::Matching(s) => s.max_score(),
            StageDef::Allocation(s) => s.max_score(),
            StageDef::Reflection(s) => s.points,
            StageDef::Scenario(s) => s.points,
        }
    }
}
