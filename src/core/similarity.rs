//! Scenario similarity scoring.
//!
//! Compares a learner's free-text answer with a model answer and a fixed
//! CLM/PPPR vocabulary, then buckets the score into a feedback tier.
//!
//! The score is intentionally asymmetric: matches are counted over the
//! learner's tokens while the denominator is the longer of the two lists.
//! No stemming is performed, so "community" and "communities" do not match
//! lexically (the keyword bonus still rewards both).

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, SimilarityConfig};
use crate::core::quality::{QualityGate, QualityPreset};

/// Anything that is neither a word character nor whitespace.
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("non-word pattern is valid"));

/// Tokens shorter than this are ignored when scoring.
pub const MIN_TOKEN_CHARS: usize = 3;

/// Domain vocabulary rewarded by the keyword bonus.
pub const DOMAIN_KEYWORDS: &[&str] = &[
    "community",
    "monitor",
    "monitoring",
    "data",
    "evidence",
    "accountability",
    "advocacy",
    "advocate",
    "feedback",
    "dialogue",
    "health",
    "service",
    "quality",
    "access",
    "rights",
    "participation",
    "engagement",
    "transparency",
    "pandemic",
    "preparedness",
    "response",
    "prevention",
    "surveillance",
    "stakeholder",
    "collect",
    "analysis",
    "report",
    "equity",
    "trust",
    "clm",
];

// =============================================================================
// Types
// =============================================================================

/// Coarse feedback bucket for a scored response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    /// Close to the model answer; completes the activity with a celebration.
    Excellent,
    /// Partially aligned; completes the activity.
    Good,
    /// Off-target or not substantive; the learner is invited to retry.
    NeedsWork,
}

impl Tier {
    /// Whether this tier completes the activity.
    pub fn signals_completion(&self) -> bool {
        matches!(self, Tier::Excellent | Tier::Good)
    }

    /// Whether this tier triggers the celebration effect.
    pub fn celebrates(&self) -> bool {
        matches!(self, Tier::Excellent)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Excellent => write!(f, "excellent"),
            Tier::Good => write!(f, "good"),
            Tier::NeedsWork => write!(f, "needs-work"),
        }
    }
}

/// Score and tier for one scenario submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityResult {
    /// Bounded similarity score in [0, 1].
    pub score: f64,
    /// Feedback tier derived from the score.
    pub tier: Tier,
}

impl SimilarityResult {
    /// Whether the hosting page should fire its completion callback.
    pub fn signals_completion(&self) -> bool {
        self.tier.signals_completion()
    }

    /// Whether the hosting page should show the celebration effect.
    pub fn celebrates(&self) -> bool {
        self.tier.celebrates()
    }
}

// =============================================================================
// Scoring
// =============================================================================

/// Lowercase, strip punctuation, split on whitespace, drop short tokens.
pub fn normalize_tokens(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    NON_WORD
        .replace_all(&lowered, "")
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// Lexical overlap of user tokens with the reference, in [0, 1].
fn base_similarity(user: &[String], reference: &[String]) -> f64 {
    let reference_set: HashSet<&str> = reference.iter().map(String::as_str).collect();
    let matching = user
        .iter()
        .filter(|token| reference_set.contains(token.as_str()))
        .count();
    matching as f64 / user.len().max(reference.len()) as f64
}

/// Number of user tokens that contain, or are contained by, a domain keyword.
pub fn keyword_hits(tokens: &[String]) -> usize {
    tokens
        .iter()
        .filter(|token| {
            DOMAIN_KEYWORDS
                .iter()
                .any(|kw| token.contains(kw) || kw.contains(token.as_str()))
        })
        .count()
}

/// Score a user answer against a reference with explicit weights.
pub fn score_with(config: &SimilarityConfig, user_text: &str, reference_text: &str) -> f64 {
    let user = normalize_tokens(user_text);
    let reference = normalize_tokens(reference_text);

    if user.is_empty() || reference.is_empty() {
        return 0.0;
    }

    let base = base_similarity(&user, &reference);
    let bonus =
        (keyword_hits(&user) as f64 * config.keyword_weight).min(config.keyword_bonus_cap);

    (base + bonus).min(1.0)
}

/// Score a user answer against a reference with the default weights.
pub fn score_similarity(user_text: &str, reference_text: &str) -> f64 {
    score_with(&SimilarityConfig::default(), user_text, reference_text)
}

/// Map a score onto a tier using the configured thresholds.
pub fn tier_for(config: &SimilarityConfig, score: f64) -> Tier {
    if score >= config.excellent_threshold {
        Tier::Excellent
    } else if score >= config.good_threshold {
        Tier::Good
    } else {
        Tier::NeedsWork
    }
}

/// Classify a scenario answer.
///
/// Text that fails the strict quality gate is `needs-work` whatever its
/// overlap. With no reference answer (or a blank one) the activity degrades to
/// a participation check and any substantive answer is `good`.
pub fn classify_response(
    user_text: &str,
    reference_text: Option<&str>,
    config: &Config,
) -> SimilarityResult {
    let gate = QualityGate::for_preset(&config.quality, QualityPreset::Strict);
    let verdict = gate.check(user_text);
    if !verdict.accepted {
        return SimilarityResult {
            score: 0.0,
            tier: Tier::NeedsWork,
        };
    }

    let reference = match reference_text.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => {
            debug!("no reference answer, treating submission as participation");
            return SimilarityResult {
                score: 0.0,
                tier: Tier::Good,
            };
        }
    };

    let score = score_with(&config.similarity, user_text, reference);
    let tier = tier_for(&config.similarity, score);
    debug!(score, %tier, "scenario response scored");

    SimilarityResult { score, tier }
}
