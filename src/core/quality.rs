//! Response quality gate.
//!
//! Decides whether a learner's free-text reflection or scenario answer is
//! substantive enough to accept. Each heuristic is a separate predicate so
//! thresholds can be tuned and audited independently; the gate reports the
//! first one that fails.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{QualityConfig, QualityThresholds};

/// Runs of five or more ASCII consonants.
static CONSONANT_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[b-df-hj-np-tv-z]{5,}").expect("consonant run pattern is valid")
});

/// Words of this many characters or fewer count as "short".
pub const SHORT_WORD_MAX_CHARS: usize = 2;

// =============================================================================
// Types
// =============================================================================

/// Which call site's thresholds to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    /// Reflection prompts (5 words, 70% short-word cutoff).
    Reflection,
    /// Scenario responses (8 words, 60% short-word cutoff).
    Scenario,
    /// Parallel gibberish check used by the similarity scorer.
    Strict,
}

impl QualityPreset {
    /// Pick this preset's thresholds out of the config.
    pub fn thresholds<'a>(&self, config: &'a QualityConfig) -> &'a QualityThresholds {
        match self {
            QualityPreset::Reflection => &config.reflection,
            QualityPreset::Scenario => &config.scenario,
            QualityPreset::Strict => &config.strict,
        }
    }
}

impl std::fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityPreset::Reflection => write!(f, "reflection"),
            QualityPreset::Scenario => write!(f, "scenario"),
            QualityPreset::Strict => write!(f, "strict"),
        }
    }
}

impl std::str::FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reflection" => Ok(QualityPreset::Reflection),
            "scenario" => Ok(QualityPreset::Scenario),
            "strict" => Ok(QualityPreset::Strict),
            other => Err(format!("unknown quality preset: '{}'", other)),
        }
    }
}

/// Why a response was rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Trimmed text is shorter than the minimum.
    TooShort { chars: usize, min: usize },
    /// Not enough words.
    TooFewWords { words: usize, min: usize },
    /// The same character repeated many times in a row.
    RepeatedCharacters { run: usize },
    /// Too many one- or two-letter words.
    FragmentedWords { ratio: f64, max: f64 },
    /// Too many long consonant clusters.
    ConsonantRuns { count: usize, max: usize },
    /// Too few vowels among letters.
    LowVowelRatio { ratio: f64, min: f64 },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::TooShort { chars, min } => {
                write!(f, "too short: {} chars (min: {})", chars, min)
            }
            Rejection::TooFewWords { words, min } => {
                write!(f, "too few words: {} (min: {})", words, min)
            }
            Rejection::RepeatedCharacters { run } => {
                write!(f, "a character is repeated {} or more times in a row", run)
            }
            Rejection::FragmentedWords { ratio, max } => write!(
                f,
                "too many very short words: {:.0}% (max: {:.0}%)",
                ratio * 100.0,
                max * 100.0
            ),
            Rejection::ConsonantRuns { count, max } => {
                write!(f, "too many consonant clusters: {} (max: {})", count, max)
            }
            Rejection::LowVowelRatio { ratio, min } => write!(
                f,
                "too few vowels: {:.0}% (min: {:.0}%)",
                ratio * 100.0,
                min * 100.0
            ),
        }
    }
}

/// Result of running the quality gate over one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityVerdict {
    /// Whether the text may be accepted.
    pub accepted: bool,
    /// The first heuristic that failed, if any.
    pub rejection: Option<Rejection>,
}

impl QualityVerdict {
    fn accept() -> Self {
        Self {
            accepted: true,
            rejection: None,
        }
    }

    fn reject(rejection: Rejection) -> Self {
        Self {
            accepted: false,
            rejection: Some(rejection),
        }
    }
}

/// A learner submission with its derived views.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSample<'a> {
    /// The raw submitted text.
    pub raw: &'a str,
    /// Whitespace-separated tokens.
    pub words: Vec<&'a str>,
    /// Length of the trimmed text in characters.
    pub trimmed_chars: usize,
}

impl<'a> TextSample<'a> {
    /// Derive the word list and trimmed length from raw text.
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            words: raw.split_whitespace().collect(),
            trimmed_chars: raw.trim().chars().count(),
        }
    }
}

// =============================================================================
// Gate
// =============================================================================

/// Quality gate bound to one set of thresholds.
#[derive(Debug, Clone, Copy)]
pub struct QualityGate<'a> {
    thresholds: &'a QualityThresholds,
}

impl<'a> QualityGate<'a> {
    /// Create a gate for the given thresholds.
    pub fn new(thresholds: &'a QualityThresholds) -> Self {
        Self { thresholds }
    }

    /// Create a gate for a preset of the given config.
    pub fn for_preset(config: &'a QualityConfig, preset: QualityPreset) -> Self {
        Self::new(preset.thresholds(config))
    }

    /// Run every heuristic in order and report the first failure.
    pub fn check(&self, text: &str) -> QualityVerdict {
        let sample = TextSample::new(text);
        let t = self.thresholds;

        let verdict = if sample.trimmed_chars < t.min_chars {
            QualityVerdict::reject(Rejection::TooShort {
                chars: sample.trimmed_chars,
                min: t.min_chars,
            })
        } else if sample.words.len() < t.min_words {
            QualityVerdict::reject(Rejection::TooFewWords {
                words: sample.words.len(),
                min: t.min_words,
            })
        } else if has_repeated_run(sample.raw, t.repeat_run) {
            QualityVerdict::reject(Rejection::RepeatedCharacters { run: t.repeat_run })
        } else if short_word_ratio(&sample.words) > t.max_short_word_ratio {
            QualityVerdict::reject(Rejection::FragmentedWords {
                ratio: short_word_ratio(&sample.words),
                max: t.max_short_word_ratio,
            })
        } else if consonant_run_count(sample.raw) > t.max_consonant_runs {
            QualityVerdict::reject(Rejection::ConsonantRuns {
                count: consonant_run_count(sample.raw),
                max: t.max_consonant_runs,
            })
        } else {
            match vowel_ratio(sample.raw) {
                Some(ratio) if ratio < t.min_vowel_ratio => {
                    QualityVerdict::reject(Rejection::LowVowelRatio {
                        ratio,
                        min: t.min_vowel_ratio,
                    })
                }
                _ => QualityVerdict::accept(),
            }
        };

        if let Some(ref rejection) = verdict.rejection {
            debug!(%rejection, "response rejected by quality gate");
        }

        verdict
    }

    /// Shorthand for `check(text).accepted`.
    pub fn accepts(&self, text: &str) -> bool {
        self.check(text).accepted
    }
}

/// Evaluate text against one of the built-in presets with default thresholds.
pub fn evaluate_quality(text: &str, preset: QualityPreset) -> bool {
    let config = QualityConfig::default();
    QualityGate::for_preset(&config, preset).accepts(text)
}

// =============================================================================
// Heuristics
// =============================================================================

/// Whether any character (other than a newline) repeats `run` times in a row.
pub fn has_repeated_run(text: &str, run: usize) -> bool {
    if run < 2 {
        return !text.is_empty();
    }

    let mut previous: Option<char> = None;
    let mut length = 0usize;

    for c in text.chars() {
        if c != '\n' && Some(c) == previous {
            length += 1;
        } else {
            length = 1;
        }
        if c != '\n' && length >= run {
            return true;
        }
        previous = Some(c);
    }

    false
}

/// Share of words with at most [`SHORT_WORD_MAX_CHARS`] characters.
///
/// Returns 0.0 for an empty word list.
pub fn short_word_ratio(words: &[&str]) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let short = words
        .iter()
        .filter(|w| w.chars().count() <= SHORT_WORD_MAX_CHARS)
        .count();
    short as f64 / words.len() as f64
}

/// Number of non-overlapping runs of five or more consonants.
pub fn consonant_run_count(text: &str) -> usize {
    CONSONANT_RUN.find_iter(text).count()
}

/// Share of ASCII letters that are vowels, or `None` when there are no letters.
pub fn vowel_ratio(text: &str) -> Option<f64> {
    let mut letters = 0usize;
    let mut vowels = 0usize;

    for c in text.chars().filter(char::is_ascii_alphabetic) {
        letters += 1;
        if matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u') {
            vowels += 1;
        }
    }

    if letters == 0 {
        None
    } else {
        Some(vowels as f64 / letters as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reflection_gate(config: &QualityConfig) -> QualityGate<'_> {
        QualityGate::for_preset(config, QualityPreset::Reflection)
    }

    // =========================================================================
    // Boundaries
    // =========================================================================

    #[test]
    fn test_short_text_rejected() {
        assert!(!evaluate_quality("short", QualityPreset::Reflection));

        let config = QualityConfig::default();
        let verdict = reflection_gate(&config).check("short");
        assert_eq!(
            verdict.rejection,
            Some(Rejection::TooShort { chars: 5, min: 10 })
        );
    }

    #[test]
    fn test_genuine_reflection_accepted() {
        assert!(evaluate_quality(
            "this is a genuine reflection about the topic",
            QualityPreset::Reflection
        ));
    }

    #[test]
    fn test_whitespace_only_rejected() {
        assert!(!evaluate_quality("            ", QualityPreset::Reflection));
        assert!(!evaluate_quality("", QualityPreset::Scenario));
    }

    #[test]
    fn test_word_minimum_differs_by_preset() {
        let text = "health workers listened to everyone there";
        assert!(evaluate_quality(text, QualityPreset::Reflection));
        assert!(!evaluate_quality(text, QualityPreset::Scenario));

        let config = QualityConfig::default();
        let verdict = QualityGate::for_preset(&config, QualityPreset::Scenario).check(text);
        assert_eq!(
            verdict.rejection,
            Some(Rejection::TooFewWords { words: 6, min: 8 })
        );
    }

    #[test]
    fn test_strict_requires_twenty_chars() {
        // 8 words but only 15 characters.
        let text = "a b c d e f g h";
        let config = QualityConfig::default();

        let strict = QualityGate::for_preset(&config, QualityPreset::Strict).check(text);
        assert_eq!(
            strict.rejection,
            Some(Rejection::TooShort { chars: 15, min: 20 })
        );

        let scenario = QualityGate::for_preset(&config, QualityPreset::Scenario).check(text);
        assert!(matches!(
            scenario.rejection,
            Some(Rejection::FragmentedWords { .. })
        ));
    }

    // =========================================================================
    // Heuristics
    // =========================================================================

    #[test]
    fn test_repeated_characters_rejected() {
        assert!(!evaluate_quality(
            "aaaaaaaaaa more words here please now",
            QualityPreset::Reflection
        ));
    }

    #[test]
    fn test_has_repeated_run() {
        assert!(has_repeated_run("xxxxx", 5));
        assert!(!has_repeated_run("xxxx", 5));
        assert!(has_repeated_run("ok!!!!! fine", 5));
        assert!(has_repeated_run("a     b", 5));
        assert!(!has_repeated_run("\n\n\n\n\n", 5));
        assert!(!has_repeated_run("abababababab", 5));
    }

    #[test]
    fn test_fragmented_words_rejected() {
        // 6 of 8 words are two characters or fewer: 75% > 70%.
        let text = "to be or no go up community dialogue";
        let config = QualityConfig::default();
        let verdict = reflection_gate(&config).check(text);
        assert!(matches!(
            verdict.rejection,
            Some(Rejection::FragmentedWords { .. })
        ));
    }

    #[test]
    fn test_short_word_cutoff_differs_by_preset() {
        // 5 of 8 short words: 62.5% passes reflection, fails scenario.
        let text = "we go to an ok clinic every week";
        let config = QualityConfig::default();
        assert!(reflection_gate(&config).accepts(text));
        let verdict = QualityGate::for_preset(&config, QualityPreset::Scenario).check(text);
        assert!(matches!(
            verdict.rejection,
            Some(Rejection::FragmentedWords { .. })
        ));
    }

    #[test]
    fn test_short_word_ratio_at_cutoff_accepted() {
        let config = QualityConfig::default();

        // 7 of 10 short words sits exactly on the reflection cutoff.
        let text = "we go to an ok up on clinic every week";
        assert!(reflection_gate(&config).accepts(text));
        let verdict = reflection_gate(&config).check("we go to an ok up on at clinic every week");
        assert!(matches!(
            verdict.rejection,
            Some(Rejection::FragmentedWords { .. })
        ));

        // 6 of 10 sits exactly on the scenario cutoff.
        let scenario = QualityGate::for_preset(&config, QualityPreset::Scenario);
        assert!(scenario.accepts("we go to an ok up clinic every week today"));
        assert!(!scenario.accepts("we go to an ok up on clinic every week"));
    }

    #[test]
    fn test_short_word_ratio() {
        assert_eq!(short_word_ratio(&[]), 0.0);
        assert_eq!(short_word_ratio(&["a", "be", "see", "door"]), 0.5);
    }

    #[test]
    fn test_consonant_runs_rejected() {
        let text = "qwrtplk zxcvbnm hjklmn are all over this page";
        let config = QualityConfig::default();
        let verdict = reflection_gate(&config).check(text);
        assert_eq!(
            verdict.rejection,
            Some(Rejection::ConsonantRuns { count: 3, max: 2 })
        );
    }

    #[test]
    fn test_consonant_runs_at_limit_accepted() {
        let config = QualityConfig::default();
        let text = "strengths and rhythms shape our community work today";
        assert_eq!(consonant_run_count(text), 2);
        assert!(reflection_gate(&config).accepts(text));

        let text = "strengths and rhythms and lengthwise community work today";
        assert_eq!(consonant_run_count(text), 3);
        assert_eq!(
            reflection_gate(&config).check(text).rejection,
            Some(Rejection::ConsonantRuns { count: 3, max: 2 })
        );
    }

    #[test]
    fn test_consonant_run_count() {
        assert_eq!(consonant_run_count("strengths"), 1);
        assert_eq!(consonant_run_count("BCDFG hjklm"), 2);
        assert_eq!(consonant_run_count("community monitoring"), 0);
        // "y" is not treated as a vowel.
        assert_eq!(consonant_run_count("rhythms"), 1);
    }

    #[test]
    fn test_low_vowel_ratio_rejected() {
        assert!(!evaluate_quality(
            "bcdfg hjklm npqrst vwxyz bcdfg hjklm",
            QualityPreset::Scenario
        ));

        // Enough words for scenario, so the failure comes from the letters.
        let text = "bcd fgh jkl mnp qrs tvw xyz bcd fgh";
        let config = QualityConfig::default();
        let verdict = QualityGate::for_preset(&config, QualityPreset::Scenario).check(text);
        assert!(matches!(
            verdict.rejection,
            Some(Rejection::LowVowelRatio { .. })
        ));
    }

    #[test]
    fn test_vowel_ratio_at_minimum_accepted() {
        let config = QualityConfig::default();

        // 3 vowels among 20 letters is exactly 0.15.
        let text = "bcda bcdf bcde bcdf bcdo";
        assert_eq!(vowel_ratio(text), Some(0.15));
        assert!(reflection_gate(&config).accepts(text));

        let text = "bcda bcdf bcdf bcdf bcdo";
        assert!(matches!(
            reflection_gate(&config).check(text).rejection,
            Some(Rejection::LowVowelRatio { .. })
        ));

        let thresholds = QualityThresholds {
            min_vowel_ratio: 0.25,
            ..QualityThresholds::reflection()
        };
        assert!(QualityGate::new(&thresholds).accepts("abcd abcd abcd abcd abcd"));
    }

    #[test]
    fn test_vowel_ratio() {
        assert_eq!(vowel_ratio("1234 !!"), None);
        assert_eq!(vowel_ratio("aeiou"), Some(1.0));
        assert_eq!(vowel_ratio("AbCd"), Some(0.25));
    }

    #[test]
    fn test_non_letter_text_skips_vowel_check() {
        let text = "100 200 300 400 500 600";
        let config = QualityConfig::default();
        assert!(reflection_gate(&config).accepts(text));
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = QualityThresholds {
            min_words: 3,
            ..QualityThresholds::reflection()
        };
        let gate = QualityGate::new(&thresholds);
        assert!(gate.accepts("clinics need more staff"));
    }

    // =========================================================================
    // Preset parsing
    // =========================================================================

    #[test]
    fn test_preset_from_str_and_display() {
        assert_eq!(
            "Reflection".parse::<QualityPreset>(),
            Ok(QualityPreset::Reflection)
        );
        assert_eq!(
            "scenario".parse::<QualityPreset>(),
            Ok(QualityPreset::Scenario)
        );
        assert_eq!("strict".parse::<QualityPreset>(), Ok(QualityPreset::Strict));
        assert!("essay".parse::<QualityPreset>().is_err());
        assert_eq!(QualityPreset::Scenario.to_string(), "scenario");
    }

    #[test]
    fn test_rejection_display() {
        assert!(Rejection::TooShort { chars: 3, min: 10 }
            .to_string()
            .contains("too short"));
        assert!(Rejection::LowVowelRatio {
            ratio: 0.1,
            min: 0.15
        }
        .to_string()
        .contains("too few vowels"));
    }

    // =========================================================================
    // Property-based tests
    // =========================================================================

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_preset() -> impl Strategy<Value = QualityPreset> {
            prop_oneof![
                Just(QualityPreset::Reflection),
                Just(QualityPreset::Scenario),
                Just(QualityPreset::Strict),
            ]
        }

        proptest! {
            #[test]
            fn prop_gate_is_deterministic(text in ".{0,120}", preset in arb_preset()) {
                prop_assert_eq!(
                    evaluate_quality(&text, preset),
                    evaluate_quality(&text, preset)
                );
            }

            #[test]
            fn prop_accepted_means_no_rejection(text in "[a-z ]{0,80}", preset in arb_preset()) {
                let config = QualityConfig::default();
                let verdict = QualityGate::for_preset(&config, preset).check(&text);
                prop_assert_eq!(verdict.accepted, verdict.rejection.is_none());
            }

            #[test]
            fn prop_strict_accepts_subset_of_scenario(text in "[a-z ]{0,80}") {
                if evaluate_quality(&text, QualityPreset::Strict) {
                    prop_assert!(evaluate_quality(&text, QualityPreset::Scenario));
                }
            }
        }
    }
}
