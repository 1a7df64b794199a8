//! Configuration loading for Kujua.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.kujua/config.toml`)
//! 3. User config (`~/.kujua/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. The defaults reproduce the thresholds the
//! course shipped with, so an empty config changes nothing.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{KujuaError, Result};

/// Name of the per-project and per-user Kujua directory.
pub const KUJUA_DIR: &str = ".kujua";

/// Main configuration struct for Kujua.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Response quality gate thresholds, one set per preset.
    pub quality: QualityConfig,
    /// Similarity scoring and tiering.
    pub similarity: SimilarityConfig,
    /// Celebration effect configuration.
    pub celebration: CelebrationConfig,
}

// =============================================================================
// Quality gate
// =============================================================================

/// Quality gate thresholds for every preset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityConfig {
    /// Thresholds for reflection prompts.
    pub reflection: QualityThresholds,
    /// Thresholds for scenario responses.
    pub scenario: QualityThresholds,
    /// Thresholds for the scorer's parallel gibberish check.
    pub strict: QualityThresholds,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            reflection: QualityThresholds::reflection(),
            scenario: QualityThresholds::scenario(),
            strict: QualityThresholds::strict(),
        }
    }
}

/// Thresholds for a single quality gate preset.
///
/// The reflection and scenario call sites historically used different word
/// minimums and short-word cutoffs. They are kept as separate presets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityThresholds {
    /// Minimum trimmed length in characters.
    pub min_chars: usize,
    /// Minimum number of whitespace-separated words.
    pub min_words: usize,
    /// Length of a same-character run that counts as keyboard mashing.
    pub repeat_run: usize,
    /// Maximum share of words with at most two characters.
    pub max_short_word_ratio: f64,
    /// Maximum number of 5+ consonant runs tolerated.
    pub max_consonant_runs: usize,
    /// Minimum share of vowels among letters.
    pub min_vowel_ratio: f64,
}

impl QualityThresholds {
    /// Thresholds used for reflection prompts.
    pub fn reflection() -> Self {
        Self {
            min_chars: 10,
            min_words: 5,
            repeat_run: 5,
            max_short_word_ratio: 0.7,
            max_consonant_runs: 2,
            min_vowel_ratio: 0.15,
        }
    }

    /// Thresholds used for scenario responses.
    pub fn scenario() -> Self {
        Self {
            min_words: 8,
            max_short_word_ratio: 0.6,
            ..Self::reflection()
        }
    }

    /// Stricter thresholds used alongside similarity scoring.
    pub fn strict() -> Self {
        Self {
            min_chars: 20,
            ..Self::scenario()
        }
    }

    /// Check that ratios are in [0, 1] and counts are usable.
    pub fn validate(&self, preset: &str) -> Result<()> {
        if !is_unit_ratio(self.max_short_word_ratio) {
            return Err(KujuaError::config(format!(
                "quality.{}.max_short_word_ratio must be in [0.0, 1.0], got {}",
                preset, self.max_short_word_ratio
            )));
        }
        if !is_unit_ratio(self.min_vowel_ratio) {
            return Err(KujuaError::config(format!(
                "quality.{}.min_vowel_ratio must be in [0.0, 1.0], got {}",
                preset, self.min_vowel_ratio
            )));
        }
        if self.repeat_run < 2 {
            return Err(KujuaError::config(format!(
                "quality.{}.repeat_run must be at least 2, got {}",
                preset, self.repeat_run
            )));
        }
        Ok(())
    }
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self::reflection()
    }
}

// =============================================================================
// Similarity
// =============================================================================

/// Similarity scoring and tier configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Score at or above which a response is `excellent`.
    pub excellent_threshold: f64,
    /// Score at or above which a response is `good`.
    pub good_threshold: f64,
    /// Bonus added per keyword-bearing token.
    pub keyword_weight: f64,
    /// Upper bound on the total keyword bonus.
    pub keyword_bonus_cap: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            excellent_threshold: 0.5,
            good_threshold: 0.25,
            keyword_weight: 0.05,
            keyword_bonus_cap: 0.3,
        }
    }
}

impl SimilarityConfig {
    /// Check that thresholds are ordered and within [0, 1].
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("excellent_threshold", self.excellent_threshold),
            ("good_threshold", self.good_threshold),
            ("keyword_weight", self.keyword_weight),
            ("keyword_bonus_cap", self.keyword_bonus_cap),
        ] {
            if !is_unit_ratio(value) {
                return Err(KujuaError::config(format!(
                    "similarity.{} must be in [0.0, 1.0], got {}",
                    name, value
                )));
            }
        }
        if self.good_threshold > self.excellent_threshold {
            return Err(KujuaError::config(format!(
                "similarity.good_threshold ({}) must not exceed excellent_threshold ({})",
                self.good_threshold, self.excellent_threshold
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Celebration
// =============================================================================

/// Celebration effect configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CelebrationConfig {
    /// Share of the maximum activity score that earns fireworks.
    pub grand_threshold: f64,
    /// Number of confetti bursts per celebration.
    pub confetti_bursts: u32,
    /// Number of firework bursts per celebration.
    pub fireworks_bursts: u32,
}

impl Default for CelebrationConfig {
    fn default() -> Self {
        Self {
            grand_threshold: 0.75,
            confetti_bursts: 3,
            fireworks_bursts: 8,
        }
    }
}

fn is_unit_ratio(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

// =============================================================================
// Loading
// =============================================================================

impl Config {
    /// Load configuration with the full precedence chain for `cwd`.
    ///
    /// If the merged result fails validation, the defaults are used and a
    /// warning is logged.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "merged config is invalid, using defaults");
            return Config::default();
        }

        config
    }

    fn load_user_config() -> Option<Config> {
        let home = kujua_home()?;
        Self::load_from_file(&home.join("config.toml")).ok()
    }

    fn load_project_config(cwd: &Path) -> Option<Config> {
        let root = find_project_root(cwd);
        Self::load_from_file(&root.join(KUJUA_DIR).join("config.toml")).ok()
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| KujuaError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| KujuaError::config(e.to_string()))
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.quality.reflection.validate("reflection")?;
        self.quality.scenario.validate("scenario")?;
        self.quality.strict.validate("strict")?;
        self.similarity.validate()?;
        if !is_unit_ratio(self.celebration.grand_threshold) {
            return Err(KujuaError::config(format!(
                "celebration.grand_threshold must be in [0.0, 1.0], got {}",
                self.celebration.grand_threshold
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // KUJUA_EXCELLENT_THRESHOLD
        if let Some(n) = parse_ratio_env("KUJUA_EXCELLENT_THRESHOLD") {
            self.similarity.excellent_threshold = n;
        }

        // KUJUA_GOOD_THRESHOLD
        if let Some(n) = parse_ratio_env("KUJUA_GOOD_THRESHOLD") {
            self.similarity.good_threshold = n;
        }

        // KUJUA_GRAND_CELEBRATION_THRESHOLD
        if let Some(n) = parse_ratio_env("KUJUA_GRAND_CELEBRATION_THRESHOLD") {
            self.celebration.grand_threshold = n;
        }

        // KUJUA_REFLECTION_MIN_WORDS
        if let Some(n) = parse_count_env("KUJUA_REFLECTION_MIN_WORDS") {
            self.quality.reflection.min_words = n;
        }

        // KUJUA_SCENARIO_MIN_WORDS
        if let Some(n) = parse_count_env("KUJUA_SCENARIO_MIN_WORDS") {
            self.quality.scenario.min_words = n;
        }
    }

    /// Merge another config into this one.
    ///
    /// The `other` config takes precedence, field by field: a value equal to
    /// the default is treated as "not set" so that lower layers survive.
    fn merge(mut self, other: Config) -> Self {
        merge_thresholds(
            &mut self.quality.reflection,
            other.quality.reflection,
            &QualityThresholds::reflection(),
        );
        merge_thresholds(
            &mut self.quality.scenario,
            other.quality.scenario,
            &QualityThresholds::scenario(),
        );
        merge_thresholds(
            &mut self.quality.strict,
            other.quality.strict,
            &QualityThresholds::strict(),
        );

        let default_sim = SimilarityConfig::default();
        if other.similarity.excellent_threshold != default_sim.excellent_threshold {
            self.similarity.excellent_threshold = other.similarity.excellent_threshold;
        }
        if other.similarity.good_threshold != default_sim.good_threshold {
            self.similarity.good_threshold = other.similarity.good_threshold;
        }
        if other.similarity.keyword_weight != default_sim.keyword_weight {
            self.similarity.keyword_weight = other.similarity.keyword_weight;
        }
        if other.similarity.keyword_bonus_cap != default_sim.keyword_bonus_cap {
            self.similarity.keyword_bonus_cap = other.similarity.keyword_bonus_cap;
        }

        let default_cel = CelebrationConfig::default();
        if other.celebration.grand_threshold != default_cel.grand_threshold {
            self.celebration.grand_threshold = other.celebration.grand_threshold;
        }
        if other.celebration.confetti_bursts != default_cel.confetti_bursts {
            self.celebration.confetti_bursts = other.celebration.confetti_bursts;
        }
        if other.celebration.fireworks_bursts != default_cel.fireworks_bursts {
            self.celebration.fireworks_bursts = other.celebration.fireworks_bursts;
        }

        self
    }

    /// Save configuration to the project config file.
    ///
    /// Writes `.kujua/config.toml` under `cwd` via a temp file and rename.
    pub fn save_project(&self, cwd: &Path) -> Result<PathBuf> {
        let dir = cwd.join(KUJUA_DIR);
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| KujuaError::storage(&dir, e))?;
        }

        let config_path = dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| KujuaError::config(e.to_string()))?;

        let temp_path = dir.join(".config.toml.tmp");
        fs::write(&temp_path, &content).map_err(|e| KujuaError::storage(&temp_path, e))?;
        fs::rename(&temp_path, &config_path).map_err(|e| KujuaError::storage(&config_path, e))?;

        Ok(config_path)
    }
}

fn merge_thresholds(
    target: &mut QualityThresholds,
    other: QualityThresholds,
    default: &QualityThresholds,
) {
    if other.min_chars != default.min_chars {
        target.min_chars = other.min_chars;
    }
    if other.min_words != default.min_words {
        target.min_words = other.min_words;
    }
    if other.repeat_run != default.repeat_run {
        target.repeat_run = other.repeat_run;
    }
    if other.max_short_word_ratio != default.max_short_word_ratio {
        target.max_short_word_ratio = other.max_short_word_ratio;
    }
    if other.max_consonant_runs != default.max_consonant_runs {
        target.max_consonant_runs = other.max_consonant_runs;
    }
    if other.min_vowel_ratio != default.min_vowel_ratio {
        target.min_vowel_ratio = other.min_vowel_ratio;
    }
}

fn parse_ratio_env(name: &str) -> Option<f64> {
    let val = env::var(name).ok()?;
    match val.parse::<f64>() {
        Ok(n) if is_unit_ratio(n) => Some(n),
        Ok(n) => {
            tracing::warn!(
                "Invalid {} value '{}'. Must be in range [0.0, 1.0]. Ignoring.",
                name,
                n
            );
            None
        }
        Err(_) => {
            tracing::warn!(
                "Invalid {} value '{}'. Expected a decimal number. Ignoring.",
                name,
                val
            );
            None
        }
    }
}

fn parse_count_env(name: &str) -> Option<usize> {
    let val = env::var(name).ok()?;
    match val.parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(
                "Invalid {} value '{}'. Expected a positive integer. Ignoring.",
                name,
                val
            );
            None
        }
    }
}

// =============================================================================
// Paths
// =============================================================================

/// Get the Kujua home directory.
///
/// Checks `KUJUA_HOME` first, then falls back to `~/.kujua`.
pub fn kujua_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("KUJUA_HOME") {
        if home.is_empty() {
            tracing::warn!("KUJUA_HOME is empty, using default");
        } else {
            return Some(PathBuf::from(home));
        }
    }

    dirs::home_dir().map(|home| home.join(KUJUA_DIR))
}

/// Find the project root for a given working directory.
///
/// Walks up looking for an existing `.kujua/` directory and falls back to
/// `cwd` when none is found.
pub fn find_project_root(cwd: &Path) -> PathBuf {
    cwd.ancestors()
        .find(|ancestor| ancestor.join(KUJUA_DIR).is_dir())
        .unwrap_or(cwd)
        .to_path_buf()
}

/// Path of the project progress log.
pub fn project_progress_log_path(cwd: &Path) -> PathBuf {
    find_project_root(cwd)
        .join(KUJUA_DIR)
        .join("progress.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_presets_keep_historic_thresholds() {
        let config = Config::default();
        assert_eq!(config.quality.reflection.min_words, 5);
        assert_eq!(config.quality.scenario.min_words, 8);
        assert!((config.quality.reflection.max_short_word_ratio - 0.7).abs() < f64::EPSILON);
        assert!((config.quality.scenario.max_short_word_ratio - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.quality.strict.min_chars, 20);
        assert_eq!(config.quality.strict.min_words, 8);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_content = r#"
            [similarity]
            excellent_threshold = 0.6
        "#;
        let config: Config = toml::from_str(toml_content).unwrap();

        assert!((config.similarity.excellent_threshold - 0.6).abs() < f64::EPSILON);
        assert!((config.similarity.good_threshold - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.quality.reflection, QualityThresholds::reflection());
    }

    #[test]
    fn test_partial_preset_section_fills_remaining_fields() {
        let toml_content = r#"
            [quality.scenario]
            min_words = 12
        "#;
        let config: Config = toml::from_str(toml_content).unwrap();

        assert_eq!(config.quality.scenario.min_words, 12);
        assert_eq!(config.quality.scenario.min_chars, 10);
    }

    #[test]
    fn test_validate_rejects_inverted_tiers() {
        let mut config = Config::default();
        config.similarity.good_threshold = 0.8;
        config.similarity.excellent_threshold = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_ratio() {
        let mut config = Config::default();
        config.quality.reflection.min_vowel_ratio = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_vowel_ratio"));
    }

    #[test]
    fn test_merge_field_by_field() {
        let mut user = Config::default();
        user.quality.reflection.min_words = 7;
        user.similarity.excellent_threshold = 0.55;

        let mut project = Config::default();
        project.similarity.good_threshold = 0.3;

        let merged = Config::default().merge(user).merge(project);

        assert_eq!(merged.quality.reflection.min_words, 7);
        assert!((merged.similarity.excellent_threshold - 0.55).abs() < f64::EPSILON);
        assert!((merged.similarity.good_threshold - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_merge_with_defaults_does_not_erase_lower_layer() {
        let mut user = Config::default();
        user.celebration.fireworks_bursts = 12;

        let merged = Config::default().merge(user).merge(Config::default());
        assert_eq!(merged.celebration.fireworks_bursts, 12);
    }

    #[test]
    #[serial]
    fn test_env_override_applied() {
        env::set_var("KUJUA_EXCELLENT_THRESHOLD", "0.65");
        env::set_var("KUJUA_SCENARIO_MIN_WORDS", "10");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert!((config.similarity.excellent_threshold - 0.65).abs() < f64::EPSILON);
        assert_eq!(config.quality.scenario.min_words, 10);

        env::remove_var("KUJUA_EXCELLENT_THRESHOLD");
        env::remove_var("KUJUA_SCENARIO_MIN_WORDS");
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_values_ignored() {
        env::set_var("KUJUA_GOOD_THRESHOLD", "2.0");
        env::set_var("KUJUA_GRAND_CELEBRATION_THRESHOLD", "lots");
        env::set_var("KUJUA_REFLECTION_MIN_WORDS", "0");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config, Config::default());

        env::remove_var("KUJUA_GOOD_THRESHOLD");
        env::remove_var("KUJUA_GRAND_CELEBRATION_THRESHOLD");
        env::remove_var("KUJUA_REFLECTION_MIN_WORDS");
    }

    #[test]
    #[serial]
    fn test_load_from_cwd_reads_project_config() {
        let temp = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        env::set_var("KUJUA_HOME", home.path());

        let mut project = Config::default();
        project.quality.reflection.min_words = 6;
        project.save_project(temp.path()).unwrap();

        let config = Config::load_from_cwd(temp.path());
        assert_eq!(config.quality.reflection.min_words, 6);

        env::remove_var("KUJUA_HOME");
    }

    #[test]
    #[serial]
    fn test_load_from_cwd_invalid_project_config_falls_back() {
        let temp = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        env::set_var("KUJUA_HOME", home.path());

        let dir = temp.path().join(KUJUA_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.toml"),
            "[similarity]\ngood_threshold = 0.9\n",
        )
        .unwrap();

        let config = Config::load_from_cwd(temp.path());
        assert_eq!(config, Config::default());

        env::remove_var("KUJUA_HOME");
    }

    #[test]
    fn test_save_project_roundtrip() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.celebration.grand_threshold = 0.8;

        let path = config.save_project(temp.path()).unwrap();
        assert!(path.exists());

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_find_project_root_walks_up() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(KUJUA_DIR)).unwrap();
        let nested = temp.path().join("module-1").join("segment-2");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), temp.path().to_path_buf());
    }

    #[test]
    fn test_find_project_root_falls_back_to_cwd() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("somewhere");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), nested);
    }

    #[test]
    fn test_progress_log_path() {
        let temp = TempDir::new().unwrap();
        let path = project_progress_log_path(temp.path());
        assert!(path.ends_with(".kujua/progress.log"));
    }
}
