//! Score command for Kujua.
//!
//! Scores a scenario answer against a model answer and reports the feedback
//! tier.

use serde::Serialize;

use crate::config::Config;
use crate::core::quality::{QualityGate, QualityPreset, Rejection};
use crate::core::similarity::{classify_response, Tier};

/// Options for the score command.
#[derive(Debug, Clone, Default)]
pub struct ScoreOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the score command.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreOutput {
    pub score: f64,
    pub tier: Tier,
    /// Whether the host should fire its completion callback.
    pub completes: bool,
    /// Whether the host should celebrate.
    pub celebrates: bool,
    /// Why the gibberish check failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

/// The score command implementation.
pub struct ScoreCommand {
    config: Config,
}

impl ScoreCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn run(&self, answer: &str, reference: Option<&str>) -> ScoreOutput {
        let result = classify_response(answer, reference, &self.config);
        let rejection = QualityGate::for_preset(&self.config.quality, QualityPreset::Strict)
            .check(answer)
            .rejection;

        ScoreOutput {
            score: result.score,
            tier: result.tier,
            completes: result.signals_completion(),
            celebrates: result.celebrates(),
            rejection,
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ScoreOutput, options: &ScoreOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &ScoreOutput) -> String {
        let mut text = format!("{} (score {:.2})\n", output.tier, output.score);
        if let Some(rejection) = &output.rejection {
            text.push_str(&format!("Not scored: {}.\n", rejection));
        }
        text
    }
}
