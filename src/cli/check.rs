//! Check command for Kujua.
//!
//! Runs a free-text response through the quality gate and reports whether it
//! would be accepted.

use serde::Serialize;

use crate::config::Config;
use crate::core::quality::{QualityGate, QualityPreset, Rejection, TextSample};

/// Options for the check command.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Which thresholds to apply.
    pub preset: QualityPreset,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            json: false,
            quiet: false,
            preset: QualityPreset::Reflection,
        }
    }
}

/// Output format for the check command.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutput {
    pub accepted: bool,
    pub preset: String,
    pub chars: usize,
    pub words: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

/// The check command implementation.
pub struct CheckCommand {
    config: Config,
}

impl CheckCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn run(&self, text: &str, options: &CheckOptions) -> CheckOutput {
        let verdict = QualityGate::for_preset(&self.config.quality, options.preset).check(text);
        let sample = TextSample::new(text);

        CheckOutput {
            accepted: verdict.accepted,
            preset: options.preset.to_string(),
            chars: sample.trimmed_chars,
            words: sample.words.len(),
            rejection: verdict.rejection,
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &CheckOutput, options: &CheckOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &CheckOutput) -> String {
        match &output.rejection {
            None => format!(
                "Accepted ({} preset, {} words).\n",
                output.preset, output.words
            ),
            Some(rejection) => format!(
                "Rejected ({} preset): {}.\nPlease provide a more thoughtful response.\n",
                output.preset, rejection
            ),
        }
    }
}
