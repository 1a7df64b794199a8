//! Progress command for Kujua.
//!
//! Summarizes the progress log: completed segments and best scores per
//! module, and whether a certificate has been issued.

use serde::Serialize;

use crate::progress::{ProgressLogger, ProgressSummary};

/// Options for the progress command.
#[derive(Debug, Clone, Default)]
pub struct ProgressOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Only show this module.
    pub module: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentRow {
    pub segment_id: String,
    pub completions: u32,
    pub best_score: f64,
    pub max_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleRow {
    pub module_id: String,
    pub certified: bool,
    pub segments: Vec<SegmentRow>,
}

/// Output format for the progress command.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressOutput {
    pub success: bool,
    pub modules: Vec<ModuleRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressOutput {
    pub fn success(modules: Vec<ModuleRow>) -> Self {
        Self {
            success: true,
            modules,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            modules: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// The progress command implementation.
pub struct ProgressCommand {
    logger: ProgressLogger,
}

impl ProgressCommand {
    pub fn new(logger: ProgressLogger) -> Self {
        Self { logger }
    }

    pub fn run(&self, options: &ProgressOptions) -> ProgressOutput {
        let summary = match ProgressSummary::load(&self.logger) {
            Ok(summary) => summary,
            Err(e) => return ProgressOutput::failure(e.to_string()),
        };

        let modules = summary
            .modules
            .into_iter()
            .filter(|(module_id, _)| options.module.as_ref().is_none_or(|m| m == module_id))
            .map(|(module_id, progress)| ModuleRow {
                module_id,
                certified: progress.certificate_issued_at.is_some(),
                segments: progress
                    .segments
                    .into_iter()
                    .map(|(segment_id, segment)| SegmentRow {
                        segment_id,
                        completions: segment.completions,
                        best_score: segment.best_score,
                        max_score: segment.max_score,
                    })
                    .collect(),
            })
            .collect();

        ProgressOutput::success(modules)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ProgressOutput, options: &ProgressOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &ProgressOutput) -> String {
        if let Some(error) = &output.error {
            return format!("Failed to read progress: {}\n", error);
        }
        if output.modules.is_empty() {
            return "No completed activities yet.\n".to_string();
        }

        let mut text = String::new();
        for module in &output.modules {
            let badge = if module.certified { " [certified]" } else { "" };
            text.push_str(&format!(
                "{}{} - {} segment(s)\n",
                module.module_id,
                badge,
                module.segments.len()
            ));
            for segment in &module.segments {
                text.push_str(&format!(
                    "  {:<24} best {:.1}/{:.1} ({}x)\n",
                    segment.segment_id, segment.best_score, segment.max_score, segment.completions
                ));
            }
        }
        text
    }
}
