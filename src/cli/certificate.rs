//! Certificate command for Kujua.
//!
//! Issues a module certificate once every segment of the module has been
//! completed.

use serde::Serialize;

use crate::progress::{issue_certificate, CertificateOutcome, ProgressLogger};

/// Options for the certificate command.
#[derive(Debug, Clone, Default)]
pub struct CertificateOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the certificate command.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateOutput {
    pub success: bool,
    pub module_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CertificateOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CertificateOutput {
    /// Whether the learner holds a certificate for the module.
    pub fn certified(&self) -> bool {
        self.outcome
            .as_ref()
            .is_some_and(CertificateOutcome::holds_certificate)
    }
}

/// The certificate command implementation.
pub struct CertificateCommand {
    logger: ProgressLogger,
}

impl CertificateCommand {
    pub fn new(logger: ProgressLogger) -> Self {
        Self { logger }
    }

    pub fn run(&self, module_id: &str, required_segments: &[String]) -> CertificateOutput {
        match issue_certificate(&self.logger, module_id, required_segments) {
            Ok(outcome) => CertificateOutput {
                success: true,
                module_id: module_id.to_string(),
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => CertificateOutput {
                success: false,
                module_id: module_id.to_string(),
                outcome: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &CertificateOutput, options: &CertificateOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &CertificateOutput) -> String {
        match (&output.outcome, &output.error) {
            (Some(CertificateOutcome::Issued { at }), _) => format!(
                "Certificate issued for '{}' on {}.\n",
                output.module_id,
                at.format("%Y-%m-%d")
            ),
            (Some(CertificateOutcome::AlreadyIssued { at }), _) => format!(
                "Certificate for '{}' was already issued on {}.\n",
                output.module_id,
                at.format("%Y-%m-%d")
            ),
            (Some(CertificateOutcome::Incomplete { missing }), _) => format!(
                "Not yet: complete {} to earn the '{}' certificate.\n",
                missing.join(", "),
                output.module_id
            ),
            (None, error) => format!(
                "Certificate failed: {}\n",
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ProgressEvent, ProgressEventType};
    use tempfile::TempDir;

    fn completed(segment: &str) -> ProgressEvent {
        ProgressEvent::new(ProgressEventType::SegmentCompleted {
            module_id: "clm".to_string(),
            segment_id: segment.to_string(),
            activity_id: segment.to_string(),
            score: 1.0,
            max_score: 1.0,
            celebration: None,
        })
    }

    fn required() -> Vec<String> {
        vec!["intro".to_string(), "tools".to_string()]
    }

    #[test]
    fn test_certificate_flow() {
        let dir = TempDir::new().unwrap();
        let logger = ProgressLogger::new(dir.path().join("progress.log"));
        let cmd = CertificateCommand::new(logger.clone());
        let options = CertificateOptions::default();

        logger.append(&completed("intro")).unwrap();
        let pending = cmd.run("clm", &required());
        assert!(pending.success);
        assert!(!pending.certified());
        assert_eq!(
            cmd.format_output(&pending, &options),
            "Not yet: complete tools to earn the 'clm' certificate.\n"
        );

        logger.append(&completed("tools")).unwrap();
        let issued = cmd.run("clm", &required());
        assert!(issued.certified());
        assert!(cmd
            .format_output(&issued, &options)
            .starts_with("Certificate issued for 'clm'"));

        let again = cmd.run("clm", &required());
        assert!(matches!(
            again.outcome,
            Some(CertificateOutcome::AlreadyIssued { .. })
        ));
        assert!(cmd.format_output(&again, &options).contains("already issued"));
    }

    #[test]
    fn test_certificate_without_requirements_fails() {
        let dir = TempDir::new().unwrap();
        let cmd = CertificateCommand::new(ProgressLogger::new(dir.path().join("progress.log")));

        let output = cmd.run("clm", &[]);
        assert!(!output.success);
        assert!(!output.certified());

        let opts = CertificateOptions {
            json: true,
            quiet: false,
        };
        let json: serde_json::Value =
            serde_json::from_str(&cmd.format_output(&output, &opts)).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("outcome").is_none());
    }
}
