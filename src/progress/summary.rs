//! Per-module progress derived from the event log.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{KujuaError, Result};
use crate::progress::tracker::{ProgressEvent, ProgressEventType, ProgressLogger};

/// Best result for one segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentProgress {
    pub completions: u32,
    pub best_score: f64,
    pub max_score: f64,
    pub first_completed_at: DateTime<Utc>,
    pub last_completed_at: DateTime<Utc>,
}

impl SegmentProgress {
    /// Best score as a share of the maximum.
    pub fn best_ratio(&self) -> f64 {
        if self.max_score > 0.0 {
            (self.best_score / self.max_score).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModuleProgress {
    pub segments: BTreeMap<String, SegmentProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_issued_at: Option<DateTime<Utc>>,
}

impl ModuleProgress {
    pub fn completed_segments(&self) -> usize {
        self.segments.len()
    }

    /// Required segments with no completion yet, in the given order.
    pub fn missing<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|segment| !self.segments.contains_key(segment.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Everything the learner has completed, by module.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub modules: BTreeMap<String, ModuleProgress>,
}

impl ProgressSummary {
    pub fn from_events(events: &[ProgressEvent]) -> Self {
        let mut summary = Self::default();
        for event in events {
            summary.process_event(event);
        }
        summary
    }

    /// Read and fold the whole log.
    pub fn load(logger: &ProgressLogger) -> Result<Self> {
        Ok(Self::from_events(&logger.read_all()?))
    }

    fn process_event(&mut self, event: &ProgressEvent) {
        match &event.data {
            ProgressEventType::SegmentCompleted {
                module_id,
                segment_id,
                score,
                max_score,
                ..
            } => {
                let module = self.modules.entry(module_id.clone()).or_default();
                module
                    .segments
                    .entry(segment_id.clone())
                    .and_modify(|segment| {
                        segment.completions += 1;
                        if *score > segment.best_score {
                            segment.best_score = *score;
                            segment.max_score = *max_score;
                        }
                        segment.last_completed_at = event.ts;
                    })
                    .or_insert_with(|| SegmentProgress {
                        completions: 1,
                        best_score: *score,
                        max_score: *max_score,
                        first_completed_at: event.ts,
                        last_completed_at: event.ts,
                    });
            }
            ProgressEventType::CertificateIssued { module_id, .. } => {
                let module = self.modules.entry(module_id.clone()).or_default();
                if module.certificate_issued_at.is_none() {
                    module.certificate_issued_at = Some(event.ts);
                }
            }
        }
    }

    pub fn module(&self, module_id: &str) -> Option<&ModuleProgress> {
        self.modules.get(module_id)
    }
}

/// What happened when a certificate was requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CertificateOutcome {
    /// Every required segment is done; a certificate was recorded.
    Issued { at: DateTime<Utc> },
    /// A certificate for this module already exists.
    AlreadyIssued { at: DateTime<Utc> },
    /// Some segments are not complete yet.
    Incomplete { missing: Vec<String> },
}

impl CertificateOutcome {
    /// Whether the learner holds a certificate after the request.
    pub fn holds_certificate(&self) -> bool {
        !matches!(self, CertificateOutcome::Incomplete { .. })
    }
}

/// Issue a module certificate if every required segment is complete.
///
/// Records a `certificate_issued` event at most once per module.
pub fn issue_certificate(
    logger: &ProgressLogger,
    module_id: &str,
    required_segments: &[String],
) -> Result<CertificateOutcome> {
    let required: BTreeSet<&String> = required_segments.iter().collect();
    if required.is_empty() {
        return Err(KujuaError::progress(format!(
            "module '{}' has no required segments",
            module_id
        )));
    }

    let summary = ProgressSummary::load(logger)?;
    let progress = summary.module(module_id).cloned().unwrap_or_default();

    if let Some(at) = progress.certificate_issued_at {
        return Ok(CertificateOutcome::AlreadyIssued { at });
    }

    let missing: Vec<String> = progress
        .missing(required_segments)
        .into_iter()
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !missing.is_empty() {
        return Ok(CertificateOutcome::Incomplete { missing });
    }

    let event = ProgressEvent::new(ProgressEventType::certificate_issued(
        module_id,
        required.len() as u32,
    ));
    logger.append(&event)?;
    info!(module = module_id, "certificate issued");

    Ok(CertificateOutcome::Issued { at: event.ts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn completed(module: &str, segment: &str, score: f64, ts: DateTime<Utc>) -> ProgressEvent {
        ProgressEvent::with_timestamp(
            ProgressEventType::SegmentCompleted {
                module_id: module.to_string(),
                segment_id: segment.to_string(),
                activity_id: format!("{}-activity", segment),
                score,
                max_score: 10.0,
                celebration: None,
            },
            ts,
        )
    }

    fn segments(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_summary_from_empty_events() {
        let summary = ProgressSummary::from_events(&[]);
        assert!(summary.modules.is_empty());
    }

    #[test]
    fn test_summary_keeps_best_score() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(5);
        let t2 = t0 + Duration::minutes(10);
        let summary = ProgressSummary::from_events(&[
            completed("clm", "intro", 6.0, t0),
            completed("clm", "intro", 9.0, t1),
            completed("clm", "intro", 7.0, t2),
        ]);

        let segment = &summary.module("clm").unwrap().segments["intro"];
        assert_eq!(segment.completions, 3);
        assert_eq!(segment.best_score, 9.0);
        assert!((segment.best_ratio() - 0.9).abs() < 1e-9);
        assert_eq!(segment.first_completed_at, t0);
        assert_eq!(segment.last_completed_at, t2);
    }

    #[test]
    fn test_summary_groups_by_module() {
        let now = Utc::now();
        let summary = ProgressSummary::from_events(&[
            completed("clm", "intro", 5.0, now),
            completed("clm", "tools", 5.0, now),
            completed("advocacy", "intro", 5.0, now),
        ]);

        assert_eq!(summary.modules.len(), 2);
        assert_eq!(summary.module("clm").unwrap().completed_segments(), 2);
        assert_eq!(summary.module("advocacy").unwrap().completed_segments(), 1);
    }

    #[test]
    fn test_missing_segments() {
        let summary = ProgressSummary::from_events(&[completed("clm", "intro", 5.0, Utc::now())]);
        let module = summary.module("clm").unwrap();
        let required = segments(&["intro", "tools", "advocacy"]);
        assert_eq!(module.missing(&required), vec!["tools", "advocacy"]);
    }

    #[test]
    fn test_issue_certificate_incomplete() {
        let dir = TempDir::new().unwrap();
        let logger = ProgressLogger::new(dir.path().join("progress.log"));
        logger.append(&completed("clm", "intro", 5.0, Utc::now())).unwrap();

        let outcome = issue_certificate(&logger, "clm", &segments(&["intro", "tools"])).unwrap();
        assert_eq!(
            outcome,
            CertificateOutcome::Incomplete {
                missing: vec!["tools".to_string()]
            }
        );
        assert!(!outcome.holds_certificate());
        assert_eq!(logger.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_issue_certificate_once() {
        let dir = TempDir::new().unwrap();
        let logger = ProgressLogger::new(dir.path().join("progress.log"));
        let now = Utc::now();
        logger.append(&completed("clm", "intro", 5.0, now)).unwrap();
        logger.append(&completed("clm", "tools", 8.0, now)).unwrap();

        let required = segments(&["intro", "tools"]);
        let first = issue_certificate(&logger, "clm", &required).unwrap();
        let CertificateOutcome::Issued { at } = first else {
            panic!("expected a new certificate");
        };

        let second = issue_certificate(&logger, "clm", &required).unwrap();
        assert!(matches!(second, CertificateOutcome::AlreadyIssued { .. }));
        assert!(second.holds_certificate());

        let events = logger.read_all().unwrap();
        let issued: Vec<_> = events
            .iter()
            .filter(|e| e.data.event_name() == "certificate_issued")
            .collect();
        assert_eq!(issued.len(), 1);

        let summary = ProgressSummary::load(&logger).unwrap();
        assert!(summary.module("clm").unwrap().certificate_issued_at.is_some());
        assert!(at >= now);
    }

    #[test]
    fn test_issue_certificate_unknown_module() {
        let dir = TempDir::new().unwrap();
        let logger = ProgressLogger::new(dir.path().join("progress.log"));
        let outcome = issue_certificate(&logger, "nothing", &segments(&["intro"])).unwrap();
        assert!(matches!(outcome, CertificateOutcome::Incomplete { .. }));
    }

    #[test]
    fn test_issue_certificate_needs_requirements() {
        let dir = TempDir::new().unwrap();
        let logger = ProgressLogger::new(dir.path().join("progress.log"));
        let err = issue_certificate(&logger, "clm", &[]).unwrap_err();
        assert!(matches!(err, KujuaError::Progress { .. }));
    }
}
