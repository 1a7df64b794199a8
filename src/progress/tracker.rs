//! Progress event types and JSONL log writer.
//!
//! Every passing activity run appends a `segment_completed` event to
//! `.kujua/progress.log`; issuing a module certificate appends a
//! `certificate_issued` event. The log is append-only and is the source of
//! truth for [`ProgressSummary`](super::ProgressSummary).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::activity::{CompletionListener, CompletionSummary};
use crate::core::definition::ActivityDefinition;
use crate::effects::CelebrationKind;
use crate::error::{FailOpen, KujuaError, Result};
use crate::util::read_to_string_limited;

/// Schema version for progress events.
pub const PROGRESS_SCHEMA_VERSION: u8 = 1;

/// A progress event as written to the JSONL log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    /// Schema version for forward compatibility.
    pub v: u8,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: ProgressEventType,
}

impl ProgressEvent {
    /// Create an event stamped with the current time.
    pub fn new(data: ProgressEventType) -> Self {
        Self::with_timestamp(data, Utc::now())
    }

    /// Create an event with a specific timestamp (for testing).
    pub fn with_timestamp(data: ProgressEventType, ts: DateTime<Utc>) -> Self {
        Self {
            v: PROGRESS_SCHEMA_VERSION,
            ts,
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEventType {
    /// A learner finished an activity with a passing result.
    SegmentCompleted {
        module_id: String,
        segment_id: String,
        activity_id: String,
        score: f64,
        max_score: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        celebration: Option<CelebrationKind>,
    },

    /// A module certificate was issued.
    CertificateIssued {
        module_id: String,
        /// Number of segments the module required.
        segments: u32,
    },
}

impl ProgressEventType {
    pub fn segment_completed(activity: &ActivityDefinition, summary: &CompletionSummary) -> Self {
        Self::SegmentCompleted {
            module_id: activity.module_id.clone(),
            segment_id: activity.segment_id.clone(),
            activity_id: activity.id.clone(),
            score: summary.aggregate_score,
            max_score: summary.max_score,
            celebration: summary.celebration,
        }
    }

    pub fn certificate_issued(module_id: impl Into<String>, segments: u32) -> Self {
        Self::CertificateIssued {
            module_id: module_id.into(),
            segments,
        }
    }

    /// Get the event name as a string.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::SegmentCompleted { .. } => "segment_completed",
            Self::CertificateIssued { .. } => "certificate_issued",
        }
    }

    pub fn module_id(&self) -> &str {
        match self {
            Self::SegmentCompleted { module_id, .. } | Self::CertificateIssued { module_id, .. } => {
                module_id
            }
        }
    }
}

/// JSONL writer/reader for the progress log.
#[derive(Debug, Clone)]
pub struct ProgressLogger {
    path: PathBuf,
}

impl ProgressLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Append an event to the log.
    pub fn append(&self, event: &ProgressEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| KujuaError::storage(parent, e))?;
        }

        let json = serde_json::to_string(event)
            .map_err(|e| KujuaError::serde(format!("Failed to serialize progress event: {}", e)))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| KujuaError::storage(&self.path, e))?;

        writeln!(file, "{}", json).map_err(|e| KujuaError::storage(&self.path, e))?;

        debug!(event = event.data.event_name(), path = %self.path.display(), "progress recorded");
        Ok(())
    }

    /// Append a `segment_completed` event for an activity run.
    pub fn append_segment_completed(
        &self,
        activity: &ActivityDefinition,
        summary: &CompletionSummary,
    ) -> Result<()> {
        self.append(&ProgressEvent::new(ProgressEventType::segment_completed(
            activity, summary,
        )))
    }

    /// Append a `certificate_issued` event.
    pub fn append_certificate_issued(&self, module_id: &str, segments: u32) -> Result<()> {
        self.append(&ProgressEvent::new(ProgressEventType::certificate_issued(
            module_id, segments,
        )))
    }

    /// Read all events from the log. A missing log is empty.
    pub fn read_all(&self) -> Result<Vec<ProgressEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = read_to_string_limited(&self.path)?;

        let mut events = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let event: ProgressEvent = serde_json::from_str(line).map_err(|e| {
                KujuaError::serde(format!(
                    "Failed to parse progress event on line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;
            events.push(event);
        }

        Ok(events)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A completion listener that records runs of `activity`.
    pub fn recorder(&self, activity: &ActivityDefinition) -> SegmentRecorder {
        SegmentRecorder {
            logger: self.clone(),
            activity: activity.clone(),
        }
    }
}

/// Records completed activity runs into the progress log.
///
/// Write failures are logged and swallowed: a full disk must never take the
/// learner's result away from them.
#[derive(Debug, Clone)]
pub struct SegmentRecorder {
    logger: ProgressLogger,
    activity: ActivityDefinition,
}

impl CompletionListener for SegmentRecorder {
    fn on_complete(&mut self, summary: &CompletionSummary) {
        self.logger
            .append_segment_completed(&self.activity, summary)
            .fail_open_default("recording segment completion");
    }
}
