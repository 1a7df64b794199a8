//! Learner progress tracking.
//!
//! Completed activities are recorded in an append-only JSONL log
//! (`.kujua/progress.log`). Summaries and certificates are derived from it.

pub mod summary;
pub mod tracker;

pub use summary::{
    issue_certificate, CertificateOutcome, ModuleProgress, ProgressSummary, SegmentProgress,
};
pub use tracker::{
    ProgressEvent, ProgressEventType, ProgressLogger, SegmentRecorder, PROGRESS_SCHEMA_VERSION,
};
