//! Kujua - learning core for the Kujua360 community-led monitoring course
//!
//! Kujua judges free-text answers (a quality gate for reflections and a
//! similarity scorer for scenarios), drives activities through a generic
//! stage state machine, and records completed segments so module
//! certificates can be issued.

pub mod cli;
pub mod config;
pub mod core;
pub mod effects;
pub mod error;
pub mod progress;
pub mod telemetry;
pub mod util;

pub use config::Config;
pub use core::{
    classify_response, evaluate_quality, score_similarity, ActivityDefinition, ActivitySession,
    ActivityStatus, Advance, CompletionListener, CompletionSummary, QualityGate, QualityPreset,
    QualityVerdict, Rejection, SimilarityResult, Stage, StageDef, StageEvaluation, StageInput,
    StageOutcome, Tier,
};
pub use effects::{CelebrationGuard, CelebrationKind, EffectTrigger};
pub use error::{FailOpen, KujuaError, Result};
pub use progress::{
    issue_certificate, CertificateOutcome, ModuleProgress, ProgressEvent, ProgressEventType,
    ProgressLogger, ProgressSummary, SegmentProgress, SegmentRecorder, PROGRESS_SCHEMA_VERSION,
};

// CLI commands
pub use cli::{
    CertificateCommand, CheckCommand, ConfigCommand, PlayCommand, ProgressCommand, ScoreCommand,
};
