//! Core learning logic for Kujua.
//!
//! Everything in here is pure: the quality gate, the similarity scorer, the
//! activity state machine and its stage kinds never touch the filesystem
//! (activity files are read through `definition`, which is the one exception).

pub mod activity;
pub mod definition;
pub mod quality;
pub mod shuffle;
pub mod similarity;
pub mod stage;

pub use activity::{
    ActivitySession, ActivityStatus, Advance, CompletionListener, CompletionSummary, Stage,
    StageEvaluation, StageOutcome,
};
pub use definition::ActivityDefinition;
pub use quality::{evaluate_quality, QualityGate, QualityPreset, QualityVerdict, Rejection};
pub use shuffle::{display_order, original_index, shuffle_in_place};
pub use similarity::{classify_response, score_similarity, SimilarityResult, Tier};
pub use stage::{StageDef, StageInput};
