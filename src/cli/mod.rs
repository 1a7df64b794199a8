//! CLI commands for Kujua.
//!
//! This module provides the commands behind the `kujua` binary, organized into:
//! - **Learner commands**: play, progress, certificate
//! - **Authoring commands**: check, score (try responses against the gate and scorer)
//! - **Utility commands**: config

// Learner commands
pub mod certificate;
pub mod play;
pub mod progress;

// Authoring commands
pub mod check;
pub mod score;

// Utility commands
pub mod config_cmd;

pub use certificate::CertificateCommand;
pub use check::CheckCommand;
pub use config_cmd::ConfigCommand;
pub use play::PlayCommand;
pub use progress::ProgressCommand;
pub use score::ScoreCommand;
