//! Unified error types for Kujua.
//!
//! The learning core itself never performs I/O, so most of these errors come
//! from the edges: loading activity files and config, and appending to the
//! progress log. Caller mistakes against the activity state machine surface
//! as `InvalidState` rather than silently corrupting a session.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Kujua operations.
#[derive(Error, Debug)]
pub enum KujuaError {
    /// I/O errors from activity, config, or progress files.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// State machine violations (transition guard not satisfied).
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// A learner selection that does not fit the current stage.
    #[error("invalid selection: {message}")]
    InvalidSelection { message: String },

    /// Malformed activity definitions.
    #[error("activity error: {message}")]
    Activity { message: String },

    /// Configuration loading or validation errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// Progress log and certificate errors.
    #[error("progress error: {message}")]
    Progress { message: String },
}

/// A specialized Result type for Kujua operations.
pub type Result<T> = std::result::Result<T, KujuaError>;

impl KujuaError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an invalid selection error.
    pub fn invalid_selection(message: impl Into<String>) -> Self {
        Self::InvalidSelection {
            message: message.into(),
        }
    }

    /// Create an activity definition error.
    pub fn activity(message: impl Into<String>) -> Self {
        Self::Activity {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a progress error.
    pub fn progress(message: impl Into<String>) -> Self {
        Self::Progress {
            message: message.into(),
        }
    }

    /// Whether the error is a caller bug against the state machine.
    ///
    /// Guard violations and rejected selections are programming errors in the
    /// hosting UI; everything else is an environment problem.
    pub fn is_guard_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. } | Self::InvalidSelection { .. }
        )
    }
}

impl From<io::Error> for KujuaError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for KujuaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for KujuaError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for fail-open error handling.
///
/// Used where the core notifies a fire-and-forget collaborator (the progress
/// log): a failure is logged and swallowed so the learner's activity is never
/// affected by it.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using fallback)", context, err);
                fallback
            }
        }
    }
}

/// Exit codes for the Kujua CLI.
pub mod exit_codes {
    /// The response was accepted / the command succeeded.
    pub const OK: i32 = 0;

    /// The response was rejected or needs more work.
    pub const REJECTED: i32 = 1;

    /// The command failed (bad input file, I/O error).
    pub const ERROR: i32 = 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = KujuaError::storage(
            "/tmp/activity.toml",
            io::Error::new(io::ErrorKind::NotFound, "file not found"),
        );
        assert!(err.to_string().contains("storage error"));
        assert!(err.to_string().contains("/tmp/activity.toml"));
    }

    #[test]
    fn test_invalid_state_error_display() {
        let err = KujuaError::invalid_state("cannot advance before evaluating");
        assert_eq!(
            err.to_string(),
            "invalid state: cannot advance before evaluating"
        );
    }

    #[test]
    fn test_invalid_selection_error_display() {
        let err = KujuaError::invalid_selection("option 7 out of range");
        assert_eq!(err.to_string(), "invalid selection: option 7 out of range");
    }

    #[test]
    fn test_activity_and_config_display() {
        assert_eq!(
            KujuaError::activity("no stages").to_string(),
            "activity error: no stages"
        );
        assert_eq!(
            KujuaError::config("invalid TOML").to_string(),
            "config error: invalid TOML"
        );
        assert_eq!(
            KujuaError::progress("segment missing").to_string(),
            "progress error: segment missing"
        );
    }

    #[test]
    fn test_is_guard_violation() {
        assert!(KujuaError::invalid_state("x").is_guard_violation());
        assert!(KujuaError::invalid_selection("x").is_guard_violation());
        assert!(!KujuaError::config("x").is_guard_violation());
        assert!(!KujuaError::progress("x").is_guard_violation());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: KujuaError = io_err.into();
        assert!(matches!(err, KujuaError::Storage { .. }));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: KujuaError = json_err.into();
        assert!(matches!(err, KujuaError::Serde { .. }));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_err = toml::from_str::<toml::Table>("= broken").unwrap_err();
        let err: KujuaError = toml_err.into();
        assert!(matches!(err, KujuaError::Serde { .. }));
    }

    #[test]
    fn test_fail_open_default() {
        let result: Result<Vec<String>> = Err(KujuaError::progress("test"));
        let value = result.fail_open_default("test context");
        assert!(value.is_empty());
    }

    #[test]
    fn test_fail_open_with() {
        let result: Result<i32> = Err(KujuaError::progress("test"));
        assert_eq!(result.fail_open_with("test context", 42), 42);
    }

    #[test]
    fn test_fail_open_success() {
        let result: Result<i32> = Ok(100);
        assert_eq!(result.fail_open_default("test context"), 100);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_codes::OK, 0);
        assert_eq!(exit_codes::REJECTED, 1);
        assert_eq!(exit_codes::ERROR, 2);
    }
}
