//! Activity definition files.
//!
//! An activity is a TOML document naming the course module and segment it
//! belongs to and listing its stages:
//!
//! ```toml
//! id = "clm-basics-quiz"
//! module_id = "clm-basics"
//! segment_id = "what-is-clm"
//! title = "What is community-led monitoring?"
//!
//! [[stages]]
//! kind = "choice"
//! prompt = "Who leads community-led monitoring?"
//! options = [
//!   { label = "The health ministry" },
//!   { label = "Affected communities", points = 1.0 },
//! ]
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::core::activity::ActivitySession;
use crate::core::stage::StageDef;
use crate::error::{KujuaError, Result};
use crate::util::read_to_string_limited;

/// A parsed activity file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDefinition {
    pub id: String,
    pub module_id: String,
    pub segment_id: String,
    pub title: String,
    #[serde(default)]
    pub stages: Vec<StageDef>,
}

impl ActivityDefinition {
    /// Load and validate an activity file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = read_to_string_limited(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            KujuaError::Serde { message } => {
                KujuaError::activity(format!("{}: {}", path.display(), message))
            }
            KujuaError::Activity { message } => {
                KujuaError::activity(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    /// Parse and validate an activity from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let definition: ActivityDefinition = toml::from_str(content)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Reject definitions that cannot be played.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("id", &self.id),
            ("module_id", &self.module_id),
            ("segment_id", &self.segment_id),
        ] {
            if value.trim().is_empty() {
                return Err(KujuaError::activity(format!("{} must not be empty", field)));
            }
        }

        if self.stages.is_empty() {
            return Err(KujuaError::activity(format!(
                "activity '{}' has no stages",
                self.id
            )));
        }

        for (i, stage) in self.stages.iter().enumerate() {
            stage.validate().map_err(|e| match e {
                KujuaError::Activity { message } => {
                    KujuaError::activity(format!("stage {}: {}", i + 1, message))
                }
                other => other,
            })?;
        }

        Ok(())
    }

    /// Load every `*.toml` activity in a directory, sorted by file name.
    pub fn load_dir(dir: &Path) -> Result<Vec<Self>> {
        let entries = fs::read_dir(dir).map_err(|e| KujuaError::storage(dir, e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| KujuaError::storage(dir, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        paths.iter().map(|path| Self::load(path)).collect()
    }

    /// Distinct segment ids of `module_id` across a set of activities.
    pub fn segments_of(activities: &[Self], module_id: &str) -> Vec<String> {
        let mut segments: Vec<String> = activities
            .iter()
            .filter(|a| a.module_id == module_id)
            .map(|a| a.segment_id.clone())
            .collect();
        segments.sort();
        segments.dedup();
        segments
    }

    /// Start a fresh session over this activity's stages.
    pub fn session<'a>(&self, config: &'a Config) -> Result<ActivitySession<'a, StageDef>> {
        ActivitySession::new(self.stages.clone(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::activity::ActivityStatus;
    use tempfile::TempDir;

    const QUIZ: &str = r#"
        id = "clm-basics-quiz"
        module_id = "clm-basics"
        segment_id = "what-is-clm"
        title = "What is community-led monitoring?"

        [[stages]]
        kind = "choice"
        prompt = "Who leads community-led monitoring?"
        options = [
            { label = "The health ministry" },
            { label = "Affected communities", points = 1.0 },
        ]

        [[stages]]
        kind = "reflection"
        prompt = "Why does community ownership matter?"
    "#;

    #[test]
    fn test_parse_activity() {
        let activity = ActivityDefinition::from_toml(QUIZ).unwrap();
        assert_eq!(activity.id, "clm-basics-quiz");
        assert_eq!(activity.module_id, "clm-basics");
        assert_eq!(activity.stages.len(), 2);
        assert_eq!(activity.stages[0].kind(), "choice");
        assert_eq!(activity.stages[1].kind(), "reflection");
    }

    #[test]
    fn test_empty_stages_rejected() {
        let toml_str = r#"
            id = "empty"
            module_id = "m"
            segment_id = "s"
            title = "Nothing here"
        "#;
        let err = ActivityDefinition::from_toml(toml_str).unwrap_err();
        assert!(err.to_string().contains("has no stages"));
    }

    #[test]
    fn test_blank_ids_rejected() {
        let toml_str = r#"
            id = "x"
            module_id = " "
            segment_id = "s"
            title = "t"

            [[stages]]
            kind = "reflection"
            prompt = "?"
        "#;
        let err = ActivityDefinition::from_toml(toml_str).unwrap_err();
        assert!(err.to_string().contains("module_id must not be empty"));
    }

    #[test]
    fn test_invalid_stage_reports_position() {
        let toml_str = r#"
            id = "budget"
            module_id = "m"
            segment_id = "s"
            title = "Budget"

            [[stages]]
            kind = "reflection"
            prompt = "Warm up"

            [[stages]]
            kind = "allocation"
            prompt = "Split"
            categories = [
                { name = "Training", ideal = 50 },
                { name = "Advocacy", ideal = 40 },
            ]
        "#;
        let err = ActivityDefinition::from_toml(toml_str).unwrap_err();
        assert!(err.to_string().contains("stage 2: allocation ideals sum to 90"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let toml_str = r#"
            id = "x"
            module_id = "m"
            segment_id = "s"
            title = "t"

            [[stages]]
            kind = "crossword"
            prompt = "?"
        "#;
        let err = ActivityDefinition::from_toml(toml_str).unwrap_err();
        assert!(matches!(err, KujuaError::Serde { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quiz.toml");
        fs::write(&path, QUIZ).unwrap();

        let activity = ActivityDefinition::load(&path).unwrap();
        assert_eq!(activity.segment_id, "what-is-clm");
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "id = ").unwrap();

        let err = ActivityDefinition::load(&path).unwrap_err();
        assert!(matches!(err, KujuaError::Activity { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ActivityDefinition::load(Path::new("/nonexistent/quiz.toml")).unwrap_err();
        assert!(matches!(err, KujuaError::Storage { .. }));
    }

    #[test]
    fn test_load_dir_and_segments() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.toml"), QUIZ).unwrap();
        fs::write(
            dir.path().join("a.toml"),
            QUIZ.replace("what-is-clm", "tools").replace("clm-basics-quiz", "tools-quiz"),
        )
        .unwrap();
        fs::write(dir.path().join("notes.md"), "not an activity").unwrap();

        let activities = ActivityDefinition::load_dir(dir.path()).unwrap();
        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0].id, "tools-quiz");

        let segments = ActivityDefinition::segments_of(&activities, "clm-basics");
        assert_eq!(segments, vec!["tools".to_string(), "what-is-clm".to_string()]);
        assert!(ActivityDefinition::segments_of(&activities, "other").is_empty());
    }

    #[test]
    fn test_session_from_definition() {
        let config = Config::default();
        let activity = ActivityDefinition::from_toml(QUIZ).unwrap();
        let session = activity.session(&config).unwrap();
        assert_eq!(session.stage_count(), 2);
        assert_eq!(session.status(), ActivityStatus::NotStarted);
        assert_eq!(session.max_score(), 2.0);
    }

    #[test]
    fn test_demo_module_loads() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join("clm-basics");
        let activities = ActivityDefinition::load_dir(&dir).unwrap();
        assert_eq!(activities.len(), 3);

        let segments = ActivityDefinition::segments_of(&activities, "clm-basics");
        assert_eq!(segments, vec!["advocacy", "planning", "what-is-clm"]);

        let config = Config::default();
        for activity in &activities {
            assert!(activity.session(&config).is_ok(), "{} should build", activity.id);
        }
    }
}
