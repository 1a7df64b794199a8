//! Config command for Kujua.
//!
//! Shows the effective configuration or writes it to the project config file.

use serde::Serialize;
use std::path::Path;

use crate::config::{Config, KUJUA_DIR};

/// Options for the config command.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Overwrite an existing project config.
    pub force: bool,
}

/// Output format for the config command.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigOutput {
    pub success: bool,
    /// Where the config was written, for `init`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub config: Config,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The config command implementation.
pub struct ConfigCommand {
    config: Config,
}

impl ConfigCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Report the effective configuration.
    pub fn show(&self) -> ConfigOutput {
        ConfigOutput {
            success: true,
            path: None,
            config: self.config.clone(),
            error: None,
        }
    }

    /// Write the effective configuration to `.kujua/config.toml` under `cwd`.
    pub fn init(&self, cwd: &Path, options: &ConfigOptions) -> ConfigOutput {
        let target = cwd.join(KUJUA_DIR).join("config.toml");
        if target.exists() && !options.force {
            return self.failure(format!(
                "{} already exists (use --force to overwrite)",
                target.display()
            ));
        }

        match self.config.save_project(cwd) {
            Ok(path) => ConfigOutput {
                success: true,
                path: Some(path.display().to_string()),
                config: self.config.clone(),
                error: None,
            },
            Err(e) => self.failure(e.to_string()),
        }
    }

    fn failure(&self, error: impl Into<String>) -> ConfigOutput {
        ConfigOutput {
            success: false,
            path: None,
            config: self.config.clone(),
            error: Some(error.into()),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ConfigOutput, options: &ConfigOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &ConfigOutput) -> String {
        if let Some(error) = &output.error {
            return format!("Config failed: {}\n", error);
        }
        if let Some(path) = &output.path {
            return format!("Wrote {}\n", path);
        }
        toml::to_string_pretty(&output.config).unwrap_or_default()
    }
}
