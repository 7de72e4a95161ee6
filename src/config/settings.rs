//! User settings threaded through parsing and formatting
//!
//! There is no global diagnostic state: every parser takes a `&Settings`
//! and decides from it how loudly to report recoverable problems.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::errors::LayoutError;
use crate::layout::SerialVideoFormat;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Report skipped records at `warn` instead of `debug`
    #[serde(default = "default_verbose_warnings")]
    pub verbose_warnings: bool,

    /// Assume doublescan is already folded into vtotal for GPUs that do
    /// not say otherwise
    #[serde(default)]
    pub doublescan_in_vtotal: bool,

    /// Replaces the built-in serial video format table when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub serial_video_formats: Vec<SerialVideoFormat>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_verbose_warnings() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            verbose_warnings: default_verbose_warnings(),
            doublescan_in_vtotal: false,
            serial_video_formats: Vec::new(),
        }
    }
}

impl Settings {
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::config::APP_DIR);
        path.push(crate::constants::config::FILENAME);
        path
    }

    /// Load from the default location; a missing file yields defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No settings file found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        let mut settings = Self::from_json(&contents)
            .with_context(|| format!("Failed to parse settings JSON from {:?}", path))?;
        settings.validate();
        Ok(settings)
    }

    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("Failed to write settings to {:?}", path))?;
        info!(path = %path.display(), "Saved settings");
        Ok(())
    }

    /// Fix up values that would otherwise be silently misread
    pub fn validate(&mut self) {
        let level = self.log_level.to_ascii_lowercase();
        if LOG_LEVELS.contains(&level.as_str()) {
            self.log_level = level;
        } else {
            warn!(log_level = %self.log_level, "Unknown log_level, using info");
            self.log_level = default_log_level();
        }

        let before = self.serial_video_formats.len();
        self.serial_video_formats
            .retain(|f| f.rate.is_finite() && f.rate > 0.0 && !f.name.is_empty());
        if self.serial_video_formats.len() != before {
            warn!(
                dropped = before - self.serial_video_formats.len(),
                "Ignoring serial video formats with an empty name or non-positive rate"
            );
        }
    }

    pub fn serial_video_table(&self) -> Vec<SerialVideoFormat> {
        if self.serial_video_formats.is_empty() {
            SerialVideoFormat::standard_table()
        } else {
            self.serial_video_formats.clone()
        }
    }

    /// Log a recoverable problem with the configured verbosity
    pub fn report(&self, err: &LayoutError) {
        if self.verbose_warnings {
            warn!(error = %err, "Skipping record");
        } else {
            debug!(error = %err, "Skipping record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.verbose_warnings);
    }

    #[test]
    fn test_validate_unknown_log_level() {
        let mut settings = Settings::from_json(r#"{"log_level": "LOUD"}"#).unwrap();
        settings.validate();
        assert_eq!(settings.log_level, "info");

        let mut settings = Settings::from_json(r#"{"log_level": "DEBUG"}"#).unwrap();
        settings.validate();
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_serial_video_override() {
        let mut settings = Settings::from_json(
            r#"{"serial_video_formats": [{"name": "custom", "rate": 29.97}, {"name": "", "rate": 1.0}]}"#,
        )
        .unwrap();
        settings.validate();
        let table = settings.serial_video_table();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].name, "custom");

        assert!(!Settings::default().serial_video_table().is_empty());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("display-topology-no-such-dir/settings.json");
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("display-topology-test-{}", std::process::id()));
        let path = dir.join("settings.json");
        let settings = Settings {
            log_level: "debug".into(),
            verbose_warnings: false,
            doublescan_in_vtotal: true,
            serial_video_formats: Vec::new(),
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
        let _ = fs::remove_dir_all(&dir);
    }
}
