// Engine settings
// Loaded from ~/.config/gridflux/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Grid windowing
    #[serde(rename = "grid.rowHeight")]
    pub row_height: f32,

    #[serde(rename = "grid.overscanRows")]
    pub overscan_rows: usize,

    #[serde(rename = "grid.variableRowHeights")]
    pub variable_row_heights: bool,

    #[serde(rename = "grid.reestimateTolerance")]
    pub reestimate_tolerance: f32,

    // Filtering
    #[serde(rename = "filter.maxDistinctValues")]
    pub max_distinct_values: usize,

    // Editing
    #[serde(rename = "edit.strictChoiceValidation")]
    pub strict_choice_validation: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Grid windowing
            row_height: 24.0,
            overscan_rows: 5,
            variable_row_heights: false,
            reestimate_tolerance: 2.0,
            // Filtering
            max_distinct_values: 1000,
            // Editing
            strict_choice_validation: false,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridflux");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file();
            return settings;
        }

        Self::load_from(&path)
    }

    /// Load settings from an explicit path, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => {
                // Strip comments (lines starting with //)
                let cleaned: String = contents
                    .lines()
                    .filter(|line| !line.trim().starts_with("//"))
                    .collect::<Vec<_>>()
                    .join("\n");

                match serde_json::from_str(&cleaned) {
                    Ok(settings) => settings,
                    Err(e) => {
                        eprintln!("Error parsing settings.json: {}", e);
                        eprintln!("Using default settings");
                        Self::default()
                    }
                }
            }
            Err(e) => {
                eprintln!("Error reading settings.json: {}", e);
                Self::default()
            }
        }
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    /// Save current settings to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Create default settings file with comments
    fn create_default_file(&self) {
        let path = Self::config_path();

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r#"{
    // Grid windowing
    "grid.rowHeight": 24,
    "grid.overscanRows": 5,
    "grid.variableRowHeights": false,
    "grid.reestimateTolerance": 2,

    // Filtering
    // Distinct-value lists stop enumerating past this many entries
    "filter.maxDistinctValues": 1000,

    // Editing
    // Reject choice values missing from a loaded option list
    "edit.strictChoiceValidation": false
}
"#;

        if let Err(e) = fs::write(&path, default_config) {
            eprintln!("Error writing default settings.json: {}", e);
        }
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.row_height = 32.0;
        settings.overscan_rows = 8;
        settings.strict_choice_validation = true;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.row_height, 32.0);
        assert_eq!(loaded.overscan_rows, 8);
        assert!(loaded.strict_choice_validation);
        assert_eq!(loaded.max_distinct_values, 1000);
    }

    #[test]
    fn test_load_strips_comment_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
    // comments survive in hand-edited files
    "grid.rowHeight": 30,
    "filter.maxDistinctValues": 50
}
"#,
        )
        .unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.row_height, 30.0);
        assert_eq!(loaded.max_distinct_values, 50);
        // Unspecified keys keep their defaults.
        assert_eq!(loaded.overscan_rows, 5);
    }

    #[test]
    fn test_unparseable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.row_height, 24.0);
    }
}
