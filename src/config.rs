// Runtime configuration
// Collection names, window size and file paths are inputs, never hard-coded

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the SQLite database backing both collections.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Collection holding the score documents.
    #[serde(default = "default_scores_collection")]
    pub scores_collection: String,

    /// Collection holding the student profiles.
    #[serde(default = "default_students_collection")]
    pub students_collection: String,

    /// Number of score documents fetched and persisted per window.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Destination of the rendered report.
    #[serde(default = "default_report_path")]
    pub report_path: String,
}

fn default_database_path() -> String {
    "student_reports.db".to_string()
}

fn default_scores_collection() -> String {
    "student_scores_temp".to_string()
}

fn default_students_collection() -> String {
    "students".to_string()
}

fn default_window_size() -> usize {
    1000
}

fn default_report_path() -> String {
    "college_category_report.csv".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: default_database_path(),
            scores_collection: default_scores_collection(),
            students_collection: default_students_collection(),
            window_size: default_window_size(),
            report_path: default_report_path(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.window_size >= 1, "window_size must be at least 1");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.scores_collection, "student_scores_temp");
        assert_eq!(config.students_collection, "students");
        assert_eq!(config.window_size, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str("window_size = 250").unwrap();
        assert_eq!(config.window_size, 250);
        assert_eq!(config.scores_collection, "student_scores_temp");
        assert_eq!(config.report_path, "college_category_report.csv");
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = Config {
            window_size: 42,
            scores_collection: "scores_snapshot".to_string(),
            ..Config::default()
        };
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.window_size, 42);
        assert_eq!(parsed.scores_collection, "scores_snapshot");
    }

    #[test]
    fn test_zero_window_size_is_rejected() {
        let config = Config {
            window_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
