//! Run configuration.
//!
//! Options are read from an optional JSON file; every field has a default so
//! partial files are valid. Command line flags override the file in `main`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ml::ForestParams;

/// Errors that can occur while loading the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Folder scanned for raw `.csv` / `.tsv` benchmark files.
    pub data_raw_directory: PathBuf,
    /// Folder receiving reports, one sub folder per tool.
    pub evaluation_directory: PathBuf,
    /// Target columns to predict, in evaluation order.
    pub labels: Vec<String>,
    pub minimum_row_count: usize,
    pub minimum_column_count: usize,
    pub forest_estimators: usize,
    pub forest_max_depth: Option<usize>,
    pub random_seed: u64,
    /// Share of rows used for training, the rest is held out.
    pub train_fraction: f64,
    /// Features at or below this importance are left out of rankings.
    pub importance_threshold: f64,
    /// Test-score quantile a version must reach to join the best-version merge.
    pub best_version_quantile: f64,
    pub verbose: bool,
    pub debug: bool,
    /// Defer loading data until a tool is evaluated and drop it afterwards.
    pub memory_saving_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_raw_directory: PathBuf::from("Data/Raw"),
            evaluation_directory: PathBuf::from("Evaluations"),
            labels: vec![
                "runtime".to_string(),
                "memtotal".to_string(),
                "processor_count".to_string(),
            ],
            minimum_row_count: 20,
            minimum_column_count: 3,
            forest_estimators: 30,
            forest_max_depth: Some(10),
            random_seed: 1,
            train_fraction: 0.8,
            importance_threshold: 0.01,
            best_version_quantile: 0.7,
            verbose: false,
            debug: false,
            memory_saving_mode: false,
        }
    }
}

impl Config {
    /// Load the configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse the configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.labels.is_empty() {
            return Err(ConfigError::InvalidValue("labels must not be empty".into()));
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(ConfigError::InvalidValue(format!(
                "train_fraction must be in (0, 1), got {}",
                self.train_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.best_version_quantile) {
            return Err(ConfigError::InvalidValue(format!(
                "best_version_quantile must be in [0, 1], got {}",
                self.best_version_quantile
            )));
        }
        if self.forest_estimators == 0 {
            return Err(ConfigError::InvalidValue("forest_estimators must be positive".into()));
        }
        Ok(())
    }

    /// Forest hyper-parameters derived from the configuration.
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.forest_estimators,
            max_depth: self.forest_max_depth,
            seed: self.random_seed,
            ..ForestParams::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{ "minimum_row_count": 5, "labels": ["runtime"] }"#).unwrap();
        assert_eq!(config.minimum_row_count, 5);
        assert_eq!(config.labels, vec!["runtime"]);
        assert_eq!(config.minimum_column_count, Config::default().minimum_column_count);
        assert_eq!(config.forest_max_depth, Some(10));
    }

    #[test]
    fn unbounded_depth_is_null() {
        let config = Config::from_json(r#"{ "forest_max_depth": null }"#).unwrap();
        assert_eq!(config.forest_params().max_depth, None);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            Config::from_json(r#"{ "train_fraction": 1.5 }"#),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{ "labels": [] }"#),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(Config::from_json("{ nope"), Err(ConfigError::JsonError(_))));
    }

    #[test]
    fn loads_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "memory_saving_mode": true }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.memory_saving_mode);
        assert!(matches!(
            Config::load(dir.path().join("missing.json")),
            Err(ConfigError::IoError(_))
        ));
    }
}
