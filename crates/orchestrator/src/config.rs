//! Pipeline configuration.
//!
//! Every dataset location is derived from the base root, so a config fully
//! determines where each stage reads and writes. The config is immutable once
//! a pipeline is built from it.

use crate::plan::Dataset;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the saved config inside the base root
pub const CONFIG_FILE: &str = "pipeline.json";

fn default_top_n() -> usize {
    10
}

fn default_reduce_tasks() -> usize {
    4
}

fn default_split_lines() -> usize {
    4096
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding every intermediate and final dataset
    pub root: PathBuf,
    /// Raw ratings file ingested as the first dataset
    pub ratings: PathBuf,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub exclude_rated: bool,
    #[serde(default = "default_reduce_tasks")]
    pub reduce_tasks: usize,
    #[serde(default = "default_split_lines")]
    pub split_lines: usize,
}

impl PipelineConfig {
    pub fn new(root: impl Into<PathBuf>, ratings: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ratings: ratings.into(),
            top_n: default_top_n(),
            exclude_rated: false,
            reduce_tasks: default_reduce_tasks(),
            split_lines: default_split_lines(),
        }
    }

    /// Items kept per user (default: 10)
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Drop items a user already rated from their list (default: false)
    pub fn with_exclude_rated(mut self, exclude_rated: bool) -> Self {
        self.exclude_rated = exclude_rated;
        self
    }

    /// Reduce partitions per stage (default: 4)
    pub fn with_reduce_tasks(mut self, reduce_tasks: usize) -> Self {
        self.reduce_tasks = reduce_tasks;
        self
    }

    /// Records per map task (default: 4096)
    pub fn with_split_lines(mut self, split_lines: usize) -> Self {
        self.split_lines = split_lines;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.top_n > 0, "top_n must be at least 1");
        ensure!(self.reduce_tasks > 0, "reduce_tasks must be at least 1");
        ensure!(self.split_lines > 0, "split_lines must be at least 1");
        ensure!(
            !self.root.as_os_str().is_empty(),
            "the base root must not be empty"
        );
        Ok(())
    }

    /// Location of a dataset under the base root
    pub fn dataset_path(&self, dataset: Dataset) -> PathBuf {
        self.root.join(dataset.dir_name())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config a finished run saved under `root`
    ///
    /// The given root wins over the saved one, so a run directory can be
    /// moved or addressed through a different path.
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let mut config = Self::from_json_file(&root.join(CONFIG_FILE))
            .with_context(|| format!("No finished run under {}", root.display()))?;
        config.root = root.to_path_buf();
        Ok(config)
    }

    /// Resolve relative root and ratings paths against the current directory
    pub fn into_absolute(mut self) -> Result<Self> {
        self.root = std::path::absolute(&self.root)
            .with_context(|| format!("Failed to resolve {}", self.root.display()))?;
        self.ratings = std::path::absolute(&self.ratings)
            .with_context(|| format!("Failed to resolve {}", self.ratings.display()))?;
        Ok(self)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new("/data/recommend", "/data/ratings.csv");
        assert_eq!(config.top_n, 10);
        assert!(!config.exclude_rated);
        assert_eq!(config.reduce_tasks, 4);
        assert_eq!(config.split_lines, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dataset_paths_derive_from_root() {
        let config = PipelineConfig::new("/data/recommend", "/data/ratings.csv");
        assert_eq!(
            config.dataset_path(Dataset::Ratings),
            PathBuf::from("/data/recommend/input")
        );
        assert_eq!(
            config.dataset_path(Dataset::Recommendations),
            PathBuf::from("/data/recommend/step5")
        );
    }

    #[test]
    fn test_zero_top_n_is_invalid() {
        let config = PipelineConfig::new("root", "ratings.csv").with_top_n(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_into_absolute_resolves_relative_paths() {
        let cwd = std::env::current_dir().unwrap();
        let config = PipelineConfig::new("out", "ratings.csv")
            .into_absolute()
            .unwrap();
        assert_eq!(config.root, cwd.join("out"));
        assert_eq!(config.ratings, cwd.join("ratings.csv"));

        let absolute = PipelineConfig::new("/data/recommend", "/data/ratings.csv");
        assert_eq!(absolute.clone().into_absolute().unwrap(), absolute);
    }

    #[test]
    fn test_load_from_root_prefers_given_root() {
        let dir = tempfile::tempdir().unwrap();
        PipelineConfig::new("out", "ratings.csv")
            .with_top_n(7)
            .save_json(&dir.path().join(CONFIG_FILE))
            .unwrap();

        let loaded = PipelineConfig::load_from_root(dir.path()).unwrap();
        assert_eq!(loaded.root, dir.path());
        assert_eq!(loaded.top_n, 7);
        assert!(PipelineConfig::load_from_root(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn test_json_round_trip_with_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let config = PipelineConfig::new("root", "ratings.csv")
            .with_top_n(3)
            .with_exclude_rated(true);
        config.save_json(&path).unwrap();
        assert_eq!(PipelineConfig::from_json_file(&path).unwrap(), config);

        fs::write(&path, r#"{"root": "r", "ratings": "x.csv"}"#).unwrap();
        let loaded = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded.top_n, 10);
        assert_eq!(loaded.reduce_tasks, 4);
    }
}
