use crate::path::{QuestionType, DEFAULT_MIDDLE_OPTION};
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "pathsense.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsenseConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub hover: HoverConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub screening: ScreeningConfig,
}

/// Dwell detection thresholds, in normalized units and milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoverConfig {
    #[serde(default = "default_hover_period")]
    pub period_ms: f64,
    #[serde(default = "default_hover_radius")]
    pub radius: f64,
    #[serde(default = "default_association_distance")]
    pub association_distance: f64,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            period_ms: default_hover_period(),
            radius: default_hover_radius(),
            association_distance: default_association_distance(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Option key that is rotated onto the bipartite frame in three-way layouts.
    #[serde(default = "default_middle_option")]
    pub middle_option: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            middle_option: default_middle_option(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Housekeeping labels never accumulated into the population.
    #[serde(default = "default_excluded_labels")]
    pub excluded_labels: Vec<String>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            excluded_labels: default_excluded_labels(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Extraction threads; 0 uses the available parallelism.
    #[serde(default)]
    pub worker_threads: usize,
    #[serde(default = "default_scored_question_types")]
    pub scored_question_types: Vec<QuestionType>,
    #[serde(default = "default_benchmark_category")]
    pub benchmark_category: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            scored_question_types: default_scored_question_types(),
            benchmark_category: default_benchmark_category(),
        }
    }
}

impl BatchConfig {
    pub fn effective_threads(&self) -> usize {
        match self.worker_threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }

    pub fn is_scored(&self, question_type: &QuestionType) -> bool {
        self.scored_question_types.contains(question_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningConfig {
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_max_divergence")]
    pub max_divergence: f64,
    #[serde(default = "default_max_duration")]
    pub max_duration_ms: i64,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            max_divergence: default_max_divergence(),
            max_duration_ms: default_max_duration(),
        }
    }
}

// Defaults
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".pathsense"))
        .unwrap_or_else(|| PathBuf::from(".pathsense"))
}
fn default_hover_period() -> f64 {
    1000.0
}
fn default_hover_radius() -> f64 {
    0.05
}
fn default_association_distance() -> f64 {
    0.1
}
fn default_middle_option() -> String {
    DEFAULT_MIDDLE_OPTION.to_string()
}
fn default_excluded_labels() -> Vec<String> {
    vec!["first_movement_delay".to_string()]
}
fn default_scored_question_types() -> Vec<QuestionType> {
    vec![QuestionType::BipartiteChoice, QuestionType::TripartiteChoice]
}
fn default_benchmark_category() -> String {
    "benchmark".to_string()
}
fn default_min_samples() -> usize {
    10
}
fn default_max_divergence() -> f64 {
    0.1
}
fn default_max_duration() -> i64 {
    2000
}

impl Default for PathsenseConfig {
    fn default() -> Self {
        Self::default_with_dir(&default_data_dir())
    }
}

impl PathsenseConfig {
    /// Reads `<data_dir>/pathsense.json`, writing the defaults there on first use.
    pub fn load_or_default(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let mut config: PathsenseConfig = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", config_path.display()))?;
            config.data_dir = data_dir.to_path_buf();
            config.validate()?;
            return Ok(config);
        }

        let config = Self::default_with_dir(data_dir);
        config.persist()?;
        Ok(config)
    }

    pub fn default_with_dir(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            hover: HoverConfig::default(),
            layout: LayoutConfig::default(),
            stats: StatsConfig::default(),
            batch: BatchConfig::default(),
            screening: ScreeningConfig::default(),
        }
    }

    pub fn persist(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let config_path = self.data_dir.join(CONFIG_FILE);
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(config_path, raw)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let hover = &self.hover;
        ensure!(hover.period_ms > 0.0, "hover.period_ms must be positive, got {}", hover.period_ms);
        ensure!(hover.radius > 0.0, "hover.radius must be positive, got {}", hover.radius);
        ensure!(
            hover.association_distance > 0.0,
            "hover.association_distance must be positive, got {}",
            hover.association_distance
        );
        ensure!(
            !self.layout.middle_option.trim().is_empty(),
            "layout.middle_option must not be empty"
        );
        ensure!(
            self.screening.max_divergence >= 0.0,
            "screening.max_divergence must not be negative"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let config = PathsenseConfig::load_or_default(dir.path()).unwrap();

        assert!(dir.path().join(CONFIG_FILE).exists());
        assert_eq!(config.hover, HoverConfig::default());
        assert_eq!(config.layout.middle_option, "option1");
        assert_eq!(config.stats.excluded_labels, vec!["first_movement_delay"]);
        assert!(config.batch.is_scored(&QuestionType::TripartiteChoice));
        assert!(!config.batch.is_scored(&QuestionType::Other("free_text".into())));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"hover": {"radius": 0.08}, "batch": {"worker_threads": 3}}"#,
        )
        .unwrap();

        let config = PathsenseConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.hover.radius, 0.08);
        assert_eq!(config.hover.period_ms, 1000.0);
        assert_eq!(config.batch.effective_threads(), 3);
        assert_eq!(config.batch.benchmark_category, "benchmark");
        assert_eq!(config.data_dir, dir.path());
    }

    #[test]
    fn test_persist_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut config = PathsenseConfig::default_with_dir(dir.path());
        config.screening.min_samples = 25;
        config.persist().unwrap();

        let loaded = PathsenseConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.screening.min_samples, 25);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let dir = TempDir::new().unwrap();
        let mut config = PathsenseConfig::default_with_dir(dir.path());
        assert!(config.validate().is_ok());

        config.hover.radius = 0.0;
        assert!(config.validate().is_err());

        config.hover.radius = 0.05;
        config.layout.middle_option = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), r#"{"hover": {"period_ms": -5}}"#).unwrap();
        assert!(PathsenseConfig::load_or_default(dir.path()).is_err());
    }
}
