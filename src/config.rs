use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Metric columns plotted by default, in chart order
pub const DEFAULT_METRICS_TO_PLOT: [&str; 3] = ["ROUGE-1 Score", "ROUGE-L Score", "BERTScore"];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("model identifier at position {0} is empty")]
    EmptyModel(usize),
    #[error("model identifier {0:?} is listed more than once")]
    DuplicateModel(String),
    #[error("chart dimensions must be non-zero, got {width}x{height}")]
    ChartSize { width: u32, height: u32 },
    #[error("bertscore.timeout_secs must be greater than zero")]
    ZeroTimeout,
    #[error("bertscore.endpoint must not be empty")]
    EmptyEndpoint,
}

/// ROUGE scorer settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RougeConfig {
    /// Apply the Porter stemmer to tokens longer than three characters
    #[serde(default = "default_use_stemmer")]
    pub use_stemmer: bool,
}

impl Default for RougeConfig {
    fn default() -> Self {
        Self {
            use_stemmer: default_use_stemmer(),
        }
    }
}

/// BERTScore embedding server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BertScoreConfig {
    /// Base URL of a text-embeddings-inference server exposing `/embed_all`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Environment variable holding an optional bearer token
    #[serde(default)]
    pub env_var_api_key: Option<String>,
    /// Give the first and last token (the model's special tokens) zero weight
    #[serde(default = "default_strip_special_tokens")]
    pub strip_special_tokens: bool,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BertScoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            env_var_api_key: None,
            strip_special_tokens: default_strip_special_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Chart rendering settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChartConfig {
    #[serde(default = "default_chart_width")]
    pub width: u32,
    #[serde(default = "default_chart_height")]
    pub height: u32,
    /// TrueType font used for titles, ticks and legend; system fonts are searched when unset
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: default_chart_width(),
            height: default_chart_height(),
            font_path: None,
        }
    }
}

fn default_dataset_file() -> PathBuf {
    PathBuf::from("regulatory_summarization_dataset.json")
}

fn default_models() -> Vec<String> {
    vec![
        "model_1".to_string(),
        "model_2".to_string(),
        "model_3".to_string(),
    ]
}

fn default_results_file() -> PathBuf {
    PathBuf::from("summary_eval_scores.csv")
}

fn default_charts_dir() -> PathBuf {
    PathBuf::from("analysis")
}

fn default_metrics_to_plot() -> Vec<String> {
    DEFAULT_METRICS_TO_PLOT.iter().map(|m| m.to_string()).collect()
}

fn default_use_stemmer() -> bool {
    true
}

fn default_endpoint() -> String {
    "http://localhost:8080".to_string()
}

fn default_strip_special_tokens() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_chart_width() -> u32 {
    1200
}

fn default_chart_height() -> u32 {
    600
}

/// Root configuration shared by the `evaluate` and `plot` jobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// JSON array of test cases
    #[serde(default = "default_dataset_file")]
    pub dataset_file: PathBuf,
    /// Model identifiers; each reads the `{model}_summary` field of a test case
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    /// CSV results table written by `evaluate` and read by `plot`
    #[serde(default = "default_results_file")]
    pub results_file: PathBuf,
    /// Directory receiving the chart images
    #[serde(default = "default_charts_dir")]
    pub charts_dir: PathBuf,
    /// Metric columns to chart, in order
    #[serde(default = "default_metrics_to_plot")]
    pub metrics_to_plot: Vec<String>,
    #[serde(default)]
    pub rouge: RougeConfig,
    #[serde(default)]
    pub bertscore: BertScoreConfig,
    #[serde(default)]
    pub chart: ChartConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_file: default_dataset_file(),
            models: default_models(),
            results_file: default_results_file(),
            charts_dir: default_charts_dir(),
            metrics_to_plot: default_metrics_to_plot(),
            rouge: RougeConfig::default(),
            bertscore: BertScoreConfig::default(),
            chart: ChartConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` when given, otherwise fall back to the built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (i, model) in self.models.iter().enumerate() {
            if model.trim().is_empty() {
                return Err(ConfigError::EmptyModel(i));
            }
            if !seen.insert(model.as_str()) {
                return Err(ConfigError::DuplicateModel(model.clone()));
            }
        }
        if self.chart.width == 0 || self.chart.height == 0 {
            return Err(ConfigError::ChartSize {
                width: self.chart.width,
                height: self.chart.height,
            });
        }
        if self.bertscore.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.bertscore.endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        Ok(())
    }
}
