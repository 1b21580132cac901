use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const TESTCASE_ID_COLUMN: &str = "Testcase ID";
pub const MODEL_COLUMN: &str = "Model";
pub const ROUGE1_COLUMN: &str = "ROUGE-1 Score";
pub const ROUGEL_COLUMN: &str = "ROUGE-L Score";
pub const BERTSCORE_COLUMN: &str = "BERTScore";

/// One dataset entry with its reference and every model's summary
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    /// Position in the dataset array
    pub id: usize,
    /// Text the summaries were generated from
    pub source: String,
    /// Human-written summary to compare against
    pub reference_summary: String,
    /// Generated summary per model identifier
    pub summaries: HashMap<String, String>,
}

impl TestCase {
    /// Summary generated by `model`, empty when the dataset has none
    pub fn summary(&self, model: &str) -> &str {
        self.summaries.get(model).map(String::as_str).unwrap_or("")
    }
}

/// Score column produced by a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreKind {
    Rouge1,
    RougeL,
    BertScore,
}

impl ScoreKind {
    pub const ALL: [ScoreKind; 3] = [ScoreKind::Rouge1, ScoreKind::RougeL, ScoreKind::BertScore];

    /// Header used in the results table
    pub fn column(&self) -> &'static str {
        match self {
            ScoreKind::Rouge1 => ROUGE1_COLUMN,
            ScoreKind::RougeL => ROUGEL_COLUMN,
            ScoreKind::BertScore => BERTSCORE_COLUMN,
        }
    }
}

/// Scores for one (testcase, model) pair; one row of the results table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    #[serde(rename = "Testcase ID")]
    pub testcase_id: usize,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "ROUGE-1 Score")]
    pub rouge1: f64,
    #[serde(rename = "ROUGE-L Score")]
    pub rouge_l: f64,
    #[serde(rename = "BERTScore")]
    pub bertscore: f64,
}

impl ScoreRecord {
    pub fn score(&self, kind: ScoreKind) -> f64 {
        match kind {
            ScoreKind::Rouge1 => self.rouge1,
            ScoreKind::RougeL => self.rouge_l,
            ScoreKind::BertScore => self.bertscore,
        }
    }
}

/// One value per score column
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    #[serde(rename = "ROUGE-1 Score")]
    pub rouge1: f64,
    #[serde(rename = "ROUGE-L Score")]
    pub rouge_l: f64,
    #[serde(rename = "BERTScore")]
    pub bertscore: f64,
}

impl ScoreSet {
    pub fn get(&self, kind: ScoreKind) -> f64 {
        match kind {
            ScoreKind::Rouge1 => self.rouge1,
            ScoreKind::RougeL => self.rouge_l,
            ScoreKind::BertScore => self.bertscore,
        }
    }

    pub fn set(&mut self, kind: ScoreKind, value: f64) {
        match kind {
            ScoreKind::Rouge1 => self.rouge1 = value,
            ScoreKind::RougeL => self.rouge_l = value,
            ScoreKind::BertScore => self.bertscore = value,
        }
    }
}

/// Aggregates for one model across all test cases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatistics {
    pub model: String,
    /// Number of test cases scored
    pub count: usize,
    pub mean: ScoreSet,
    pub median: ScoreSet,
}

/// Everything the `evaluate` job produces
#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Per-model aggregates, in configured model order
    pub statistics: Vec<ModelStatistics>,
    /// Results table, testcase-major and model-minor
    pub records: Vec<ScoreRecord>,
}
