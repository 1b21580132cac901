//! Text-similarity scorers.
//!
//! Every scorer implements [`Metric`], so the evaluator can run any set of them
//! over a (reference, candidate) pair and collect the score columns each one
//! fills in.

mod bertscore;
mod porter;
mod rouge;

pub use bertscore::BertScoreMetric;
pub use rouge::RougeMetric;

use crate::config::Config;
use crate::models::ScoreKind;
use anyhow::Result;
use async_trait::async_trait;

/// Precision, recall and their harmonic mean
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Score {
    pub precision: f64,
    pub recall: f64,
    pub fmeasure: f64,
}

impl Score {
    pub fn from_precision_recall(precision: f64, recall: f64) -> Self {
        let fmeasure = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            fmeasure,
        }
    }
}

/// Values a metric produced for one pair, keyed by results-table column
pub type MetricScores = Vec<(ScoreKind, f64)>;

#[async_trait]
pub trait Metric: Send + Sync {
    fn name(&self) -> &str;

    /// Score `candidate` against `reference`
    async fn measure(&self, reference: &str, candidate: &str) -> Result<MetricScores>;
}

/// The ROUGE and BERTScore metrics configured for an `evaluate` run
pub fn from_config(config: &Config) -> Result<Vec<Box<dyn Metric>>> {
    Ok(vec![
        Box::new(RougeMetric::new(config.rouge.use_stemmer)),
        Box::new(BertScoreMetric::from_config(&config.bertscore)?),
    ])
}
