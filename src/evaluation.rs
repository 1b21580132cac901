use crate::metrics::Metric;
use crate::models::{ModelStatistics, ScoreKind, ScoreRecord, ScoreSet, TestCase};
use anyhow::{Context, Result};

/// Runs every configured metric over each (testcase, model) pair
pub struct Evaluator {
    metrics: Vec<Box<dyn Metric>>,
    verbose: bool,
}

impl Evaluator {
    /// Create a new evaluator over the given metrics
    pub fn new(metrics: Vec<Box<dyn Metric>>, verbose: bool) -> Self {
        Self { metrics, verbose }
    }

    /// Score one pair with every metric, requiring each score column exactly once
    pub async fn score_pair(&self, reference: &str, candidate: &str) -> Result<ScoreSet> {
        let mut scores = ScoreSet::default();
        let mut filled = Vec::with_capacity(ScoreKind::ALL.len());

        for metric in &self.metrics {
            let values = metric
                .measure(reference, candidate)
                .await
                .with_context(|| format!("Metric {} failed", metric.name()))?;

            for (kind, value) in values {
                if filled.contains(&kind) {
                    anyhow::bail!("Score column {} produced more than once", kind.column());
                }
                scores.set(kind, value);
                filled.push(kind);
            }
        }

        if let Some(missing) = ScoreKind::ALL.iter().find(|k| !filled.contains(k)) {
            anyhow::bail!("No configured metric produces {}", missing.column());
        }

        Ok(scores)
    }

    /// Score all pairs, testcase-major and model-minor
    pub async fn evaluate_all(
        &self,
        cases: &[TestCase],
        models: &[String],
    ) -> Result<Vec<ScoreRecord>> {
        let mut records = Vec::with_capacity(cases.len() * models.len());
        let total_cases = cases.len();

        for case in cases {
            self.log_case_processing(case.id, total_cases);
            tracing::debug!(
                testcase = case.id,
                source_chars = case.source.chars().count(),
                reference_chars = case.reference_summary.chars().count(),
                "scoring testcase"
            );

            for model in models {
                let candidate = case.summary(model);
                let scores = self
                    .score_pair(&case.reference_summary, candidate)
                    .await
                    .with_context(|| {
                        format!("Failed to score testcase {} for model {}", case.id, model)
                    })?;

                tracing::debug!(
                    testcase = case.id,
                    model = %model,
                    rouge1 = scores.rouge1,
                    rouge_l = scores.rouge_l,
                    bertscore = scores.bertscore,
                    "pair scored"
                );

                records.push(ScoreRecord {
                    testcase_id: case.id,
                    model: model.clone(),
                    rouge1: scores.rouge1,
                    rouge_l: scores.rouge_l,
                    bertscore: scores.bertscore,
                });
            }
        }

        Ok(records)
    }

    /// Log testcase progress if verbose mode is enabled
    fn log_case_processing(&self, id: usize, total: usize) {
        if self.verbose {
            println!("  → Scoring testcase {}/{}", id + 1, total);
        }
    }

    /// Mean and median of every score column per model, in `models` order
    pub fn calculate_statistics(
        &self,
        records: &[ScoreRecord],
        models: &[String],
    ) -> Vec<ModelStatistics> {
        models
            .iter()
            .map(|model| {
                let model_records: Vec<&ScoreRecord> =
                    records.iter().filter(|r| &r.model == model).collect();

                let mut mean = ScoreSet::default();
                let mut median = ScoreSet::default();
                for kind in ScoreKind::ALL {
                    let scores = self.collect_scores(&model_records, kind);
                    if scores.is_empty() {
                        continue;
                    }
                    mean.set(kind, self.calculate_mean(&scores));
                    median.set(kind, self.calculate_median(&scores));
                }

                ModelStatistics {
                    model: model.clone(),
                    count: model_records.len(),
                    mean,
                    median,
                }
            })
            .collect()
    }

    fn collect_scores(&self, records: &[&ScoreRecord], kind: ScoreKind) -> Vec<f64> {
        records.iter().map(|r| r.score(kind)).collect()
    }

    fn calculate_mean(&self, scores: &[f64]) -> f64 {
        let sum: f64 = scores.iter().sum();
        sum / scores.len() as f64
    }

    fn calculate_median(&self, scores: &[f64]) -> f64 {
        let mut sorted_scores = scores.to_vec();
        sorted_scores.sort_by(|a, b| a.total_cmp(b));

        let mid = sorted_scores.len() / 2;
        if sorted_scores.len() % 2 == 0 {
            (sorted_scores[mid - 1] + sorted_scores[mid]) / 2.0
        } else {
            sorted_scores[mid]
        }
    }
}
