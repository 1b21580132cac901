use super::{Metric, MetricScores, Score};
use crate::config::BertScoreConfig;
use crate::models::ScoreKind;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Per-input, per-token embeddings as returned by `/embed_all`
type TokenEmbeddings = Vec<Vec<Vec<f32>>>;

#[derive(Debug, Serialize)]
struct EmbedAllRequest<'a> {
    inputs: [&'a str; 2],
    truncate: bool,
}

/// BERTScore F1 computed from contextual token embeddings served by a
/// text-embeddings-inference server.
///
/// Each candidate token is greedily matched to its most similar reference token
/// (precision) and vice versa (recall). The first and last token of each input
/// are the model's special tokens; with `strip_special_tokens` they can still be
/// matched against but are left out of both averages.
pub struct BertScoreMetric {
    client: Client,
    url: String,
    api_key: Option<String>,
    strip_special_tokens: bool,
}

impl BertScoreMetric {
    pub fn from_config(config: &BertScoreConfig) -> Result<Self> {
        let api_key = match &config.env_var_api_key {
            Some(var) => Some(
                std::env::var(var)
                    .with_context(|| format!("Environment variable {} not found", var))?,
            ),
            None => None,
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build embedding HTTP client")?;

        Ok(Self {
            client,
            url: format!("{}/embed_all", config.endpoint.trim_end_matches('/')),
            api_key,
            strip_special_tokens: config.strip_special_tokens,
        })
    }

    /// Precision, recall and F1 for one pair
    pub async fn score(&self, reference: &str, candidate: &str) -> Result<Score> {
        if reference.trim().is_empty() || candidate.trim().is_empty() {
            tracing::debug!("empty reference or candidate, BERTScore is 0");
            return Ok(Score::default());
        }

        let mut embeddings = self.embed_all(candidate, reference).await?;
        if embeddings.len() != 2 {
            anyhow::bail!(
                "Embedding server returned {} inputs, expected 2",
                embeddings.len()
            );
        }
        let reference_tokens = embeddings.pop().unwrap_or_default();
        let candidate_tokens = embeddings.pop().unwrap_or_default();

        greedy_match(
            &candidate_tokens,
            &reference_tokens,
            self.strip_special_tokens,
        )
    }

    async fn embed_all(&self, candidate: &str, reference: &str) -> Result<TokenEmbeddings> {
        let body = EmbedAllRequest {
            inputs: [candidate, reference],
            truncate: true,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        request
            .send()
            .await
            .with_context(|| format!("Failed to reach embedding server at {}", self.url))?
            .error_for_status()
            .context("Embedding server returned an error status")?
            .json::<TokenEmbeddings>()
            .await
            .context("Failed to parse token embeddings")
    }
}

#[async_trait]
impl Metric for BertScoreMetric {
    fn name(&self) -> &str {
        "bertscore"
    }

    async fn measure(&self, reference: &str, candidate: &str) -> Result<MetricScores> {
        let score = self.score(reference, candidate).await?;
        tracing::trace!(
            precision = score.precision,
            recall = score.recall,
            f1 = score.fmeasure,
            "bertscore scored"
        );
        Ok(vec![(ScoreKind::BertScore, score.fmeasure)])
    }
}

fn normalize(vectors: &[Vec<f32>]) -> Vec<Vec<f64>> {
    vectors
        .iter()
        .map(|v| {
            let norm = v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
            if norm < 1e-12 {
                vec![0.0; v.len()]
            } else {
                v.iter().map(|x| *x as f64 / norm).collect()
            }
        })
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Token positions that count towards the averages
fn weighted_range(len: usize, strip_special_tokens: bool) -> std::ops::Range<usize> {
    if strip_special_tokens && len >= 2 {
        1..len - 1
    } else {
        0..len
    }
}

/// Mean over weighted `from` tokens of the best cosine match among all `to` tokens
fn mean_best_match(from: &[Vec<f64>], to: &[Vec<f64>], strip_special_tokens: bool) -> f64 {
    let range = weighted_range(from.len(), strip_special_tokens);
    let count = range.len();
    let total: f64 = from[range]
        .iter()
        .map(|f| {
            to.iter()
                .map(|t| dot(f, t))
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .sum();
    total / count as f64
}

fn greedy_match(
    candidate: &[Vec<f32>],
    reference: &[Vec<f32>],
    strip_special_tokens: bool,
) -> Result<Score> {
    if weighted_range(candidate.len(), strip_special_tokens).is_empty()
        || weighted_range(reference.len(), strip_special_tokens).is_empty()
    {
        return Ok(Score::default());
    }

    let dim = candidate[0].len();
    if candidate.iter().chain(reference).any(|v| v.len() != dim) {
        anyhow::bail!("Token embeddings have inconsistent dimensions");
    }

    let candidate = normalize(candidate);
    let reference = normalize(reference);

    let precision = mean_best_match(&candidate, &reference, strip_special_tokens);
    let recall = mean_best_match(&reference, &candidate, strip_special_tokens);

    Ok(Score::from_precision_recall(precision, recall))
}
