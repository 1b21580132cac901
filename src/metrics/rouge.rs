use super::{Metric, MetricScores, Score, porter};
use crate::models::ScoreKind;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Tokens up to this length are never stemmed
const MIN_STEM_LEN: usize = 3;

/// ROUGE-1 and ROUGE-L F-measures over lowercased alphanumeric tokens
pub struct RougeMetric {
    use_stemmer: bool,
}

impl RougeMetric {
    pub fn new(use_stemmer: bool) -> Self {
        Self { use_stemmer }
    }

    /// Lowercase, split on anything outside `[a-z0-9]`, then stem long tokens
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized: String = text
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() || c.is_ascii_digit() {
                    c
                } else {
                    ' '
                }
            })
            .collect();

        normalized
            .split_whitespace()
            .map(|token| {
                if self.use_stemmer && token.len() > MIN_STEM_LEN {
                    porter::stem(token)
                } else {
                    token.to_string()
                }
            })
            .filter(|token| !token.is_empty())
            .collect()
    }

    pub fn rouge1(&self, reference: &str, candidate: &str) -> Score {
        unigram_overlap(&self.tokenize(reference), &self.tokenize(candidate))
    }

    pub fn rouge_l(&self, reference: &str, candidate: &str) -> Score {
        lcs_overlap(&self.tokenize(reference), &self.tokenize(candidate))
    }
}

#[async_trait]
impl Metric for RougeMetric {
    fn name(&self) -> &str {
        "rouge"
    }

    async fn measure(&self, reference: &str, candidate: &str) -> Result<MetricScores> {
        let rouge1 = self.rouge1(reference, candidate);
        let rouge_l = self.rouge_l(reference, candidate);
        tracing::trace!(
            rouge1_precision = rouge1.precision,
            rouge1_recall = rouge1.recall,
            rouge_l_precision = rouge_l.precision,
            rouge_l_recall = rouge_l.recall,
            "rouge scored"
        );

        Ok(vec![
            (ScoreKind::Rouge1, rouge1.fmeasure),
            (ScoreKind::RougeL, rouge_l.fmeasure),
        ])
    }
}

fn counts(tokens: &[String]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Clipped unigram matches between the two token lists
fn unigram_overlap(reference: &[String], candidate: &[String]) -> Score {
    let reference_counts = counts(reference);
    let candidate_counts = counts(candidate);

    let matches: usize = candidate_counts
        .iter()
        .map(|(token, &count)| count.min(reference_counts.get(token).copied().unwrap_or(0)))
        .sum();

    ratio_score(matches, reference.len(), candidate.len())
}

fn lcs_overlap(reference: &[String], candidate: &[String]) -> Score {
    let lcs = lcs_length(reference, candidate);
    ratio_score(lcs, reference.len(), candidate.len())
}

fn ratio_score(matches: usize, reference_len: usize, candidate_len: usize) -> Score {
    if reference_len == 0 || candidate_len == 0 {
        return Score::default();
    }
    let precision = matches as f64 / candidate_len as f64;
    let recall = matches as f64 / reference_len as f64;
    Score::from_precision_recall(precision, recall)
}

/// Longest common subsequence length, keeping a single DP row
fn lcs_length(a: &[String], b: &[String]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut row = vec![0usize; b.len() + 1];
    for x in a {
        let mut diagonal = 0;
        for (j, y) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if x == y {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_tokenize_lowercases_and_splits_punctuation() {
        let rouge = RougeMetric::new(false);
        assert_eq!(
            rouge.tokenize("The Cat, sat-on THE mat!"),
            vec!["the", "cat", "sat", "on", "the", "mat"]
        );
    }

    #[test]
    fn test_tokenize_drops_non_ascii_letters() {
        let rouge = RougeMetric::new(false);
        assert_eq!(rouge.tokenize("café 2024 naïve"), vec!["caf", "2024", "na", "ve"]);
    }

    #[test]
    fn test_tokenize_stems_only_long_tokens() {
        let rouge = RougeMetric::new(true);
        assert_eq!(
            rouge.tokenize("running cats ran"),
            vec!["run", "cat", "ran"]
        );
        // "was" has three characters and is kept verbatim
        assert_eq!(rouge.tokenize("was"), vec!["was"]);
    }

    #[test]
    fn test_tokenize_uses_porter_stems() {
        let rouge = RougeMetric::new(true);
        assert_eq!(
            rouge.tokenize("Fairly generously, the skies"),
            vec!["fairli", "gener", "the", "sky"]
        );
    }

    #[test]
    fn test_porter_keeps_y_variants_apart() {
        let rouge = RougeMetric::new(true);
        assert_eq!(rouge.rouge1("fair", "fairly").fmeasure, 0.0);
        assert_eq!(rouge.rouge1("fairly", "fairly").fmeasure, 1.0);
    }

    #[test]
    fn test_identical_text_scores_one() {
        let rouge = RougeMetric::new(true);
        assert_eq!(rouge.rouge1("the cat sat", "the cat sat").fmeasure, 1.0);
        assert_eq!(rouge.rouge_l("the cat sat", "the cat sat").fmeasure, 1.0);
    }

    #[test]
    fn test_stemming_matches_inflections() {
        let stemmed = RougeMetric::new(true);
        let plain = RougeMetric::new(false);
        let reference = "regulators publish rules";
        let candidate = "regulator published rule";

        assert_eq!(stemmed.rouge1(reference, candidate).fmeasure, 1.0);
        assert_eq!(plain.rouge1(reference, candidate).fmeasure, 0.0);
    }

    #[test]
    fn test_rouge1_partial_overlap() {
        let rouge = RougeMetric::new(false);
        // candidate: 4 tokens, reference: 6 tokens, 3 shared
        let score = rouge.rouge1("the cat sat on the mat", "the dog sat on");
        assert!((score.precision - 0.75).abs() < 1e-12);
        assert!((score.recall - 0.5).abs() < 1e-12);
        assert!((score.fmeasure - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_rouge1_clips_repeated_tokens() {
        let score = unigram_overlap(&tokens(&["the", "cat"]), &tokens(&["the", "the", "the"]));
        assert!((score.precision - 1.0 / 3.0).abs() < 1e-12);
        assert!((score.recall - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rouge_l_respects_order() {
        let rouge = RougeMetric::new(false);
        // same bag of words, reversed order: LCS is a single token
        let score = rouge.rouge_l("a b c", "c b a");
        assert!((score.fmeasure - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(rouge.rouge1("a b c", "c b a").fmeasure, 1.0);
    }

    #[test]
    fn test_lcs_length() {
        let a = tokens(&["a", "b", "c", "b", "d", "a", "b"]);
        let b = tokens(&["b", "d", "c", "a", "b", "a"]);
        assert_eq!(lcs_length(&a, &b), 4);
        assert_eq!(lcs_length(&a, &[]), 0);
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        let rouge = RougeMetric::new(true);
        for (reference, candidate) in [("", "the cat"), ("the cat", ""), ("", ""), ("...", "!!")] {
            assert_eq!(rouge.rouge1(reference, candidate), Score::default());
            assert_eq!(rouge.rouge_l(reference, candidate), Score::default());
        }
    }

    #[tokio::test]
    async fn test_measure_reports_both_columns() {
        let rouge = RougeMetric::new(true);
        let scores = rouge.measure("the cat sat", "the cat sat").await.unwrap();
        assert_eq!(
            scores,
            vec![(ScoreKind::Rouge1, 1.0), (ScoreKind::RougeL, 1.0)]
        );
    }

    #[tokio::test]
    async fn test_measure_is_deterministic() {
        let rouge = RougeMetric::new(true);
        let reference = "The agency issued new reporting requirements for banks.";
        let candidate = "Banks must follow new reporting rules issued by the agency.";
        let first = rouge.measure(reference, candidate).await.unwrap();
        let second = rouge.measure(reference, candidate).await.unwrap();
        assert_eq!(first, second);
    }
}
