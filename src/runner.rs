use crate::charts::{self, ChartGenerator, ResultsTable};
use crate::config::Config;
use crate::dataset::load_dataset;
use crate::evaluation::Evaluator;
use crate::metrics;
use crate::models::{EvaluationReport, TestCase};
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Orchestrates the `evaluate` job: load, score, print, save
pub struct Runner {
    config: Config,
    evaluator: Evaluator,
    verbose: bool,
}

impl Runner {
    /// Create a runner with the metrics described by `config`
    pub fn from_config(config: Config, verbose: bool) -> Result<Self> {
        let metrics = metrics::from_config(&config).context("Failed to set up metrics")?;
        let evaluator = Evaluator::new(metrics, verbose);
        Ok(Self::new(config, evaluator, verbose))
    }

    pub fn new(config: Config, evaluator: Evaluator, verbose: bool) -> Self {
        Self {
            config,
            evaluator,
            verbose,
        }
    }

    /// Run the whole evaluation job and return what was written
    pub async fn run_evaluation(&self, format: OutputFormat) -> Result<EvaluationReport> {
        let cases = self.load_cases()?;
        let report = self.evaluate_cases(&cases).await?;

        output::print_results(&report, format);
        self.store_results(&report)?;

        Ok(report)
    }

    fn load_cases(&self) -> Result<Vec<TestCase>> {
        println!(
            "📂 Loading dataset from {}",
            self.config.dataset_file.display()
        );
        let cases = load_dataset(&self.config.dataset_file, &self.config.models)?;
        if self.verbose {
            println!("Loaded {} testcases", cases.len());
        }
        Ok(cases)
    }

    /// Score every testcase against every configured model
    pub async fn evaluate_cases(&self, cases: &[TestCase]) -> Result<EvaluationReport> {
        println!(
            "🧮 Evaluating {} testcases across {} models...",
            cases.len(),
            self.config.models.len()
        );

        let records = self
            .evaluator
            .evaluate_all(cases, &self.config.models)
            .await?;

        if self.verbose {
            println!("Calculating statistics for {} models", self.config.models.len());
        }
        let statistics = self
            .evaluator
            .calculate_statistics(&records, &self.config.models);

        Ok(EvaluationReport {
            statistics,
            records,
        })
    }

    fn store_results(&self, report: &EvaluationReport) -> Result<()> {
        let path = &self.config.results_file;
        if self.verbose {
            println!("Storing {} results to {}", report.records.len(), path.display());
        }
        output::write_results_csv(&report.records, path)?;
        println!("\n✅ Results saved to {}", path.display());
        Ok(())
    }
}

/// Run the `plot` job: one chart per configured metric present in the results file
pub fn run_charts(config: &Config, show: bool) -> Result<Vec<PathBuf>> {
    println!("📊 Generating EDA Charts...");

    let table = ResultsTable::from_csv(&config.results_file)?;
    tracing::debug!(path = %config.results_file.display(), rows = table.len(), "results table loaded");
    if table.is_empty() {
        tracing::warn!(path = %config.results_file.display(), "results table has no rows");
    }

    let mut generator = ChartGenerator::new(config.chart.clone(), config.charts_dir.clone());
    if show {
        generator = generator.with_display(charts::show_chart);
    }
    let written = generator.plot_metrics(&table, &config.metrics_to_plot)?;

    println!("\n✅ All plots saved to ./{}/", config.charts_dir.display());
    Ok(written)
}
