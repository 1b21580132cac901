use crate::models::{
    EvaluationReport, MODEL_COLUMN, ModelStatistics, ScoreKind, ScoreRecord, TESTCASE_ID_COLUMN,
};
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tabled::builder::Builder;
use tabled::settings::Style;

/// Output format options
#[derive(Debug, Clone, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print evaluation results in the specified format
pub fn print_results(report: &EvaluationReport, format: OutputFormat) {
    match format {
        OutputFormat::Plain => print_plain(report),
        OutputFormat::Json => print_json(report),
    }
}

/// Print the results table followed by per-model statistics
fn print_plain(report: &EvaluationReport) {
    println!("{}", render_records(&report.records));

    if !report.statistics.is_empty() {
        println!();
        println!("📊 STATISTICS");
        println!("{}", render_statistics(&report.statistics));
    }
}

/// Print results in JSON format
fn print_json(report: &EvaluationReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results to JSON: {}", e),
    }
}

fn format_score(value: f64) -> String {
    format!("{:.6}", value)
}

/// Grid with one row per record: testcase id, model, then each score column
pub fn render_records(records: &[ScoreRecord]) -> String {
    let mut builder = Builder::default();

    let mut header = vec![TESTCASE_ID_COLUMN.to_string(), MODEL_COLUMN.to_string()];
    header.extend(ScoreKind::ALL.iter().map(|k| k.column().to_string()));
    builder.push_record(header);

    for record in records {
        let mut row = vec![record.testcase_id.to_string(), record.model.clone()];
        row.extend(ScoreKind::ALL.iter().map(|k| format_score(record.score(*k))));
        builder.push_record(row);
    }

    let mut table = builder.build();
    table.with(Style::modern());
    table.to_string()
}

/// Grid with mean and median per model and score column
pub fn render_statistics(statistics: &[ModelStatistics]) -> String {
    let mut builder = Builder::default();

    let mut header = vec![MODEL_COLUMN.to_string(), "Count".to_string()];
    for kind in ScoreKind::ALL {
        header.push(format!("{} (mean)", kind.column()));
        header.push(format!("{} (median)", kind.column()));
    }
    builder.push_record(header);

    for stats in statistics {
        let mut row = vec![stats.model.clone(), stats.count.to_string()];
        for kind in ScoreKind::ALL {
            row.push(format_score(stats.mean.get(kind)));
            row.push(format_score(stats.median.get(kind)));
        }
        builder.push_record(row);
    }

    let mut table = builder.build();
    table.with(Style::modern());
    table.to_string()
}

/// Write the results table as CSV, replacing any existing file
pub fn write_results_csv(records: &[ScoreRecord], path: &Path) -> Result<()> {
    ensure_parent_exists(path)?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create results file: {}", path.display()))?;

    if records.is_empty() {
        // serde only emits the header alongside the first row
        writer
            .write_record(csv_header())
            .context("Failed to write results header")?;
    }
    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("Failed to write results to: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write results to: {}", path.display()))?;

    tracing::debug!(path = %path.display(), rows = records.len(), "results written");
    Ok(())
}

fn csv_header() -> Vec<&'static str> {
    let mut header = vec![TESTCASE_ID_COLUMN, MODEL_COLUMN];
    header.extend(ScoreKind::ALL.iter().map(|k| k.column()));
    header
}

/// Ensure the directory for the results file exists
fn ensure_parent_exists(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}
