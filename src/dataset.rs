use crate::models::TestCase;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("test case {index} is missing required field {field:?}")]
    MissingField { index: usize, field: String },
    #[error("test case {index} field {field:?} must be a string, found {found}")]
    InvalidField {
        index: usize,
        field: String,
        found: &'static str,
    },
}

/// Load a JSON array of test cases, extracting one summary per model
pub fn load_dataset(path: &Path, models: &[String]) -> Result<Vec<TestCase>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset file: {}", path.display()))?;

    let cases = parse_dataset(&content, models)
        .with_context(|| format!("Failed to load dataset: {}", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        cases = cases.len(),
        models = models.len(),
        "dataset loaded"
    );
    Ok(cases)
}

/// Parse dataset JSON already in memory
pub fn parse_dataset(content: &str, models: &[String]) -> Result<Vec<TestCase>> {
    let items: Vec<Map<String, Value>> =
        serde_json::from_str(content).context("Dataset must be a JSON array of objects")?;

    let cases = items
        .iter()
        .enumerate()
        .map(|(index, item)| build_test_case(index, item, models))
        .collect::<Result<Vec<_>, DatasetError>>()?;

    Ok(cases)
}

fn build_test_case(
    index: usize,
    item: &Map<String, Value>,
    models: &[String],
) -> Result<TestCase, DatasetError> {
    let source = string_field(index, item, "source")?.ok_or_else(|| DatasetError::MissingField {
        index,
        field: "source".to_string(),
    })?;
    let reference_summary = string_field(index, item, "reference_summary")?.unwrap_or_default();

    let mut summaries = HashMap::with_capacity(models.len());
    for model in models {
        let key = format!("{}_summary", model);
        let summary = string_field(index, item, &key)?.unwrap_or_default();
        summaries.insert(model.clone(), summary);
    }

    Ok(TestCase {
        id: index,
        source,
        reference_summary,
        summaries,
    })
}

/// `Ok(None)` when the field is absent or null
fn string_field(
    index: usize,
    item: &Map<String, Value>,
    field: &str,
) -> Result<Option<String>, DatasetError> {
    match item.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(DatasetError::InvalidField {
            index,
            field: field.to_string(),
            found: json_type_name(other),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
