//! Grouped bar charts comparing models per metric.
//!
//! The results CSV is read back without assuming which metric columns exist:
//! only `Testcase ID` and `Model` are required, and each requested metric is
//! charted only if its column is present.

use crate::config::ChartConfig;
use crate::models::{MODEL_COLUMN, TESTCASE_ID_COLUMN};
use anyhow::{Context, Result};
use csv::StringRecord;
use plotters::prelude::*;
use plotters::style::register_font;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Seaborn's Set2 palette
const SET2: [RGBColor; 8] = [
    RGBColor(102, 194, 165),
    RGBColor(252, 141, 98),
    RGBColor(141, 160, 203),
    RGBColor(231, 138, 195),
    RGBColor(166, 216, 84),
    RGBColor(255, 217, 47),
    RGBColor(229, 196, 148),
    RGBColor(179, 179, 179),
];

/// Share of each category slot covered by its bar group
const GROUP_WIDTH: f64 = 0.8;

const FONT_FAMILY: &str = "sans-serif";

/// Room below the plot for vertical testcase labels and the axis title
const X_LABEL_AREA: u32 = 80;

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static FONT_READY: OnceLock<bool> = OnceLock::new();

/// Results table read back from CSV
#[derive(Debug, Clone)]
pub struct ResultsTable {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
    id_index: usize,
    model_index: usize,
}

/// Metric values laid out for a grouped bar chart
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedSeries {
    /// Testcase IDs along the x-axis
    pub categories: Vec<String>,
    /// Models in order of first appearance
    pub models: Vec<String>,
    /// `values[model][category]`, averaged over repeated pairs
    pub values: Vec<Vec<Option<f64>>>,
}

impl GroupedSeries {
    /// Y-axis bounds including zero, with headroom above (and below negatives)
    fn value_range(&self) -> (f64, f64) {
        let (min, max) = self
            .values
            .iter()
            .flatten()
            .flatten()
            .fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(*v), hi.max(*v)));

        let span = if max - min < 1e-9 { 1.0 } else { max - min };
        let lower = if min < 0.0 { min - span * 0.05 } else { 0.0 };
        (lower, max + span * 0.05)
    }
}

impl ResultsTable {
    pub fn from_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open results file: {}", path.display()))?;
        Self::from_reader(file)
            .with_context(|| format!("Failed to read results file: {}", path.display()))
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(str::to_string)
            .collect();

        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .with_context(|| format!("Results table has no {:?} column", name))
        };
        let id_index = find(TESTCASE_ID_COLUMN)?;
        let model_index = find(MODEL_COLUMN)?;

        let rows = reader
            .records()
            .enumerate()
            .map(|(i, r)| r.with_context(|| format!("Malformed CSV row {}", i + 1)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            headers,
            rows,
            id_index,
            model_index,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    pub fn testcase_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|r| &r[self.id_index]).collect()
    }

    pub fn models(&self) -> Vec<&str> {
        self.rows.iter().map(|r| &r[self.model_index]).collect()
    }

    /// Numeric values of `name`, `None` if the column is absent; empty cells are `None`
    pub fn column(&self, name: &str) -> Result<Option<Vec<Option<f64>>>> {
        let Some(index) = self.headers.iter().position(|h| h == name) else {
            return Ok(None);
        };

        let values = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| -> Result<Option<f64>> {
                let cell = row.get(index).unwrap_or("").trim();
                if cell.is_empty() {
                    return Ok(None);
                }
                let value = cell.parse::<f64>().with_context(|| {
                    format!("Row {} has non-numeric {:?} value {:?}", i + 1, name, cell)
                })?;
                if !value.is_finite() {
                    anyhow::bail!("Row {} has non-finite {:?} value {:?}", i + 1, name, cell);
                }
                Ok(Some(value))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(values))
    }

    /// Values of `metric` grouped by testcase and model, `None` if the column is absent
    pub fn grouped(&self, metric: &str) -> Result<Option<GroupedSeries>> {
        let Some(values) = self.column(metric)? else {
            return Ok(None);
        };

        let categories = ordered_categories(&self.testcase_ids());
        let mut models: Vec<String> = Vec::new();
        for model in self.models() {
            if !models.iter().any(|m| m == model) {
                models.push(model.to_string());
            }
        }

        let category_index: HashMap<&str, usize> = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let model_index: HashMap<&str, usize> = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.as_str(), i))
            .collect();

        let mut sums = vec![vec![(0.0f64, 0usize); categories.len()]; models.len()];
        for (row, value) in self.rows.iter().zip(values) {
            let Some(value) = value else { continue };
            let c = category_index[&row[self.id_index]];
            let m = model_index[&row[self.model_index]];
            sums[m][c].0 += value;
            sums[m][c].1 += 1;
        }

        let values: Vec<Vec<Option<f64>>> = sums
            .into_iter()
            .map(|per_model| {
                per_model
                    .into_iter()
                    .map(|(sum, n)| (n > 0).then(|| sum / n as f64))
                    .collect::<Vec<_>>()
            })
            .collect();

        Ok(Some(GroupedSeries {
            categories,
            models,
            values,
        }))
    }
}

/// Unique ids, numerically ascending when every id is an integer
fn ordered_categories(ids: &[&str]) -> Vec<String> {
    let mut unique: Vec<&str> = Vec::new();
    for &id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }

    let numeric: Option<Vec<i64>> = unique.iter().map(|id| id.trim().parse().ok()).collect();
    if let Some(numbers) = numeric {
        let mut pairs: Vec<(i64, &str)> = numbers.into_iter().zip(unique).collect();
        pairs.sort_by_key(|(n, _)| *n);
        return pairs.into_iter().map(|(_, id)| id.to_string()).collect();
    }
    unique.into_iter().map(str::to_string).collect()
}

/// `ROUGE-1 Score` becomes `rouge-1_score_scores.png`
pub fn chart_file_name(metric: &str) -> String {
    format!("{}_scores.png", metric.to_lowercase().replace(' ', "_"))
}

pub fn chart_title(metric: &str) -> String {
    format!("{} Comparison Across Models", metric)
}

/// Register a TrueType font for chart text; `false` means charts render unlabelled
fn ensure_font(configured: Option<&Path>) -> bool {
    *FONT_READY.get_or_init(|| {
        let candidates: Vec<PathBuf> = configured
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
            .collect();

        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            match register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
                Ok(()) => {
                    tracing::debug!(font = %path.display(), "chart font registered");
                    return true;
                }
                Err(_) => tracing::warn!(font = %path.display(), "not a usable TrueType font"),
            }
        }

        tracing::warn!("no TrueType font found, charts will be rendered without text");
        false
    })
}

/// Renders one PNG per metric column
pub struct ChartGenerator {
    config: ChartConfig,
    out_dir: PathBuf,
    display: Option<fn(&Path)>,
}

impl ChartGenerator {
    pub fn new(config: ChartConfig, out_dir: PathBuf) -> Self {
        Self {
            config,
            out_dir,
            display: None,
        }
    }

    /// Hand each chart to `display` as soon as it is saved
    pub fn with_display(mut self, display: fn(&Path)) -> Self {
        self.display = Some(display);
        self
    }

    /// Chart every metric in `metrics` that the table has; returns the written paths
    pub fn plot_metrics(&self, table: &ResultsTable, metrics: &[String]) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.out_dir).with_context(|| {
            format!("Failed to create directory: {}", self.out_dir.display())
        })?;

        let labelled = ensure_font(self.config.font_path.as_deref());
        let mut written = Vec::new();

        for metric in metrics {
            if !table.has_column(metric) {
                tracing::debug!(metric = %metric, "column not in results table, skipping");
                continue;
            }
            let Some(series) = table.grouped(metric)? else {
                continue;
            };

            let path = self.out_dir.join(chart_file_name(metric));
            self.render(&series, metric, &path, labelled)
                .with_context(|| format!("Failed to render chart: {}", path.display()))?;
            println!("📈 Saved: {}", path.display());
            if let Some(display) = self.display {
                display(&path);
            }
            written.push(path);
        }

        Ok(written)
    }

    fn render(&self, series: &GroupedSeries, metric: &str, path: &Path, labelled: bool) -> Result<()> {
        let root =
            BitMapBackend::new(path, (self.config.width, self.config.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let slots = series.categories.len().max(1);
        let x_range = -0.5f64..slots as f64 - 0.5;
        let (y_min, y_max) = series.value_range();

        let mut builder = ChartBuilder::on(&root);
        builder.margin(20);
        if labelled {
            builder
                .caption(chart_title(metric), (FONT_FAMILY, 24).into_font())
                .x_label_area_size(X_LABEL_AREA)
                .y_label_area_size(70);
        }
        let mut chart = builder.build_cartesian_2d(x_range, y_min..y_max)?;

        if labelled {
            let label_for = |x: &f64| {
                let i = x.round();
                if (x - i).abs() < 1e-6 && i >= 0.0 {
                    series
                        .categories
                        .get(i as usize)
                        .cloned()
                        .unwrap_or_default()
                } else {
                    String::new()
                }
            };
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(slots)
                .x_label_formatter(&label_for)
                .x_label_style(
                    (FONT_FAMILY, 13)
                        .into_font()
                        .transform(FontTransform::Rotate90),
                )
                .x_desc(TESTCASE_ID_COLUMN)
                .y_desc(metric)
                .draw()?;
        }

        let bar_width = GROUP_WIDTH / series.models.len().max(1) as f64;
        for (m, model) in series.models.iter().enumerate() {
            let color = SET2[m % SET2.len()];
            let bars = series.values[m]
                .iter()
                .enumerate()
                .filter_map(|(c, value)| value.map(|v| (c, v)))
                .map(|(c, v)| {
                    let x0 = c as f64 - GROUP_WIDTH / 2.0 + m as f64 * bar_width;
                    Rectangle::new([(x0, 0.0), (x0 + bar_width, v)], color.filled())
                });

            let drawn = chart.draw_series(bars)?;
            if labelled {
                drawn.label(model.as_str()).legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                });
            }
        }

        if labelled && !series.models.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }

        root.present()?;
        Ok(())
    }
}

/// Open a saved chart in the platform image viewer and wait for it to return
pub fn show_chart(path: &Path) {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };

    match std::process::Command::new(opener).arg(path).status() {
        Ok(status) if status.success() => {}
        Ok(status) => tracing::warn!(viewer = opener, %status, "image viewer exited with failure"),
        Err(e) => tracing::warn!(viewer = opener, "could not launch image viewer: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreRecord;
    use crate::output::write_results_csv;
    use std::sync::Mutex;
    use tempfile::tempdir;

    const FULL_TABLE: &str = "\
Testcase ID,Model,ROUGE-1 Score,ROUGE-L Score,BERTScore
0,model_1,1.0,1.0,0.99
0,model_2,0.5,0.25,0.8
1,model_1,0.2,0.1,0.7
1,model_2,0.0,0.0,-0.1
";

    fn metrics() -> Vec<String> {
        ["ROUGE-1 Score", "ROUGE-L Score", "BERTScore"]
            .iter()
            .map(|m| m.to_string())
            .collect()
    }

    #[test]
    fn test_chart_file_names() {
        assert_eq!(chart_file_name("ROUGE-1 Score"), "rouge-1_score_scores.png");
        assert_eq!(chart_file_name("ROUGE-L Score"), "rouge-l_score_scores.png");
        assert_eq!(chart_file_name("BERTScore"), "bertscore_scores.png");
    }

    #[test]
    fn test_chart_title() {
        assert_eq!(chart_title("BERTScore"), "BERTScore Comparison Across Models");
    }

    #[test]
    fn test_requires_id_and_model_columns() {
        let err = ResultsTable::from_reader("Model,BERTScore\nm,0.5\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Testcase ID"));

        let err =
            ResultsTable::from_reader("Testcase ID,BERTScore\n0,0.5\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Model"));
    }

    #[test]
    fn test_missing_metric_column_is_none() {
        let table =
            ResultsTable::from_reader("Testcase ID,Model,BERTScore\n0,m,0.5\n".as_bytes()).unwrap();
        assert!(!table.has_column("ROUGE-1 Score"));
        assert!(table.column("ROUGE-1 Score").unwrap().is_none());
        assert!(table.grouped("ROUGE-1 Score").unwrap().is_none());
        assert_eq!(table.column("BERTScore").unwrap(), Some(vec![Some(0.5)]));
    }

    #[test]
    fn test_non_numeric_metric_is_an_error() {
        let table =
            ResultsTable::from_reader("Testcase ID,Model,BERTScore\n0,m,high\n".as_bytes())
                .unwrap();
        let err = table.column("BERTScore").unwrap_err();
        assert!(err.to_string().contains("non-numeric"));
    }

    #[test]
    fn test_non_finite_metric_is_an_error() {
        for cell in ["inf", "-inf", "NaN"] {
            let csv = format!("Testcase ID,Model,BERTScore\n0,m,{}\n", cell);
            let table = ResultsTable::from_reader(csv.as_bytes()).unwrap();
            let err = table.column("BERTScore").unwrap_err();
            assert!(err.to_string().contains("non-finite"), "{}: {}", cell, err);
        }
    }

    #[test]
    fn test_plot_fails_on_infinite_value() {
        let temp_dir = tempdir().unwrap();
        let table =
            ResultsTable::from_reader("Testcase ID,Model,BERTScore\n0,a,inf\n".as_bytes())
                .unwrap();
        let generator = ChartGenerator::new(ChartConfig::default(), temp_dir.path().to_path_buf());

        let err = generator
            .plot_metrics(&table, &["BERTScore".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("non-finite"));
        assert!(!temp_dir.path().join("bertscore_scores.png").exists());
    }

    #[test]
    fn test_grouped_layout() {
        let table = ResultsTable::from_reader(FULL_TABLE.as_bytes()).unwrap();
        let series = table.grouped("BERTScore").unwrap().unwrap();

        assert_eq!(series.categories, vec!["0", "1"]);
        assert_eq!(series.models, vec!["model_1", "model_2"]);
        assert_eq!(series.values[0], vec![Some(0.99), Some(0.7)]);
        assert_eq!(series.values[1], vec![Some(0.8), Some(-0.1)]);
    }

    #[test]
    fn test_grouped_sorts_ids_and_averages_repeats() {
        let csv = "\
Testcase ID,Model,BERTScore
10,b,0.5
2,a,0.25
10,b,0.75
2,b,
";
        let table = ResultsTable::from_reader(csv.as_bytes()).unwrap();
        let series = table.grouped("BERTScore").unwrap().unwrap();

        assert_eq!(series.categories, vec!["2", "10"]);
        assert_eq!(series.models, vec!["b", "a"]);
        assert_eq!(series.values[0], vec![None, Some(0.625)]);
        assert_eq!(series.values[1], vec![Some(0.25), None]);
    }

    #[test]
    fn test_value_range_covers_negatives() {
        let series = GroupedSeries {
            categories: vec!["0".to_string()],
            models: vec!["a".to_string(), "b".to_string()],
            values: vec![vec![Some(0.8)], vec![Some(-0.2)]],
        };
        let (lo, hi) = series.value_range();
        assert!(lo < -0.2);
        assert!(hi > 0.8);

        let flat = GroupedSeries {
            categories: vec![],
            models: vec![],
            values: vec![],
        };
        assert_eq!(flat.value_range(), (0.0, 0.05));
    }

    #[test]
    fn test_round_trip_through_csv() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("scores.csv");
        let records = vec![
            ScoreRecord {
                testcase_id: 0,
                model: "model_1".to_string(),
                rouge1: 1.0,
                rouge_l: 1.0,
                bertscore: 0.9876543210123,
            },
            ScoreRecord {
                testcase_id: 1,
                model: "model_1".to_string(),
                rouge1: 1.0 / 3.0,
                rouge_l: 0.0,
                bertscore: -0.05,
            },
        ];
        write_results_csv(&records, &path).unwrap();

        let table = ResultsTable::from_csv(&path).unwrap();
        assert_eq!(table.len(), records.len());
        assert_eq!(table.testcase_ids(), vec!["0", "1"]);
        assert_eq!(table.models(), vec!["model_1", "model_1"]);

        let rouge1 = table.column("ROUGE-1 Score").unwrap().unwrap();
        let rouge_l = table.column("ROUGE-L Score").unwrap().unwrap();
        let bertscore = table.column("BERTScore").unwrap().unwrap();
        for (i, record) in records.iter().enumerate() {
            assert_eq!(rouge1[i], Some(record.rouge1));
            assert_eq!(rouge_l[i], Some(record.rouge_l));
            assert_eq!(bertscore[i], Some(record.bertscore));
        }
    }

    #[test]
    fn test_plot_all_metrics() {
        let temp_dir = tempdir().unwrap();
        let out_dir = temp_dir.path().join("analysis");
        let table = ResultsTable::from_reader(FULL_TABLE.as_bytes()).unwrap();

        let generator = ChartGenerator::new(ChartConfig::default(), out_dir.clone());
        let written = generator.plot_metrics(&table, &metrics()).unwrap();

        assert_eq!(
            written,
            vec![
                out_dir.join("rouge-1_score_scores.png"),
                out_dir.join("rouge-l_score_scores.png"),
                out_dir.join("bertscore_scores.png"),
            ]
        );
        for path in &written {
            let bytes = std::fs::read(path).unwrap();
            assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
        }
    }

    #[test]
    fn test_plot_skips_missing_metric() {
        let temp_dir = tempdir().unwrap();
        let csv = "\
Testcase ID,Model,ROUGE-1 Score,BERTScore
0,a,0.5,0.9
0,b,0.4,0.8
";
        let table = ResultsTable::from_reader(csv.as_bytes()).unwrap();

        let config = ChartConfig {
            width: 320,
            height: 240,
            font_path: None,
        };
        let generator = ChartGenerator::new(config, temp_dir.path().to_path_buf());
        let written = generator.plot_metrics(&table, &metrics()).unwrap();

        assert_eq!(written.len(), 2);
        assert!(temp_dir.path().join("rouge-1_score_scores.png").exists());
        assert!(!temp_dir.path().join("rouge-l_score_scores.png").exists());
        assert!(temp_dir.path().join("bertscore_scores.png").exists());
    }

    static DISPLAYED: Mutex<Vec<(PathBuf, usize)>> = Mutex::new(Vec::new());

    /// Records each displayed chart with the number of PNGs present at that moment
    fn record_display(path: &Path) {
        let charts = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == "png")
            })
            .count();
        DISPLAYED
            .lock()
            .unwrap()
            .push((path.to_path_buf(), charts));
    }

    #[test]
    fn test_each_chart_displayed_right_after_saving() {
        let temp_dir = tempdir().unwrap();
        let table = ResultsTable::from_reader(FULL_TABLE.as_bytes()).unwrap();
        let generator = ChartGenerator::new(ChartConfig::default(), temp_dir.path().to_path_buf())
            .with_display(record_display);

        let written = generator.plot_metrics(&table, &metrics()).unwrap();

        let displayed = DISPLAYED.lock().unwrap().clone();
        assert_eq!(
            displayed,
            vec![
                (written[0].clone(), 1),
                (written[1].clone(), 2),
                (written[2].clone(), 3),
            ]
        );
    }

    #[test]
    fn test_plot_many_testcases() {
        let temp_dir = tempdir().unwrap();
        let mut csv = String::from("Testcase ID,Model,BERTScore\n");
        for id in 0..40 {
            csv.push_str(&format!("{},a,0.{}\n{},b,0.5\n", id, id % 10, id));
        }
        let table = ResultsTable::from_reader(csv.as_bytes()).unwrap();
        let generator = ChartGenerator::new(ChartConfig::default(), temp_dir.path().to_path_buf());

        let written = generator
            .plot_metrics(&table, &["BERTScore".to_string()])
            .unwrap();
        let bytes = std::fs::read(&written[0]).unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_plot_overwrites_existing_chart() {
        let temp_dir = tempdir().unwrap();
        let target = temp_dir.path().join("bertscore_scores.png");
        std::fs::write(&target, b"old").unwrap();

        let table = ResultsTable::from_reader(FULL_TABLE.as_bytes()).unwrap();
        let generator = ChartGenerator::new(ChartConfig::default(), temp_dir.path().to_path_buf());
        generator
            .plot_metrics(&table, &["BERTScore".to_string()])
            .unwrap();

        let bytes = std::fs::read(&target).unwrap();
        assert!(bytes.len() > 3);
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
