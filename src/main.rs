use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod charts;
mod config;
mod dataset;
mod evaluation;
mod metrics;
mod models;
mod output;
mod runner;

use crate::config::Config;
use crate::output::OutputFormat;
use crate::runner::Runner;

/// Summary evaluation CLI - score model summaries with ROUGE and BERTScore and chart the results
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output - show progress for each testcase and debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score every model summary against its reference and write the results table
    Evaluate {
        /// JSON dataset to evaluate
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// CSV file to write the results table to
        #[arg(long)]
        results: Option<PathBuf>,

        /// Comma-separated model identifiers
        #[arg(short, long, value_delimiter = ',')]
        models: Vec<String>,

        /// Output format: plain or json
        #[arg(short, long, default_value = "plain")]
        output: OutputFormat,
    },
    /// Render one grouped bar chart per metric column of a results table
    Plot {
        /// CSV results table to read
        #[arg(long)]
        results: Option<PathBuf>,

        /// Directory to write the chart images to
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Open each chart in the system image viewer after saving it
        #[arg(long)]
        show: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Evaluate {
            dataset,
            results,
            models,
            output,
        } => {
            if let Some(dataset) = dataset {
                config.dataset_file = dataset;
            }
            if let Some(results) = results {
                config.results_file = results;
            }
            if !models.is_empty() {
                config.models = models;
            }
            config.validate()?;

            let runner = Runner::from_config(config, args.verbose)?;
            runner.run_evaluation(output).await?;
        }
        Command::Plot {
            results,
            out_dir,
            show,
        } => {
            if let Some(results) = results {
                config.results_file = results;
            }
            if let Some(out_dir) = out_dir {
                config.charts_dir = out_dir;
            }

            runner::run_charts(&config, show)?;
        }
    }

    Ok(())
}
