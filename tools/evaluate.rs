use imgclass_preproc::{evaluate, read_predictions, write_metrics};

use anyhow::{Context, Result};
use clap::{Parser};
use log::{info};

use std::path::{PathBuf};

/// Score a classifier's predictions and write the metrics as JSON
#[derive(Parser, Debug)]
#[command(name = "evaluate", version, about, long_about = None)]
struct Cli {
  /// CSV of `split,label,<class>...` rows holding predicted probabilities
  predictions: PathBuf,

  /// Where to write the metrics JSON
  metric_path: PathBuf,
}

fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let cli = Cli::parse();
  let predictions = read_predictions(&cli.predictions)
    .with_context(|| format!("failed to read predictions from {}", cli.predictions.display()))?;
  let report = evaluate(&predictions).context("failed to compute metrics")?;
  write_metrics(&report, &cli.metric_path)
    .with_context(|| format!("failed to write metrics to {}", cli.metric_path.display()))?;
  info!("wrote {} metrics to {}", report.metrics.len(), cli.metric_path.display());
  Ok(())
}
