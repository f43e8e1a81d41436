use crate::error::{Error, Result};
use crate::metrics::{accuracy_score, argmax, f1_score_weighted, log_loss, roc_auc_score_weighted};
use crate::predictions::{Predictions, SplitPredictions};

use log::{info};
use serde::{Serialize};

use std::collections::{BTreeMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path};

/// Flat `<split>_<metric>` -> value map, serialized as a JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricsReport {
  pub metrics: BTreeMap<String, f64>,
}

impl MetricsReport {
  pub fn get(&self, key: &str) -> Option<f64> {
    self.metrics.get(key).cloned()
  }
}

pub fn evaluate_split(split: &SplitPredictions, report: &mut MetricsReport) -> Result<()> {
  let y_pred: Vec<usize> = split.proba.iter().map(|row| argmax(row)).collect();
  let name = &split.name;
  report.metrics.insert(format!("{}_accuracy", name), accuracy_score(&split.y_true, &y_pred)?);
  report.metrics.insert(format!("{}_f1-score", name), f1_score_weighted(&split.y_true, &y_pred)?);
  report.metrics.insert(format!("{}_roc-auc-score", name), roc_auc_score_weighted(&split.y_true, &split.proba)?);
  report.metrics.insert(format!("{}_log-loss", name), log_loss(&split.y_true, &split.proba)?);
  Ok(())
}

pub fn evaluate(predictions: &Predictions) -> Result<MetricsReport> {
  if predictions.splits.is_empty() {
    return Err(Error::InvalidPredictions("no prediction rows".to_owned()));
  }
  let mut report = MetricsReport::default();
  for split in predictions.splits.iter() {
    evaluate_split(split, &mut report)?;
    info!("{}: {} samples, accuracy {:.4}",
        split.name, split.len(), report.get(&format!("{}_accuracy", split.name)).unwrap_or(0.0));
  }
  Ok(report)
}

pub fn write_metrics<P: AsRef<Path>>(report: &MetricsReport, path: P) -> Result<()> {
  let path = path.as_ref();
  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() {
      fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
  }
  let file = File::create(path).map_err(|e| Error::io(path, e))?;
  let mut writer = BufWriter::new(file);
  serde_json::to_writer_pretty(&mut writer, report)?;
  writer.write_all(b"\n").map_err(|e| Error::io(path, e))?;
  writer.flush().map_err(|e| Error::io(path, e))?;
  Ok(())
}
