//! Classification metrics over integer class labels and per-class
//! probability rows.

use crate::error::{Error, Result};

use std::cmp::{Ordering};
use std::collections::{BTreeSet};

/// Probabilities are clipped to `[LOG_LOSS_EPS, 1 - LOG_LOSS_EPS]` before
/// taking logs.
pub const LOG_LOSS_EPS: f64 = 1e-15;

fn check_lengths(y_true: usize, other: usize) -> Result<()> {
  if y_true == 0 {
    return Err(Error::UndefinedMetric("no samples".to_owned()));
  }
  if y_true != other {
    return Err(Error::UndefinedMetric(format!(
        "{} labels but {} predictions", y_true, other)));
  }
  Ok(())
}

/// Index of the largest entry. Ties go to the lowest index.
pub fn argmax(row: &[f64]) -> usize {
  let mut best = 0;
  for (i, &p) in row.iter().enumerate() {
    if p > row[best] {
      best = i;
    }
  }
  best
}

pub fn accuracy_score(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
  check_lengths(y_true.len(), y_pred.len())?;
  let correct = y_true.iter().zip(y_pred).filter(|&(t, p)| t == p).count();
  Ok(correct as f64 / y_true.len() as f64)
}

/// Per-class F1 over every label seen in either input, averaged with the
/// true support of each class as weight.
pub fn f1_score_weighted(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
  check_lengths(y_true.len(), y_pred.len())?;
  let labels: BTreeSet<usize> = y_true.iter().chain(y_pred).cloned().collect();
  let mut weighted = 0.0;
  for &label in labels.iter() {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&t, &p) in y_true.iter().zip(y_pred) {
      match (t == label, p == label) {
        (true, true) => tp += 1,
        (false, true) => fp += 1,
        (true, false) => fn_ += 1,
        (false, false) => {}
      }
    }
    let support = tp + fn_;
    let denom = 2 * tp + fp + fn_;
    let f1 = if denom == 0 { 0.0 } else { 2.0 * tp as f64 / denom as f64 };
    weighted += f1 * support as f64;
  }
  Ok(weighted / y_true.len() as f64)
}

/// Area under the ROC curve of `scores` against the boolean `positive`,
/// via the Mann-Whitney rank statistic with averaged ranks for ties.
pub fn binary_roc_auc(positive: &[bool], scores: &[f64]) -> Result<f64> {
  check_lengths(positive.len(), scores.len())?;
  let n_pos = positive.iter().filter(|&&p| p).count();
  let n_neg = positive.len() - n_pos;
  if n_pos == 0 || n_neg == 0 {
    return Err(Error::UndefinedMetric(
        "roc auc needs both positive and negative samples".to_owned()));
  }

  let mut order: Vec<usize> = (0 .. scores.len()).collect();
  order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

  let mut pos_rank_sum = 0.0;
  let mut start = 0;
  while start < order.len() {
    let mut end = start + 1;
    while end < order.len() && scores[order[end]] == scores[order[start]] {
      end += 1;
    }
    // Ranks are 1-based; a tie group shares the mean of its ranks.
    let mean_rank = (start + 1 + end) as f64 / 2.0;
    for &idx in &order[start .. end] {
      if positive[idx] {
        pos_rank_sum += mean_rank;
      }
    }
    start = end;
  }
  let n_pos = n_pos as f64;
  let n_neg = n_neg as f64;
  Ok((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// One-vs-rest ROC AUC averaged with class support as weight. For two
/// classes this is the AUC of the second column.
pub fn roc_auc_score_weighted(y_true: &[usize], proba: &[Vec<f64>]) -> Result<f64> {
  check_lengths(y_true.len(), proba.len())?;
  let num_classes = num_columns(proba)?;
  let present: BTreeSet<usize> = y_true.iter().cloned().collect();
  if present.len() < 2 {
    return Err(Error::UndefinedMetric(
        "roc auc needs at least two classes in y_true".to_owned()));
  }
  if let Some(&bad) = present.iter().find(|&&c| c >= num_classes) {
    return Err(Error::UndefinedMetric(format!(
        "label {} has no probability column", bad)));
  }

  if num_classes == 2 {
    let positive: Vec<bool> = y_true.iter().map(|&y| y == 1).collect();
    let scores: Vec<f64> = proba.iter().map(|row| row[1]).collect();
    return binary_roc_auc(&positive, &scores);
  }

  let mut weighted = 0.0;
  for &class in present.iter() {
    let positive: Vec<bool> = y_true.iter().map(|&y| y == class).collect();
    let scores: Vec<f64> = proba.iter().map(|row| row[class]).collect();
    let support = positive.iter().filter(|&&p| p).count();
    weighted += binary_roc_auc(&positive, &scores)? * support as f64;
  }
  Ok(weighted / y_true.len() as f64)
}

/// Mean negative log-likelihood of the true class. Rows are clipped and then
/// renormalised to sum to one.
pub fn log_loss(y_true: &[usize], proba: &[Vec<f64>]) -> Result<f64> {
  check_lengths(y_true.len(), proba.len())?;
  let num_classes = num_columns(proba)?;
  let mut total = 0.0;
  for (&y, row) in y_true.iter().zip(proba) {
    if y >= num_classes {
      return Err(Error::UndefinedMetric(format!(
          "label {} has no probability column", y)));
    }
    let clipped: Vec<f64> = row.iter().map(|&p| p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS)).collect();
    let norm: f64 = clipped.iter().sum();
    total -= (clipped[y] / norm).ln();
  }
  Ok(total / y_true.len() as f64)
}

fn num_columns(proba: &[Vec<f64>]) -> Result<usize> {
  let k = proba.first().map(|row| row.len()).unwrap_or(0);
  if k < 2 {
    return Err(Error::UndefinedMetric(format!("need at least 2 probability columns, got {}", k)));
  }
  if proba.iter().any(|row| row.len() != k) {
    return Err(Error::UndefinedMetric("ragged probability rows".to_owned()));
  }
  Ok(k)
}
