use crate::error::{Error, Result};

use log::{debug};

use std::collections::{HashMap};
use std::io::{Read};
use std::path::{Path};

const SPLIT_COLUMN: &str = "split";
const LABEL_COLUMN: &str = "label";

/// Ground truth and predicted class probabilities for one data split.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SplitPredictions {
  pub name:   String,
  pub y_true: Vec<usize>,
  pub proba:  Vec<Vec<f64>>,
}

impl SplitPredictions {
  pub fn len(&self) -> usize {
    self.y_true.len()
  }

  pub fn is_empty(&self) -> bool {
    self.y_true.is_empty()
  }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Predictions {
  pub classes:  Vec<String>,
  /// In order of first appearance in the file.
  pub splits:   Vec<SplitPredictions>,
}

pub fn read_predictions<P: AsRef<Path>>(path: P) -> Result<Predictions> {
  let path = path.as_ref();
  if !path.is_file() {
    return Err(Error::MissingPath(path.to_owned()));
  }
  let reader = csv::Reader::from_path(path)?;
  let predictions = parse_predictions(reader)?;
  debug!("read {} splits over {} classes from {}",
      predictions.splits.len(), predictions.classes.len(), path.display());
  Ok(predictions)
}

/// Parses `split,label,<class_0>,...,<class_k-1>` rows. `label` is either a
/// class column name or a zero-based class index.
pub fn parse_predictions<R: Read>(mut reader: csv::Reader<R>) -> Result<Predictions> {
  let headers = reader.headers()?.clone();
  if headers.len() < 4 || &headers[0] != SPLIT_COLUMN || &headers[1] != LABEL_COLUMN {
    return Err(Error::InvalidPredictions(format!(
        "expected header `{},{},<class>,<class>,...`, got `{}`",
        SPLIT_COLUMN, LABEL_COLUMN, headers.iter().collect::<Vec<_>>().join(","))));
  }
  let classes: Vec<String> = headers.iter().skip(2).map(|h| h.to_owned()).collect();
  let class_idx: HashMap<&str, usize> = classes.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();

  let mut splits: Vec<SplitPredictions> = vec![];
  for (row_idx, record) in reader.records().enumerate() {
    let record = record?;
    let line = row_idx + 2;
    let split_name = &record[0];
    let label = &record[1];
    let y = match class_idx.get(label) {
      Some(&y) => y,
      None => match label.parse::<usize>() {
        Ok(y) if y < classes.len() => y,
        _ => return Err(Error::InvalidPredictions(format!(
            "line {}: unknown label {:?}", line, label))),
      },
    };
    let mut row = Vec::with_capacity(classes.len());
    for field in record.iter().skip(2) {
      let p: f64 = field.trim().parse().map_err(|_| Error::InvalidPredictions(format!(
          "line {}: not a probability: {:?}", line, field)))?;
      if !p.is_finite() || p < 0.0 {
        return Err(Error::InvalidPredictions(format!(
            "line {}: probability out of range: {}", line, p)));
      }
      row.push(p);
    }

    let split = match splits.iter().position(|s| s.name == split_name) {
      Some(pos) => &mut splits[pos],
      None => {
        splits.push(SplitPredictions{name: split_name.to_owned(), ..SplitPredictions::default()});
        let last = splits.len() - 1;
        &mut splits[last]
      }
    };
    split.y_true.push(y);
    split.proba.push(row);
  }

  Ok(Predictions{classes, splits})
}
