use std::io;
use std::path::{PathBuf};

use thiserror::{Error as ThisError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
  #[error("path does not exist: {0}")]
  MissingPath(PathBuf),

  #[error("not a directory: {0}")]
  NotADirectory(PathBuf),

  #[error("io error at {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("image error at {path}: {source}")]
  Image {
    path:   PathBuf,
    #[source]
    source: image::ImageError,
  },

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("invalid split: {0}")]
  InvalidSplit(String),

  #[error("sample path has no file name: {0}")]
  InvalidSamplePath(PathBuf),

  #[error("invalid transform: {0}")]
  InvalidTransform(String),

  #[error("invalid predictions: {0}")]
  InvalidPredictions(String),

  #[error("undefined metric: {0}")]
  UndefinedMetric(String),

  #[error("worker pool failed: {0}")]
  Worker(String),
}

impl Error {
  pub fn io<P: Into<PathBuf>>(path: P, source: io::Error) -> Error {
    Error::Io{path: path.into(), source}
  }

  pub fn image<P: Into<PathBuf>>(path: P, source: image::ImageError) -> Error {
    Error::Image{path: path.into(), source}
  }
}
