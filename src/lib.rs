//! Dataset preparation and evaluation helpers for an image classifier:
//! unpack the raw image tarball, split it into `train` / `valid` / `test`
//! folders with stratified sampling, optionally crop or resize on the way,
//! and score the classifier's predicted probabilities.

pub mod archive;
pub mod error;
pub mod evaluate;
pub mod metrics;
pub mod predictions;
pub mod process;
pub mod split;

pub use crate::archive::{ExtractOutcome, extract_tar};
pub use crate::error::{Error, Result};
pub use crate::evaluate::{MetricsReport, evaluate, write_metrics};
pub use crate::predictions::{Predictions, SplitPredictions, read_predictions};
pub use crate::process::{ProcessReport, Transform, process_split, write_manifest};
pub use crate::split::{DatasetSplit, Sample, Split, SplitOptions, collect_samples, split_samples};

use log::{info};

use std::path::{PathBuf};

pub const DEFAULT_OUTPUT_DIR: &str = "data/processed";

#[derive(Clone, Debug)]
pub struct DatasetConfig {
  pub tar_input:      Option<PathBuf>,
  pub tar_output:     Option<PathBuf>,
  pub image_dir:      Option<PathBuf>,
  pub output_dir:     PathBuf,

  pub split:          SplitOptions,
  pub transform:      Transform,
  pub num_workers:    usize,
  pub write_manifest: bool,
}

impl Default for DatasetConfig {
  fn default() -> DatasetConfig {
    DatasetConfig{
      tar_input:      None,
      tar_output:     None,
      image_dir:      None,
      output_dir:     PathBuf::from(DEFAULT_OUTPUT_DIR),

      split:          SplitOptions::default(),
      transform:      Transform::Copy,
      num_workers:    process::DEFAULT_NUM_WORKERS,
      write_manifest: true,
    }
  }
}

impl DatasetConfig {
  /// Extracts the raw tarball if both ends are configured.
  pub fn extract_archive(&self) -> Result<Option<ExtractOutcome>> {
    match (&self.tar_input, &self.tar_output) {
      (Some(tar_input), Some(tar_output)) => {
        let outcome = extract_tar(tar_input, tar_output)?;
        info!("archive {}: {:?}", tar_input.display(), outcome);
        Ok(Some(outcome))
      }
      _ => Ok(None),
    }
  }

  /// Splits and writes out `image_dir` if configured.
  pub fn split_dataset(&self) -> Result<Option<ProcessReport>> {
    let image_dir = match self.image_dir {
      Some(ref dir) => dir,
      None => return Ok(None),
    };
    let samples = collect_samples(image_dir)?;
    let split = split_samples(samples, &self.split)?;
    let report = process_split(&split, &self.output_dir, self.transform, self.num_workers)?;
    if self.write_manifest {
      let manifest = write_manifest(&report, &self.output_dir)?;
      info!("wrote manifest {}", manifest.display());
    }
    for &s in Split::ALL.iter() {
      info!("{}: {} images", s.as_str(), report.count(s));
    }
    Ok(Some(report))
  }

  pub fn run(&self) -> Result<()> {
    self.extract_archive()?;
    self.split_dataset()?;
    Ok(())
  }
}
