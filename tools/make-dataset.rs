use imgclass_preproc::{DatasetConfig, SplitOptions, Transform};
use imgclass_preproc::process::{DEFAULT_NUM_WORKERS};
use imgclass_preproc::split::{DEFAULT_SEED, DEFAULT_TEST_SIZE, DEFAULT_VAL_NUM};

use anyhow::{Context, Result};
use clap::{Parser};

use std::path::{PathBuf};

/// Extract and process the image dataset
#[derive(Parser, Debug)]
#[command(name = "make-dataset", version, about, long_about = None)]
struct Cli {
  /// Path of the dataset tarball
  #[arg(long, env = "IMGCLASS_TAR_INPUT")]
  tar_input: Option<PathBuf>,

  /// Directory to extract the tarball into
  #[arg(long, env = "IMGCLASS_TAR_OUTPUT")]
  tar_output: Option<PathBuf>,

  /// Image folder to split; labels are the images' parent directory names
  #[arg(long, env = "IMGCLASS_IMAGE_DIR")]
  image_dir: Option<PathBuf>,

  /// Root of the train/valid/test folders
  #[arg(long, env = "IMGCLASS_OUTPUT_DIR", default_value = imgclass_preproc::DEFAULT_OUTPUT_DIR)]
  output_dir: PathBuf,

  /// Fraction of images held out as the test set
  #[arg(long, default_value_t = DEFAULT_TEST_SIZE)]
  test_size: f64,

  /// Number of test images also copied to the validation folder
  #[arg(long, default_value_t = DEFAULT_VAL_NUM)]
  val_num: usize,

  #[arg(long, env = "IMGCLASS_SEED", default_value_t = DEFAULT_SEED)]
  seed: u64,

  #[arg(long)]
  no_shuffle: bool,

  #[arg(long)]
  no_stratify: bool,

  /// Center-crop to a SIZE x SIZE square
  #[arg(long, value_name = "SIZE", conflicts_with = "resize_smaller",
      value_parser = clap::value_parser!(u32).range(1..))]
  crop: Option<u32>,

  /// Resize so the smaller side is DIM pixels
  #[arg(long, value_name = "DIM", value_parser = clap::value_parser!(u32).range(1..))]
  resize_smaller: Option<u32>,

  #[arg(long, env = "IMGCLASS_WORKERS", default_value_t = DEFAULT_NUM_WORKERS as u64,
      value_parser = clap::value_parser!(u64).range(1..))]
  workers: u64,

  /// Skip writing manifest.csv
  #[arg(long)]
  no_manifest: bool,
}

impl Cli {
  fn into_config(self) -> DatasetConfig {
    let transform = match (self.crop, self.resize_smaller) {
      (Some(size), _) => Transform::CenterCrop{size},
      (None, Some(dim)) => Transform::ResizeSmaller{dim},
      (None, None) => Transform::Copy,
    };
    DatasetConfig{
      tar_input:      self.tar_input,
      tar_output:     self.tar_output,
      image_dir:      self.image_dir,
      output_dir:     self.output_dir,

      split: SplitOptions{
        test_size:  self.test_size,
        val_num:    self.val_num,
        shuffle:    !self.no_shuffle,
        stratify:   !self.no_stratify,
        seed:       Some(self.seed),
      },
      transform,
      num_workers:    self.workers as usize,
      write_manifest: !self.no_manifest,
    }
  }
}

fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let config = Cli::parse().into_config();
  config.run().context("failed to prepare dataset")?;
  Ok(())
}
