use crate::error::{Error, Result};
use crate::split::{DatasetSplit, Sample, Split};

use image::{DynamicImage, GenericImageView, ImageFormat};
use image::imageops::{FilterType};
use log::{debug, warn};
use serde::{Serialize};
use threadpool::{ThreadPool};
use time::{OffsetDateTime};

use std::cmp::{min};
use std::collections::{HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel};

pub const DEFAULT_NUM_WORKERS: usize = 8;
pub const MANIFEST_FILE: &str = "manifest.csv";

const CHANNEL_CAPACITY: usize = 128;
const PROGRESS_INTERVAL: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transform {
  /// Byte-for-byte copy.
  Copy,
  /// Crop the centered `min(w, h)` square, then resize it to `size` x `size`.
  CenterCrop{size: u32},
  /// Scale so that the smaller side is `dim`, keeping the aspect ratio.
  /// Images already at or below `dim` are left at their size.
  ResizeSmaller{dim: u32},
}

impl Transform {
  /// Target sides must be non-zero.
  pub fn validate(&self) -> Result<()> {
    match *self {
      Transform::CenterCrop{size: 0} => Err(Error::InvalidTransform("crop size must be at least 1".to_owned())),
      Transform::ResizeSmaller{dim: 0} => Err(Error::InvalidTransform("resize dimension must be at least 1".to_owned())),
      _ => Ok(()),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManifestRow {
  pub split:        String,
  pub label:        String,
  pub source:       String,
  pub destination:  String,
}

#[derive(Clone, Debug, Default)]
pub struct ProcessReport {
  pub train:    usize,
  pub valid:    usize,
  pub test:     usize,
  pub entries:  Vec<ManifestRow>,
}

impl ProcessReport {
  pub fn count(&self, split: Split) -> usize {
    match split {
      Split::Train => self.train,
      Split::Valid => self.valid,
      Split::Test  => self.test,
    }
  }

  fn bump(&mut self, split: Split) {
    match split {
      Split::Train => self.train += 1,
      Split::Valid => self.valid += 1,
      Split::Test  => self.test += 1,
    }
  }
}

struct Job {
  split:  Split,
  sample: Sample,
  dst:    PathBuf,
}

pub fn center_crop(image: &DynamicImage, size: u32) -> DynamicImage {
  let (width, height) = image.dimensions();
  let side = min(width, height);
  let x = (width - side) / 2;
  let y = (height - side) / 2;
  image.crop_imm(x, y, side, side).resize_exact(size, size, FilterType::Lanczos3)
}

pub fn resize_smaller(image: &DynamicImage, dim: u32) -> DynamicImage {
  let (old_width, old_height) = image.dimensions();
  let min_side = min(old_width, old_height);
  if min_side <= dim {
    return image.clone();
  }
  let (new_width, new_height) = if old_width < old_height {
    (dim, (dim as f32 / old_width as f32 * old_height as f32).round() as u32)
  } else if old_width > old_height {
    ((dim as f32 / old_height as f32 * old_width as f32).round() as u32, dim)
  } else {
    (dim, dim)
  };
  image.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

/// Writes `src` to `dst`, applying `transform`.
pub fn process_image(src: &Path, dst: &Path, transform: Transform) -> Result<()> {
  let image = match transform {
    Transform::Copy => {
      fs::copy(src, dst).map_err(|e| Error::io(dst, e))?;
      return Ok(());
    }
    Transform::CenterCrop{size} => {
      let image = image::open(src).map_err(|e| Error::image(src, e))?;
      center_crop(&image, size)
    }
    Transform::ResizeSmaller{dim} => {
      let image = image::open(src).map_err(|e| Error::image(src, e))?;
      resize_smaller(&image, dim)
    }
  };
  // JPEG has no alpha channel.
  let image = match ImageFormat::from_path(dst) {
    Ok(ImageFormat::Jpeg) => DynamicImage::ImageRgb8(image.to_rgb8()),
    _ => image,
  };
  image.save(dst).map_err(|e| Error::image(dst, e))
}

/// Destination of every sample: `<output_dir>/<split>/<label>/<file name>`.
/// Clashing names (same label from different source folders) get a numeric
/// suffix.
fn plan_jobs(split: &DatasetSplit, output_dir: &Path) -> Result<Vec<Job>> {
  let mut jobs = vec![];
  let mut taken = HashSet::new();
  for &s in Split::ALL.iter() {
    for sample in split.get(s) {
      let file_name = match sample.path.file_name() {
        Some(name) => PathBuf::from(name),
        None => return Err(Error::InvalidSamplePath(sample.path.clone())),
      };
      let dst_dir = output_dir.join(s.as_str()).join(&sample.label);
      let mut dst = dst_dir.join(&file_name);
      let mut suffix = 1;
      while !taken.insert(dst.clone()) {
        let stem = file_name.file_stem().map(|x| x.to_string_lossy().into_owned()).unwrap_or_default();
        let renamed = match file_name.extension() {
          Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
          None => format!("{}_{}", stem, suffix),
        };
        dst = dst_dir.join(renamed);
        suffix += 1;
      }
      if suffix > 1 {
        warn!("renamed clashing file {} to {}", sample.path.display(), dst.display());
      }
      jobs.push(Job{split: s, sample: sample.clone(), dst});
    }
  }
  Ok(jobs)
}

/// Copies or transforms every sample of `split` under `output_dir` using a
/// pool of `num_workers` threads. Returns the first failure after all jobs
/// have run.
pub fn process_split(split: &DatasetSplit, output_dir: &Path, transform: Transform, num_workers: usize) -> Result<ProcessReport> {
  transform.validate()?;
  if num_workers == 0 {
    return Err(Error::Worker("worker pool needs at least one thread".to_owned()));
  }
  let jobs = plan_jobs(split, output_dir)?;
  let dirs: HashSet<PathBuf> = jobs.iter().filter_map(|j| j.dst.parent().map(|p| p.to_owned())).collect();
  for dir in dirs.iter() {
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
  }

  let total = jobs.len();
  let start_time = OffsetDateTime::now_utc();
  let pool = ThreadPool::new(num_workers);
  let (result_tx, result_rx) = sync_channel(CHANNEL_CAPACITY);
  for job in jobs {
    let result_tx = result_tx.clone();
    pool.execute(move || {
      let res = process_image(&job.sample.path, &job.dst, transform);
      let _ = result_tx.send((job, res));
    });
  }
  drop(result_tx);

  let mut report = ProcessReport::default();
  let mut first_err = None;
  for done in 0 .. total {
    let (job, res) = match result_rx.recv() {
      Ok(msg) => msg,
      Err(_) => {
        first_err.get_or_insert(Error::Worker(format!(
            "{} of {} jobs did not report back", total - done, total)));
        break;
      }
    };
    match res {
      Ok(_) => {
        report.bump(job.split);
        report.entries.push(ManifestRow{
          split:        job.split.as_str().to_owned(),
          label:        job.sample.label,
          source:       job.sample.path.display().to_string(),
          destination:  job.dst.display().to_string(),
        });
      }
      Err(e) => {
        warn!("failed to process {}: {}", job.sample.path.display(), e);
        first_err.get_or_insert(e);
      }
    }
    if (done + 1) % PROGRESS_INTERVAL == 0 {
      let elapsed = (OffsetDateTime::now_utc() - start_time).as_seconds_f32();
      debug!("processed: {} / {} elapsed: {:.3}", done + 1, total, elapsed);
    }
  }
  pool.join();

  match first_err {
    Some(e) => Err(e),
    None => {
      debug!("processed {} images into {}", total, output_dir.display());
      Ok(report)
    }
  }
}

/// Records which source file landed in which split, sorted by split and
/// destination.
pub fn write_manifest(report: &ProcessReport, output_dir: &Path) -> Result<PathBuf> {
  fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;
  let path = output_dir.join(MANIFEST_FILE);
  let mut rows: Vec<&ManifestRow> = report.entries.iter().collect();
  rows.sort_by(|a, b| (&a.split, &a.destination).cmp(&(&b.split, &b.destination)));
  let mut writer = csv::Writer::from_path(&path)?;
  for row in rows {
    writer.serialize(row)?;
  }
  writer.flush().map_err(|e| Error::io(&path, e))?;
  Ok(path)
}
