use crate::error::{Error, Result};

use log::{debug, info, warn};
use rand::{Rng, SeedableRng, thread_rng};
use rand::rngs::{StdRng};
use rand::seq::{SliceRandom};

use std::collections::{BTreeMap};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_TEST_SIZE: f64 = 0.6;
pub const DEFAULT_VAL_NUM: usize = 100;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Sample {
  pub path:   PathBuf,
  pub label:  String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Split {
  Train,
  Valid,
  Test,
}

impl Split {
  pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

  pub fn as_str(&self) -> &'static str {
    match *self {
      Split::Train => "train",
      Split::Valid => "valid",
      Split::Test  => "test",
    }
  }
}

#[derive(Clone, Debug)]
pub struct SplitOptions {
  /// Fraction of all samples held out as the test set, in (0, 1).
  pub test_size:  f64,
  /// Number of test samples that are also copied out as the validation set.
  pub val_num:    usize,
  pub shuffle:    bool,
  pub stratify:   bool,
  pub seed:       Option<u64>,
}

impl Default for SplitOptions {
  fn default() -> SplitOptions {
    SplitOptions{
      test_size:  DEFAULT_TEST_SIZE,
      val_num:    DEFAULT_VAL_NUM,
      shuffle:    true,
      stratify:   true,
      seed:       Some(DEFAULT_SEED),
    }
  }
}

/// Result of `split_samples`. `valid` is a subset of `test`.
#[derive(Clone, Debug, Default)]
pub struct DatasetSplit {
  pub train:  Vec<Sample>,
  pub valid:  Vec<Sample>,
  pub test:   Vec<Sample>,
}

impl DatasetSplit {
  pub fn get(&self, split: Split) -> &[Sample] {
    match split {
      Split::Train => &self.train,
      Split::Valid => &self.valid,
      Split::Test  => &self.test,
    }
  }
}

/// Recursively lists every regular file under `root`, labelled by the name
/// of its parent directory. Sorted by path.
pub fn collect_samples<P: AsRef<Path>>(root: P) -> Result<Vec<Sample>> {
  let root = root.as_ref();
  if !root.exists() {
    return Err(Error::MissingPath(root.to_owned()));
  }
  if !root.is_dir() {
    return Err(Error::NotADirectory(root.to_owned()));
  }
  // Resolves `.` and `..` so files directly under the root get a label.
  let root = fs::canonicalize(root).map_err(|e| Error::io(root, e))?;
  let mut samples = vec![];
  let mut pending = vec![root];
  while let Some(dir) = pending.pop() {
    for entry in fs::read_dir(&dir).map_err(|e| Error::io(&dir, e))? {
      let entry = entry.map_err(|e| Error::io(&dir, e))?;
      let path = entry.path();
      if entry.file_name().to_string_lossy().starts_with('.') {
        continue;
      }
      // Symlinked directories are not descended into.
      let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
      if file_type.is_dir() {
        pending.push(path);
        continue;
      }
      let is_file = if file_type.is_symlink() {
        match fs::metadata(&path) {
          Ok(meta) => meta.is_file(),
          Err(e) => {
            warn!("skipping dangling link {}: {}", path.display(), e);
            false
          }
        }
      } else {
        file_type.is_file()
      };
      if !is_file {
        continue;
      }
      let label = match dir.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => {
          warn!("skipping {}: parent has no name to use as label", path.display());
          continue;
        }
      };
      samples.push(Sample{path, label});
    }
  }
  samples.sort_by(|a, b| a.path.cmp(&b.path));
  info!("{} images found.", samples.len());
  Ok(samples)
}

/// Splits `samples` into `(train, test)` with `ceil(test_size * n)` test
/// samples.
pub fn train_test_split<R: Rng + ?Sized>(samples: Vec<Sample>, test_size: f64, shuffle: bool, stratify: bool, rng: &mut R) -> Result<(Vec<Sample>, Vec<Sample>)> {
  if !(test_size > 0.0 && test_size < 1.0) {
    return Err(Error::InvalidSplit(format!("test_size must be in (0, 1), got {}", test_size)));
  }
  let n_test = (test_size * samples.len() as f64).ceil() as usize;
  split_with_count(samples, n_test, shuffle, stratify, rng)
}

/// Splits into train/test, then draws `val_num` validation samples out of
/// the test set.
pub fn split_samples(samples: Vec<Sample>, options: &SplitOptions) -> Result<DatasetSplit> {
  match options.seed {
    Some(seed) => split_samples_with_rng(samples, options, &mut StdRng::seed_from_u64(seed)),
    None => split_samples_with_rng(samples, options, &mut thread_rng()),
  }
}

pub fn split_samples_with_rng<R: Rng + ?Sized>(samples: Vec<Sample>, options: &SplitOptions, rng: &mut R) -> Result<DatasetSplit> {
  let (train, test) = train_test_split(samples, options.test_size, options.shuffle, options.stratify, rng)?;
  if options.val_num == 0 || options.val_num >= test.len() {
    return Err(Error::InvalidSplit(format!(
        "val_num must be in [1, {}), got {}", test.len(), options.val_num)));
  }
  let (_, valid) = split_with_count(test.clone(), options.val_num, options.shuffle, options.stratify, rng)?;
  debug!("split sizes: train: {} valid: {} test: {}", train.len(), valid.len(), test.len());
  Ok(DatasetSplit{train, valid, test})
}

fn split_with_count<R: Rng + ?Sized>(mut samples: Vec<Sample>, n_test: usize, shuffle: bool, stratify: bool, rng: &mut R) -> Result<(Vec<Sample>, Vec<Sample>)> {
  let n = samples.len();
  if n_test == 0 || n_test >= n {
    return Err(Error::InvalidSplit(format!(
        "{} test samples out of {} leaves an empty side", n_test, n)));
  }

  if !stratify {
    if shuffle {
      samples.shuffle(rng);
    }
    let test = samples.split_off(n - n_test);
    return Ok((samples, test));
  }

  if !shuffle {
    return Err(Error::InvalidSplit("stratified split requires shuffle".to_owned()));
  }

  let mut classes: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
  for sample in samples {
    classes.entry(sample.label.clone()).or_insert_with(Vec::new).push(sample);
  }
  if let Some((label, members)) = classes.iter().find(|&(_, m)| m.len() < 2) {
    return Err(Error::InvalidSplit(format!(
        "class {:?} has {} member(s), at least 2 are required", label, members.len())));
  }
  let n_train = n - n_test;
  if n_test < classes.len() || n_train < classes.len() {
    return Err(Error::InvalidSplit(format!(
        "train ({}) and test ({}) sizes must each be at least the number of classes ({})",
        n_train, n_test, classes.len())));
  }

  let counts: Vec<usize> = classes.values().map(|m| m.len()).collect();
  let allocs = allocate_test_counts(&counts, n_test);

  let mut train = Vec::with_capacity(n_train);
  let mut test = Vec::with_capacity(n_test);
  for (mut members, alloc) in classes.into_values().zip(allocs) {
    members.shuffle(rng);
    let class_test = members.split_off(members.len() - alloc);
    train.extend(members);
    test.extend(class_test);
  }
  train.shuffle(rng);
  test.shuffle(rng);
  Ok((train, test))
}

/// Apportions `n_test` over classes proportionally to `counts`: floors of
/// the exact shares, then one extra for the largest remainders.
fn allocate_test_counts(counts: &[usize], n_test: usize) -> Vec<usize> {
  let n: usize = counts.iter().sum();
  let mut allocs: Vec<usize> = counts.iter().map(|&c| c * n_test / n).collect();
  let assigned: usize = allocs.iter().sum();
  let mut order: Vec<usize> = (0 .. counts.len()).collect();
  order.sort_by(|&a, &b| {
    let rem_a = counts[a] * n_test % n;
    let rem_b = counts[b] * n_test % n;
    rem_b.cmp(&rem_a)
      .then(counts[b].cmp(&counts[a]))
      .then(a.cmp(&b))
  });
  for &idx in order.iter().take(n_test - assigned) {
    allocs[idx] += 1;
  }
  allocs
}
