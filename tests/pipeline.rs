use imgclass_preproc::*;

use flate2::{Compression};
use flate2::write::{GzEncoder};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use tar::{Builder, Header};

use std::fs::{self, File};
use std::io::{Cursor};
use std::path::{Path};

fn png_bytes(width: u32, height: u32, shade: u8) -> Vec<u8> {
  let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([shade, shade, shade])));
  let mut buf = Cursor::new(vec![]);
  image.write_to(&mut buf, ImageFormat::Png).unwrap();
  buf.into_inner()
}

fn write_dataset(path: &Path, per_class: usize) {
  let file = File::create(path).unwrap();
  let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
  for (label, shade) in &[("healthy", 40u8), ("diseased", 200u8)] {
    for i in 0 .. per_class {
      let data = png_bytes(30, 20, *shade);
      let mut header = Header::new_gnu();
      header.set_size(data.len() as u64);
      header.set_mode(0o644);
      header.set_cksum();
      let name = format!("images/Train Directory/{}/{}_{}.png", label, label, i);
      builder.append_data(&mut header, name, &data[..]).unwrap();
    }
  }
  builder.into_inner().unwrap().finish().unwrap();
}

fn count_files(dir: &Path) -> usize {
  fs::read_dir(dir).map(|rd| rd.count()).unwrap_or(0)
}

#[test]
fn extract_split_and_crop() {
  let dir = tempfile::tempdir().unwrap();
  let tar_path = dir.path().join("images.tar.gz");
  write_dataset(&tar_path, 10);
  let raw = dir.path().join("raw");
  let processed = dir.path().join("processed");

  let config = DatasetConfig{
    tar_input:  Some(tar_path),
    tar_output: Some(raw.clone()),
    image_dir:  Some(raw.join("images")),
    output_dir: processed.clone(),
    split: SplitOptions{test_size: 0.5, val_num: 4, ..SplitOptions::default()},
    transform: Transform::CenterCrop{size: 16},
    num_workers: 3,
    ..DatasetConfig::default()
  };

  assert_eq!(config.extract_archive().unwrap(), Some(ExtractOutcome::Extracted{entries: 20}));
  let report = config.split_dataset().unwrap().unwrap();
  assert_eq!((report.train, report.valid, report.test), (10, 4, 10));

  for label in &["healthy", "diseased"] {
    assert_eq!(count_files(&processed.join("train").join(label)), 5);
    assert_eq!(count_files(&processed.join("test").join(label)), 5);
    assert_eq!(count_files(&processed.join("valid").join(label)), 2);
  }
  let sample = fs::read_dir(processed.join("test/healthy")).unwrap().next().unwrap().unwrap();
  assert_eq!(image::open(sample.path()).unwrap().dimensions(), (16, 16));
  assert!(processed.join(process::MANIFEST_FILE).is_file());

  // A second run finds the images already extracted.
  assert_eq!(config.extract_archive().unwrap(), Some(ExtractOutcome::AlreadyExtracted));
}

#[test]
fn evaluate_predictions_file() {
  let dir = tempfile::tempdir().unwrap();
  let preds_path = dir.path().join("predictions.csv");
  fs::write(&preds_path, "\
split,label,diseased,healthy
train,healthy,0.1,0.9
train,diseased,0.8,0.2
train,healthy,0.3,0.7
test,diseased,0.4,0.6
test,healthy,0.35,0.65
test,1,0.2,0.8
").unwrap();

  let predictions = read_predictions(&preds_path).unwrap();
  assert_eq!(predictions.classes, vec!["diseased", "healthy"]);
  let report = evaluate(&predictions).unwrap();
  assert_eq!(report.get("train_accuracy"), Some(1.0));
  assert!((report.get("test_accuracy").unwrap() - 2.0 / 3.0).abs() < 1e-12);
  assert_eq!(report.get("test_roc-auc-score"), Some(1.0));

  let metric_path = dir.path().join("reports/metrics.json");
  write_metrics(&report, &metric_path).unwrap();
  let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&metric_path).unwrap()).unwrap();
  let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
  assert_eq!(keys, vec![
    "test_accuracy", "test_f1-score", "test_log-loss", "test_roc-auc-score",
    "train_accuracy", "train_f1-score", "train_log-loss", "train_roc-auc-score",
  ]);
}
