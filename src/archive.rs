use crate::error::{Error, Result};

use flate2::read::{GzDecoder};
use log::{debug, warn};
use tar::{Archive};
use time::{OffsetDateTime};

use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path};

/// Directory the dataset tarball unpacks into, relative to the output path.
pub const IMAGES_DIR: &str = "images";

/// Empty placeholder folder shipped inside the dataset tarball. It would
/// otherwise show up as a spurious class with no images.
pub const PLACEHOLDER_DIR: &[&str] = &["images", "Train Directory", "Predicted"];

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractOutcome {
  AlreadyExtracted,
  Extracted{entries: usize},
}

/// Unpacks `tar_path` beneath `out_path`, unless `out_path/images` already
/// exists.
pub fn extract_tar<P: AsRef<Path>, Q: AsRef<Path>>(tar_path: P, out_path: Q) -> Result<ExtractOutcome> {
  let tar_path = tar_path.as_ref();
  let out_path = out_path.as_ref();

  if out_path.join(IMAGES_DIR).is_dir() {
    debug!("{} already extracted, skipping", out_path.join(IMAGES_DIR).display());
    return Ok(ExtractOutcome::AlreadyExtracted);
  }
  if !tar_path.is_file() {
    return Err(Error::MissingPath(tar_path.to_owned()));
  }
  fs::create_dir_all(out_path).map_err(|e| Error::io(out_path, e))?;

  let start_time = OffsetDateTime::now_utc();
  let reader = open_archive(tar_path)?;
  let mut archive = Archive::new(reader);
  let mut entries = 0;
  for entry in archive.entries().map_err(|e| Error::io(tar_path, e))? {
    let mut entry = entry.map_err(|e| Error::io(tar_path, e))?;
    let unpacked = entry.unpack_in(out_path).map_err(|e| Error::io(out_path, e))?;
    if !unpacked {
      let entry_path = entry.path().map(|p| p.display().to_string()).unwrap_or_default();
      warn!("skipped archive entry outside of output dir: {}", entry_path);
      continue;
    }
    entries += 1;
  }
  let elapsed = (OffsetDateTime::now_utc() - start_time).as_seconds_f32();
  debug!("extracted {} entries from {} elapsed: {:.3}", entries, tar_path.display(), elapsed);

  remove_placeholder(out_path);

  Ok(ExtractOutcome::Extracted{entries})
}

fn open_archive(tar_path: &Path) -> Result<Box<dyn Read>> {
  let mut file = File::open(tar_path).map_err(|e| Error::io(tar_path, e))?;
  let mut magic = [0u8; 2];
  let is_gzip = match file.read_exact(&mut magic) {
    Ok(_) => magic == GZIP_MAGIC,
    Err(_) => false,
  };
  file.seek(SeekFrom::Start(0)).map_err(|e| Error::io(tar_path, e))?;
  let reader = BufReader::new(file);
  if is_gzip {
    Ok(Box::new(GzDecoder::new(reader)))
  } else {
    Ok(Box::new(reader))
  }
}

fn remove_placeholder(out_path: &Path) {
  let placeholder = PLACEHOLDER_DIR.iter().fold(out_path.to_owned(), |p, c| p.join(c));
  if !placeholder.is_dir() {
    return;
  }
  match fs::remove_dir(&placeholder) {
    Ok(_) => debug!("removed placeholder dir {}", placeholder.display()),
    Err(e) => warn!("could not remove placeholder dir {}: {}", placeholder.display(), e),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use flate2::{Compression};
  use flate2::write::{GzEncoder};
  use tar::{Builder, Header, EntryType};

  fn append_file<W: std::io::Write>(builder: &mut Builder<W>, path: &str, data: &[u8]) {
    let mut header = Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, data).unwrap();
  }

  fn append_dir<W: std::io::Write>(builder: &mut Builder<W>, path: &str) {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Directory);
    header.set_size(0);
    header.set_mode(0o755);
    header.set_cksum();
    builder.append_data(&mut header, path, std::io::empty()).unwrap();
  }

  fn write_dataset_tar(path: &Path, gzip: bool) {
    let file = File::create(path).unwrap();
    if gzip {
      let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
      append_file(&mut builder, "images/Train Directory/cat/a.jpg", b"aaaa");
      append_dir(&mut builder, "images/Train Directory/Predicted");
      builder.into_inner().unwrap().finish().unwrap();
    } else {
      let mut builder = Builder::new(file);
      append_file(&mut builder, "images/Train Directory/cat/a.jpg", b"aaaa");
      append_file(&mut builder, "images/Train Directory/dog/b.jpg", b"bbbb");
      builder.finish().unwrap();
    }
  }

  #[test]
  fn extracts_gzip_and_drops_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let tar_path = dir.path().join("images.tar.gz");
    write_dataset_tar(&tar_path, true);
    let out = dir.path().join("raw");

    let outcome = extract_tar(&tar_path, &out).unwrap();
    assert_eq!(outcome, ExtractOutcome::Extracted{entries: 2});
    assert!(out.join("images/Train Directory/cat/a.jpg").is_file());
    assert!(!out.join("images/Train Directory/Predicted").exists());
  }

  #[test]
  fn extracts_plain_tar() {
    let dir = tempfile::tempdir().unwrap();
    let tar_path = dir.path().join("images.tar");
    write_dataset_tar(&tar_path, false);

    let outcome = extract_tar(&tar_path, dir.path()).unwrap();
    assert_eq!(outcome, ExtractOutcome::Extracted{entries: 2});
    assert_eq!(fs::read(dir.path().join("images/Train Directory/dog/b.jpg")).unwrap(), b"bbbb");
  }

  #[test]
  fn skips_when_already_extracted() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join(IMAGES_DIR)).unwrap();
    let outcome = extract_tar(dir.path().join("missing.tar.gz"), dir.path()).unwrap();
    assert_eq!(outcome, ExtractOutcome::AlreadyExtracted);
  }

  #[test]
  fn missing_archive_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    match extract_tar(dir.path().join("missing.tar.gz"), dir.path().join("out")) {
      Err(Error::MissingPath(p)) => assert!(p.ends_with("missing.tar.gz")),
      other => panic!("unexpected: {:?}", other),
    }
  }

  #[test]
  fn skips_entries_escaping_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let tar_path = dir.path().join("images.tar");
    {
      let mut builder = Builder::new(File::create(&tar_path).unwrap());
      append_file(&mut builder, "images/cat/a.jpg", b"aaaa");
      // `append_data` refuses `..`, so the name is written into the header directly.
      let data = b"evil";
      let mut header = Header::new_gnu();
      let name = b"../escape.jpg";
      header.as_gnu_mut().unwrap().name[.. name.len()].copy_from_slice(name);
      header.set_size(data.len() as u64);
      header.set_mode(0o644);
      header.set_cksum();
      builder.append(&header, &data[..]).unwrap();
      builder.finish().unwrap();
    }
    let out = dir.path().join("out");

    let outcome = extract_tar(&tar_path, &out).unwrap();
    assert_eq!(outcome, ExtractOutcome::Extracted{entries: 1});
    assert!(out.join("images/cat/a.jpg").is_file());
    assert!(!dir.path().join("escape.jpg").exists());
    assert!(!out.join("escape.jpg").exists());
  }
}
