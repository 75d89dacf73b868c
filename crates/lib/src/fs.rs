//! File system access used by the checker.
//!
//! Timestamp and size lookups plus the handful of mutations accelerated copies
//! need sit behind a trait that tests can wrap to inject failures.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use filetime::FileTime;
use tempfile::{Builder, TempPath};

use crate::consts::{SET_ASIDE_SUFFIX, STAGED_COPY_SUFFIX};

/// File system operations needed by timestamp checks and accelerated copies.
pub trait FileSystem: Send + Sync {
  /// Last write time of a regular file, or `None` if it does not exist.
  fn last_write_time_utc(&self, path: &Path) -> io::Result<Option<DateTime<Utc>>>;

  /// Size of a regular file in bytes, or `None` if it does not exist.
  fn file_size_bytes(&self, path: &Path) -> io::Result<Option<u64>>;

  /// Copy `source` to `destination`, carrying over the source's modification time.
  fn copy_file(&self, source: &Path, destination: &Path) -> io::Result<()>;

  fn create_dir_all(&self, path: &Path) -> io::Result<()>;

  fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

  fn remove_file(&self, path: &Path) -> io::Result<()>;

  /// Whether `path` exists and is a directory.
  fn is_dir(&self, path: &Path) -> io::Result<bool>;

  /// Copy `source` into a fresh temporary file beside `destination`.
  ///
  /// The temporary is deleted when the returned guard drops, unless it has
  /// been renamed away first.
  fn stage_copy(&self, source: &Path, destination: &Path) -> io::Result<TempPath> {
    let staged = sibling_temp_path(destination, STAGED_COPY_SUFFIX)?;
    self.copy_file(source, &staged)?;
    Ok(staged)
  }

  /// Move the regular file at `path`, if any, to a temporary beside it.
  ///
  /// Renaming the guard's path back over `path` restores the original.
  fn set_aside(&self, path: &Path) -> io::Result<Option<TempPath>> {
    if self.file_size_bytes(path)?.is_none() {
      return Ok(None);
    }
    let aside = sibling_temp_path(path, SET_ASIDE_SUFFIX)?;
    self.rename(path, &aside)?;
    Ok(Some(aside))
  }
}

/// Reserve a uniquely named, exclusively created file next to `path`.
fn sibling_temp_path(path: &Path, suffix: &str) -> io::Result<TempPath> {
  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  let name = path.file_name().map(|name| name.to_string_lossy()).unwrap_or_default();
  let file = Builder::new()
    .prefix(&format!(".{name}."))
    .suffix(suffix)
    .tempfile_in(dir)?;
  Ok(file.into_temp_path())
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

fn file_metadata(path: &Path) -> io::Result<Option<fs::Metadata>> {
  match fs::metadata(path) {
    Ok(metadata) if metadata.is_file() => Ok(Some(metadata)),
    Ok(_) => Ok(None),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(e),
  }
}

impl FileSystem for RealFileSystem {
  fn last_write_time_utc(&self, path: &Path) -> io::Result<Option<DateTime<Utc>>> {
    match file_metadata(path)? {
      Some(metadata) => Ok(Some(DateTime::<Utc>::from(metadata.modified()?))),
      None => Ok(None),
    }
  }

  fn file_size_bytes(&self, path: &Path) -> io::Result<Option<u64>> {
    Ok(file_metadata(path)?.map(|metadata| metadata.len()))
  }

  fn copy_file(&self, source: &Path, destination: &Path) -> io::Result<()> {
    let metadata = fs::metadata(source)?;
    fs::copy(source, destination)?;
    filetime::set_file_mtime(destination, FileTime::from_last_modification_time(&metadata))
  }

  fn create_dir_all(&self, path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
  }

  fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
  }

  fn remove_file(&self, path: &Path) -> io::Result<()> {
    fs::remove_file(path)
  }

  fn is_dir(&self, path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
      Ok(metadata) => Ok(metadata.is_dir()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(e),
    }
  }
}
