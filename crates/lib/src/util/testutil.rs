//! Test utilities for upcheck-lib.
//!
//! Helpers for laying out project trees on disk with pinned modification
//! times, so timestamp comparisons in tests are deterministic.

use std::path::Path;

use chrono::{DateTime, Utc};
use filetime::FileTime;

/// A UTC timestamp `secs` seconds after the Unix epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
  DateTime::from_timestamp(secs, 0).unwrap()
}

/// Create `path` (and its parents) if needed and set its modification time.
pub fn touch(path: &Path, secs: i64) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  if !path.exists() {
    std::fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
  }
  filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
}

/// Write `content` to `path` and set its modification time.
pub fn write_at(path: &Path, content: &[u8], secs: i64) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
  filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
}
