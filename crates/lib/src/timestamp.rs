//! Memoized modification-time lookups.
//!
//! A [`TimestampCache`] lives for exactly one check: the same path always
//! yields the same answer within that check, and the cache is dropped when the
//! check finishes. Copy-item sources are additionally memoized across the
//! projects of a solution build through a [`SharedTimestampCache`], which is
//! invalidated per project when that project is rebuilt.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::fs::FileSystem;
use crate::util::paths::PathKey;

fn query(fs: &dyn FileSystem, path: &Path) -> Option<DateTime<Utc>> {
  match fs.last_write_time_utc(path) {
    Ok(timestamp) => timestamp,
    Err(e) => {
      // Unreadable is treated as missing so the check errs towards rebuilding.
      debug!(path = %path.display(), error = %e, "failed to read file timestamp");
      None
    }
  }
}

/// Check-scoped timestamp cache.
pub struct TimestampCache {
  fs: Arc<dyn FileSystem>,
  shared: Option<Arc<SharedTimestampCache>>,
  entries: HashMap<PathKey, Option<DateTime<Utc>>>,
  hits: usize,
  misses: usize,
}

impl TimestampCache {
  pub fn new(fs: Arc<dyn FileSystem>) -> Self {
    Self {
      fs,
      shared: None,
      entries: HashMap::new(),
      hits: 0,
      misses: 0,
    }
  }

  /// Route copy-source lookups through a solution-wide cache.
  pub fn with_shared(mut self, shared: Option<Arc<SharedTimestampCache>>) -> Self {
    self.shared = shared;
    self
  }

  /// Last write time of `path`, or `None` if it is absent or unreadable.
  pub fn get_timestamp_utc(&mut self, path: &Path) -> Option<DateTime<Utc>> {
    let key = PathKey::new(path);
    if let Some(cached) = self.entries.get(&key) {
      self.hits += 1;
      return *cached;
    }
    self.misses += 1;
    let timestamp = query(self.fs.as_ref(), path);
    self.entries.insert(key, timestamp);
    timestamp
  }

  /// Last write time of a copy-item source.
  ///
  /// Uses the shared cache when one is attached, otherwise behaves like
  /// [`get_timestamp_utc`](Self::get_timestamp_utc).
  pub fn get_source_timestamp_utc(&mut self, path: &Path) -> Option<DateTime<Utc>> {
    match &self.shared {
      Some(shared) => {
        let timestamp = shared.get_or_query(self.fs.as_ref(), path);
        self.entries.insert(PathKey::new(path), timestamp);
        timestamp
      }
      None => self.get_timestamp_utc(path),
    }
  }

  pub fn hits(&self) -> usize {
    self.hits
  }

  pub fn misses(&self) -> usize {
    self.misses
  }
}

/// Solution-wide cache of copy-item source timestamps.
#[derive(Default)]
pub struct SharedTimestampCache {
  entries: Mutex<HashMap<PathKey, Option<DateTime<Utc>>>>,
}

impl SharedTimestampCache {
  pub fn new() -> Self {
    Self::default()
  }

  fn get_or_query(&self, fs: &dyn FileSystem, path: &Path) -> Option<DateTime<Utc>> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    *entries
      .entry(PathKey::new(path))
      .or_insert_with(|| query(fs, path))
  }

  /// Forget the given paths. Returns how many cached entries were dropped.
  pub fn invalidate<'a, I>(&self, paths: I) -> usize
  where
    I: IntoIterator<Item = &'a Path>,
  {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    paths
      .into_iter()
      .filter(|path| entries.remove(&PathKey::new(path)).is_some())
      .count()
  }

  pub fn clear(&self) {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
  }

  pub(crate) fn len(&self) -> usize {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fs::RealFileSystem;
  use crate::util::testutil::{at, touch};
  use tempfile::TempDir;

  #[test]
  fn memoizes_within_a_check() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.cs");
    touch(&path, 100);

    let mut cache = TimestampCache::new(Arc::new(RealFileSystem));
    assert_eq!(cache.get_timestamp_utc(&path), Some(at(100)));

    // A later change on disk is not observed by the same cache.
    touch(&path, 200);
    assert_eq!(cache.get_timestamp_utc(&path), Some(at(100)));
    assert_eq!(cache.hits(), 1);
    assert_eq!(cache.misses(), 1);
  }

  #[test]
  fn missing_files_are_cached_as_absent() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("missing.cs");
    let mut cache = TimestampCache::new(Arc::new(RealFileSystem));
    assert_eq!(cache.get_timestamp_utc(&path), None);
    touch(&path, 100);
    assert_eq!(cache.get_timestamp_utc(&path), None);
  }

  #[test]
  fn shared_cache_survives_checks_until_invalidated() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("lib.dll");
    touch(&path, 100);
    let shared = Arc::new(SharedTimestampCache::new());

    let mut first = TimestampCache::new(Arc::new(RealFileSystem)).with_shared(Some(shared.clone()));
    assert_eq!(first.get_source_timestamp_utc(&path), Some(at(100)));

    touch(&path, 200);
    let mut second = TimestampCache::new(Arc::new(RealFileSystem)).with_shared(Some(shared.clone()));
    assert_eq!(second.get_source_timestamp_utc(&path), Some(at(100)));

    assert_eq!(shared.invalidate([path.as_path()]), 1);
    let mut third = TimestampCache::new(Arc::new(RealFileSystem)).with_shared(Some(shared.clone()));
    assert_eq!(third.get_source_timestamp_utc(&path), Some(at(200)));
  }
}
