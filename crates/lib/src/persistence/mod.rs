//! Durable per-configuration check state.
//!
//! For every (project, configuration) pair the store remembers the hash of the
//! declared item set, when that set last changed, and when the last
//! successful build started. The absence of a build start is what makes a
//! check report `FirstRun`.
//!
//! # Storage Layout
//!
//! ```text
//! {state_dir}/
//! ├── .lock          # advisory lock, shared for loads, exclusive for flushes
//! └── state.json     # StateFile
//! ```
//!
//! The file is read lazily on first access and written back only by
//! [`StateStore::flush`], and only when something changed.

pub mod lock;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::project::ProjectConfiguration;
use crate::util::hash::ItemSetHash;
use crate::util::paths::PathKey;
use lock::{LockMode, StateLock, StateLockError};

/// State file name within the state directory.
const STATE_FILENAME: &str = "state.json";

/// Current state file format version.
pub const STATE_FILE_VERSION: u32 = 1;

/// What is remembered about one configuration of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
  pub project_path: PathBuf,
  pub dimensions: BTreeMap<String, String>,
  #[serde(default)]
  pub item_hash: Option<ItemSetHash>,
  #[serde(default)]
  pub items_changed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub last_successful_build_start: Option<DateTime<Utc>>,
}

impl StateRecord {
  fn new(project_path: &Path, configuration: &ProjectConfiguration) -> Self {
    Self {
      project_path: project_path.to_path_buf(),
      dimensions: configuration.dimensions.clone(),
      item_hash: None,
      items_changed_at: None,
      last_successful_build_start: None,
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
  version: u32,
  records: Vec<StateRecord>,
}

#[derive(Debug, Error)]
pub enum StateError {
  #[error("failed to read state file: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write state file: {0}")]
  Write(#[source] io::Error),

  #[error("failed to parse state file: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize state: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported state file version {0}")]
  UnsupportedVersion(u32),

  #[error(transparent)]
  Lock(#[from] StateLockError),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StateKey {
  project: PathKey,
  configuration: ProjectConfiguration,
}

impl StateKey {
  fn new(project_path: &Path, configuration: &ProjectConfiguration) -> Self {
    Self {
      project: PathKey::new(project_path),
      configuration: configuration.clone(),
    }
  }
}

#[derive(Default)]
struct Index {
  loaded: bool,
  dirty: bool,
  records: HashMap<StateKey, StateRecord>,
}

/// Lazily loaded, explicitly flushed store of [`StateRecord`]s.
pub struct StateStore {
  base_path: PathBuf,
  index: Mutex<Index>,
}

impl StateStore {
  /// Create a store rooted at `base_path`. Nothing is read until first use.
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
      index: Mutex::new(Index::default()),
    }
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  fn state_path(&self) -> PathBuf {
    self.base_path.join(STATE_FILENAME)
  }

  /// Lock the index, loading it from disk on first use.
  fn index(&self) -> Result<MutexGuard<'_, Index>, StateError> {
    let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
    if !index.loaded {
      index.records = self.read_records()?;
      index.loaded = true;
    }
    Ok(index)
  }

  fn read_records(&self) -> Result<HashMap<StateKey, StateRecord>, StateError> {
    let path = self.state_path();
    if !path.exists() {
      debug!(path = %path.display(), "no state file, starting empty");
      return Ok(HashMap::new());
    }

    let content = {
      let _lock = StateLock::acquire(&self.base_path, LockMode::Shared)?;
      match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(StateError::Read(e)),
      }
    };

    let file: StateFile = serde_json::from_str(&content).map_err(StateError::Parse)?;
    if file.version != STATE_FILE_VERSION {
      return Err(StateError::UnsupportedVersion(file.version));
    }

    info!(path = %path.display(), records = file.records.len(), "loaded check state");
    Ok(
      file
        .records
        .into_iter()
        .map(|record| {
          let key = StateKey {
            project: PathKey::new(&record.project_path),
            configuration: ProjectConfiguration {
              dimensions: record.dimensions.clone(),
            },
          };
          (key, record)
        })
        .collect(),
    )
  }

  /// The record for a configuration, if one was ever stored.
  pub fn restore_state(
    &self,
    project_path: &Path,
    configuration: &ProjectConfiguration,
  ) -> Result<Option<StateRecord>, StateError> {
    let index = self.index()?;
    Ok(index.records.get(&StateKey::new(project_path, configuration)).cloned())
  }

  /// Record the item-set hash. `items_changed_at` is only overwritten when given.
  pub fn store_item_state(
    &self,
    project_path: &Path,
    configuration: &ProjectConfiguration,
    item_hash: ItemSetHash,
    items_changed_at: Option<DateTime<Utc>>,
  ) -> Result<(), StateError> {
    let mut index = self.index()?;
    let record = index
      .records
      .entry(StateKey::new(project_path, configuration))
      .or_insert_with(|| StateRecord::new(project_path, configuration));
    record.item_hash = Some(item_hash);
    if items_changed_at.is_some() {
      record.items_changed_at = items_changed_at;
    }
    index.dirty = true;
    Ok(())
  }

  pub fn store_last_successful_build_start(
    &self,
    project_path: &Path,
    configuration: &ProjectConfiguration,
    started_at: DateTime<Utc>,
  ) -> Result<(), StateError> {
    let mut index = self.index()?;
    index
      .records
      .entry(StateKey::new(project_path, configuration))
      .or_insert_with(|| StateRecord::new(project_path, configuration))
      .last_successful_build_start = Some(started_at);
    index.dirty = true;
    Ok(())
  }

  /// All records, ordered by project path and dimensions.
  pub fn records(&self) -> Result<Vec<StateRecord>, StateError> {
    let index = self.index()?;
    let mut records: Vec<StateRecord> = index.records.values().cloned().collect();
    records.sort_by(|a, b| (&a.project_path, &a.dimensions).cmp(&(&b.project_path, &b.dimensions)));
    Ok(records)
  }

  /// Drop records whose last successful build started before `cutoff`,
  /// or that never recorded one. Returns how many were removed.
  pub fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StateError> {
    let mut index = self.index()?;
    let before = index.records.len();
    index
      .records
      .retain(|_, record| record.last_successful_build_start.is_some_and(|start| start >= cutoff));
    let removed = before - index.records.len();
    if removed > 0 {
      index.dirty = true;
    }
    Ok(removed)
  }

  /// Drop every record. Returns how many were removed.
  pub fn clear(&self) -> Result<usize, StateError> {
    let mut index = self.index()?;
    let removed = index.records.len();
    index.records.clear();
    index.dirty = true;
    Ok(removed)
  }

  pub fn is_dirty(&self) -> bool {
    self.index.lock().unwrap_or_else(PoisonError::into_inner).dirty
  }

  /// Write the index back to disk if it changed. Returns whether it wrote.
  ///
  /// Uses atomic write (write to temp, then rename) to prevent corruption.
  pub fn flush(&self) -> Result<bool, StateError> {
    let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
    if !index.dirty {
      return Ok(false);
    }

    let mut records: Vec<StateRecord> = index.records.values().cloned().collect();
    records.sort_by(|a, b| (&a.project_path, &a.dimensions).cmp(&(&b.project_path, &b.dimensions)));
    let file = StateFile {
      version: STATE_FILE_VERSION,
      records,
    };
    let content = serde_json::to_string_pretty(&file).map_err(StateError::Serialize)?;

    let _lock = StateLock::acquire(&self.base_path, LockMode::Exclusive)?;
    let mut temp = NamedTempFile::new_in(&self.base_path).map_err(StateError::Write)?;
    temp.write_all(content.as_bytes()).map_err(StateError::Write)?;
    temp.persist(self.state_path()).map_err(|e| StateError::Write(e.error))?;

    index.dirty = false;
    info!(path = %self.state_path().display(), records = file.records.len(), "saved check state");
    Ok(true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::hash::hash_item_set;
  use crate::util::testutil::at;
  use tempfile::TempDir;

  fn debug_net8() -> ProjectConfiguration {
    ProjectConfiguration::new([("Configuration", "Debug"), ("TargetFramework", "net8.0")])
  }

  #[test]
  fn missing_file_means_no_records() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path());
    assert_eq!(store.restore_state(Path::new("/p/p.proj"), &debug_net8()).unwrap(), None);
    assert!(!store.is_dirty());
  }

  #[test]
  fn records_survive_a_flush_and_reload() {
    let temp = TempDir::new().unwrap();
    let project = Path::new("/repo/App/App.proj");
    let hash = hash_item_set([("Compile", Path::new("a.cs"))]);

    let store = StateStore::new(temp.path());
    store.store_item_state(project, &debug_net8(), hash.clone(), Some(at(80))).unwrap();
    store.store_last_successful_build_start(project, &debug_net8(), at(90)).unwrap();
    assert!(store.flush().unwrap());
    assert!(!store.flush().unwrap());

    let reloaded = StateStore::new(temp.path());
    let reversed = ProjectConfiguration::new([("TargetFramework", "net8.0"), ("Configuration", "Debug")]);
    let record = reloaded.restore_state(project, &reversed).unwrap().unwrap();
    assert_eq!(record.item_hash, Some(hash));
    assert_eq!(record.items_changed_at, Some(at(80)));
    assert_eq!(record.last_successful_build_start, Some(at(90)));
  }

  #[test]
  fn project_paths_are_normalized() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path());
    store
      .store_last_successful_build_start(Path::new("/repo/App/../App/App.proj"), &debug_net8(), at(90))
      .unwrap();
    assert!(store.restore_state(Path::new("/repo/App/App.proj"), &debug_net8()).unwrap().is_some());
  }

  #[test]
  fn item_state_keeps_change_time_when_not_given() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path());
    let project = Path::new("/p/p.proj");
    store
      .store_item_state(project, &debug_net8(), ItemSetHash("a".into()), Some(at(50)))
      .unwrap();
    store.store_item_state(project, &debug_net8(), ItemSetHash("b".into()), None).unwrap();
    let record = store.restore_state(project, &debug_net8()).unwrap().unwrap();
    assert_eq!(record.item_hash, Some(ItemSetHash("b".into())));
    assert_eq!(record.items_changed_at, Some(at(50)));
  }

  #[test]
  fn rejects_unknown_versions() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(STATE_FILENAME), r#"{ "version": 99, "records": [] }"#).unwrap();
    let store = StateStore::new(temp.path());
    let result = store.restore_state(Path::new("/p/p.proj"), &debug_net8());
    assert!(matches!(result, Err(StateError::UnsupportedVersion(99))));
  }

  #[test]
  fn rejects_corrupt_files() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(STATE_FILENAME), "{ not json").unwrap();
    let store = StateStore::new(temp.path());
    assert!(matches!(store.records(), Err(StateError::Parse(_))));
  }

  #[test]
  fn prunes_old_and_never_built_records() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path());
    let config = debug_net8();
    store.store_last_successful_build_start(Path::new("/old/old.proj"), &config, at(10)).unwrap();
    store.store_last_successful_build_start(Path::new("/new/new.proj"), &config, at(500)).unwrap();
    store
      .store_item_state(Path::new("/never/never.proj"), &config, ItemSetHash("x".into()), None)
      .unwrap();

    assert_eq!(store.remove_older_than(at(100)).unwrap(), 2);
    let remaining: Vec<_> = store.records().unwrap().into_iter().map(|r| r.project_path).collect();
    assert_eq!(remaining, vec![PathBuf::from("/new/new.proj")]);
  }

  #[test]
  fn clear_removes_everything() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path());
    store
      .store_last_successful_build_start(Path::new("/p/p.proj"), &debug_net8(), at(10))
      .unwrap();
    assert_eq!(store.clear().unwrap(), 1);
    assert!(store.records().unwrap().is_empty());
    assert!(store.is_dirty());
  }
}
