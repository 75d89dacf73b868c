//! Item-set change tracking.
//!
//! The first time a configuration is seen its item hash becomes the baseline
//! without marking a change. After that, any difference in the hash records
//! the current time as the moment the set changed, and the concrete additions
//! and removals are kept in memory for diagnostics.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::state::CheckState;
use crate::persistence::{StateError, StateStore};
use crate::project::{ItemChange, ItemChangeKind, ProjectConfiguration};
use crate::util::hash::hash_item_set;

pub(crate) type DeclaredItems = BTreeSet<(String, PathBuf)>;

#[derive(Debug, Default)]
pub(crate) struct ItemSetTracker {
  previous: HashMap<ProjectConfiguration, DeclaredItems>,
  changes: HashMap<ProjectConfiguration, Vec<ItemChange>>,
}

impl ItemSetTracker {
  /// Compare the configuration's declared items with what was stored last.
  pub fn observe(
    &mut self,
    store: &StateStore,
    project_path: &Path,
    state: &CheckState,
    now: DateTime<Utc>,
  ) -> Result<(), StateError> {
    let configuration = &state.configuration;
    let items = state.declared_items();
    let hash = hash_item_set(items.iter().map(|(item_type, path)| (item_type.as_str(), path.as_path())));

    let stored = store
      .restore_state(project_path, configuration)?
      .and_then(|record| record.item_hash);
    match stored {
      None => {
        debug!(
          project = %project_path.display(),
          configuration = %configuration,
          hash = %hash,
          "recording baseline item set"
        );
        store.store_item_state(project_path, configuration, hash, None)?;
      }
      Some(stored) if stored == hash => {}
      Some(_) => {
        let changes = self
          .previous
          .get(configuration)
          .map(|previous| diff_items(previous, &items))
          .unwrap_or_default();
        info!(
          project = %project_path.display(),
          configuration = %configuration,
          changes = changes.len(),
          "project item set changed"
        );
        store.store_item_state(project_path, configuration, hash, Some(now))?;
        self.changes.insert(configuration.clone(), changes);
      }
    }

    self.previous.insert(configuration.clone(), items);
    Ok(())
  }

  /// Changes observed in this process for `configuration`, newest first seen.
  pub fn changes(&self, configuration: &ProjectConfiguration) -> &[ItemChange] {
    self.changes.get(configuration).map(Vec::as_slice).unwrap_or_default()
  }
}

/// Additions then removals between two declared item sets.
pub(crate) fn diff_items(previous: &DeclaredItems, current: &DeclaredItems) -> Vec<ItemChange> {
  let added = current.difference(previous).map(|(item_type, path)| ItemChange {
    kind: ItemChangeKind::Added,
    item_type: item_type.clone(),
    path: path.clone(),
  });
  let removed = previous.difference(current).map(|(item_type, path)| ItemChange {
    kind: ItemChangeKind::Removed,
    item_type: item_type.clone(),
    path: path.clone(),
  });
  added.chain(removed).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::project::{ConfiguredInput, InputItem};
  use crate::util::testutil::at;
  use tempfile::TempDir;

  fn state_with(items: &[&str]) -> CheckState {
    let mut input = ConfiguredInput::default();
    input.input_items_by_type.insert(
      "Compile".to_string(),
      items.iter().map(|path| InputItem::required(*path)).collect(),
    );
    CheckState::new(Path::new("/repo/app/app.proj"), &ProjectConfiguration::default(), &input)
  }

  #[test]
  fn first_observation_is_a_baseline() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path());
    let project = Path::new("/repo/app/app.proj");
    let mut tracker = ItemSetTracker::default();

    tracker.observe(&store, project, &state_with(&["a.cs"]), at(100)).unwrap();

    let record = store.restore_state(project, &ProjectConfiguration::default()).unwrap().unwrap();
    assert!(record.item_hash.is_some());
    assert_eq!(record.items_changed_at, None);
  }

  #[test]
  fn unchanged_items_keep_the_recorded_time() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path());
    let project = Path::new("/repo/app/app.proj");
    let mut tracker = ItemSetTracker::default();

    tracker.observe(&store, project, &state_with(&["a.cs"]), at(100)).unwrap();
    tracker.observe(&store, project, &state_with(&["a.cs"]), at(200)).unwrap();

    let record = store.restore_state(project, &ProjectConfiguration::default()).unwrap().unwrap();
    assert_eq!(record.items_changed_at, None);
  }

  #[test]
  fn changed_items_record_time_and_differences() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path());
    let project = Path::new("/repo/app/app.proj");
    let configuration = ProjectConfiguration::default();
    let mut tracker = ItemSetTracker::default();

    tracker.observe(&store, project, &state_with(&["a.cs", "b.cs"]), at(100)).unwrap();
    tracker.observe(&store, project, &state_with(&["a.cs", "c.cs"]), at(200)).unwrap();

    let record = store.restore_state(project, &configuration).unwrap().unwrap();
    assert_eq!(record.items_changed_at, Some(at(200)));

    let changes = tracker.changes(&configuration);
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].kind, ItemChangeKind::Added);
    assert!(changes[0].path.ends_with("c.cs"));
    assert_eq!(changes[1].kind, ItemChangeKind::Removed);
    assert!(changes[1].path.ends_with("b.cs"));
  }

  #[test]
  fn a_fresh_tracker_reports_no_concrete_changes() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path());
    let project = Path::new("/repo/app/app.proj");
    let configuration = ProjectConfiguration::default();

    ItemSetTracker::default()
      .observe(&store, project, &state_with(&["a.cs"]), at(100))
      .unwrap();
    let mut restarted = ItemSetTracker::default();
    restarted.observe(&store, project, &state_with(&["b.cs"]), at(200)).unwrap();

    let record = store.restore_state(project, &configuration).unwrap().unwrap();
    assert_eq!(record.items_changed_at, Some(at(200)));
    assert!(restarted.changes(&configuration).is_empty());
  }
}
