//! Cross-project copy-item graph.
//!
//! Each project configuration registers the files it contributes to the
//! output directories of its consumers, plus the target paths it references.
//! Resolving a project's copy set is a breadth-first walk over those
//! registrations. Registration and traversal share a single mutex, so a walk
//! always sees a consistent graph.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::types::{CopyItemsResult, ProjectCopyData};
use crate::util::paths::PathKey;

/// Process-wide registry of [`ProjectCopyData`], keyed by target path.
#[derive(Default)]
pub struct CopyItemAggregator {
  projects: Mutex<HashMap<PathKey, Arc<ProjectCopyData>>>,
}

impl CopyItemAggregator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register or replace the data for one configuration.
  ///
  /// Entries are never removed; nodes nobody references any longer are simply
  /// not reached by traversals.
  pub fn set_project_data(&self, data: ProjectCopyData) {
    let key = PathKey::new(&data.target_path);
    debug!(
      target_path = %data.target_path.display(),
      copy_items = data.copy_items.len(),
      references = data.referenced_project_target_paths.len(),
      "registering project copy data"
    );
    let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
    projects.insert(key, Arc::new(data));
  }

  /// Number of registered target paths.
  pub fn len(&self) -> usize {
    self.projects.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Resolve the copy items reachable from `target_path`, including its own.
  pub fn try_gather_copy_items_for_project(&self, target_path: &Path) -> CopyItemsResult {
    let projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);

    let root = PathKey::new(target_path);
    let mut visited: HashSet<PathKey> = HashSet::new();
    let mut queue: VecDeque<(PathKey, PathBuf)> = VecDeque::new();
    visited.insert(root.clone());
    queue.push_back((root.clone(), target_path.to_path_buf()));

    let mut result = CopyItemsResult {
      is_complete: true,
      ..CopyItemsResult::default()
    };
    // Relative target path -> contributing target paths.
    let mut contributors: BTreeMap<PathKey, (PathBuf, BTreeSet<PathKey>)> = BTreeMap::new();

    while let Some((key, path)) = queue.pop_front() {
      let Some(data) = projects.get(&key) else {
        debug!(target_path = %path.display(), "no copy data registered for referenced project");
        result.is_complete = false;
        continue;
      };

      for reference in &data.referenced_project_target_paths {
        let reference_key = PathKey::new(reference);
        if visited.insert(reference_key.clone()) {
          queue.push_back((reference_key, reference.clone()));
        }
      }

      if key != root && !data.produces_reference_assembly {
        result
          .references_without_reference_assembly
          .push(data.project_full_path.clone());
      }

      if !data.copy_items.is_empty() {
        for item in &data.copy_items {
          contributors
            .entry(PathKey::new(&item.relative_target_path))
            .or_insert_with(|| (item.relative_target_path.clone(), BTreeSet::new()))
            .1
            .insert(key.clone());
        }
        result
          .items_by_project
          .push((data.project_full_path.clone(), data.copy_items.clone()));
      }
    }

    result.duplicate_target_paths = contributors
      .into_values()
      .filter(|(_, projects)| projects.len() > 1)
      .map(|(path, _)| path)
      .collect();

    result
  }
}
