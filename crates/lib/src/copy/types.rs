use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::paths::make_rooted;

/// When a copy item's destination is considered stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyType {
  /// Stale unless timestamp and size both match the source.
  Always,
  /// Stale only when older than the source.
  PreserveNewest,
}

/// One file a project places in the output directory of every project that
/// (transitively) references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyItem {
  pub source_path: PathBuf,
  pub relative_target_path: PathBuf,
  pub copy_type: CopyType,
  #[serde(default)]
  pub is_acceleration_only: bool,
}

/// One configuration's contribution to the copy-item graph.
///
/// `target_path` identifies the configuration's build output and is the
/// graph's node key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectCopyData {
  #[serde(default)]
  pub project_full_path: PathBuf,
  pub target_path: PathBuf,
  #[serde(default)]
  pub produces_reference_assembly: bool,
  #[serde(default)]
  pub copy_items: Vec<CopyItem>,
  #[serde(default)]
  pub referenced_project_target_paths: Vec<PathBuf>,
}

impl ProjectCopyData {
  /// Resolve every path against the owning project's location.
  ///
  /// An empty `project_full_path` is filled in from `project_path`.
  /// Relative target paths stay relative to the consumer's output directory.
  pub fn rooted(&self, project_path: &Path) -> Self {
    let project_dir = project_path.parent().unwrap_or(Path::new(""));
    let project_full_path = if self.project_full_path.as_os_str().is_empty() {
      project_path.to_path_buf()
    } else {
      make_rooted(project_dir, &self.project_full_path)
    };
    Self {
      project_full_path,
      target_path: make_rooted(project_dir, &self.target_path),
      produces_reference_assembly: self.produces_reference_assembly,
      copy_items: self
        .copy_items
        .iter()
        .map(|item| CopyItem {
          source_path: make_rooted(project_dir, &item.source_path),
          relative_target_path: item.relative_target_path.clone(),
          copy_type: item.copy_type,
          is_acceleration_only: item.is_acceleration_only,
        })
        .collect(),
      referenced_project_target_paths: self
        .referenced_project_target_paths
        .iter()
        .map(|path| make_rooted(project_dir, path))
        .collect(),
    }
  }
}

/// Result of resolving the transitive copy items of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyItemsResult {
  /// Copy items per contributing project, in breadth-first traversal order.
  pub items_by_project: Vec<(PathBuf, Vec<CopyItem>)>,
  /// False if any reachable target path had no registered data.
  pub is_complete: bool,
  /// Reachable projects (other than the root) that do not produce a reference assembly.
  pub references_without_reference_assembly: Vec<PathBuf>,
  /// Relative target paths contributed by more than one project.
  pub duplicate_target_paths: Vec<PathBuf>,
}

impl CopyItemsResult {
  /// Result for a configuration that takes part in no copy graph.
  pub fn empty() -> Self {
    Self {
      is_complete: true,
      ..Self::default()
    }
  }

  pub fn item_count(&self) -> usize {
    self.items_by_project.iter().map(|(_, items)| items.len()).sum()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn copy_item_deserializes_with_defaults() {
    let item: CopyItem = serde_json::from_str(
      r#"{ "source_path": "bin/a.dll", "relative_target_path": "a.dll", "copy_type": "preserve_newest" }"#,
    )
    .unwrap();
    assert_eq!(item.copy_type, CopyType::PreserveNewest);
    assert!(!item.is_acceleration_only);
  }

  #[cfg(unix)]
  #[test]
  fn rooted_resolves_against_project_directory() {
    let data = ProjectCopyData {
      project_full_path: PathBuf::new(),
      target_path: PathBuf::from("bin/a.dll"),
      produces_reference_assembly: true,
      copy_items: vec![CopyItem {
        source_path: PathBuf::from("bin/a.dll"),
        relative_target_path: PathBuf::from("a.dll"),
        copy_type: CopyType::Always,
        is_acceleration_only: false,
      }],
      referenced_project_target_paths: vec![PathBuf::from("../B/bin/b.dll")],
    };

    let rooted = data.rooted(Path::new("/repo/A/A.proj"));

    assert_eq!(rooted.project_full_path, PathBuf::from("/repo/A/A.proj"));
    assert_eq!(rooted.target_path, PathBuf::from("/repo/A/bin/a.dll"));
    assert_eq!(rooted.copy_items[0].source_path, PathBuf::from("/repo/A/bin/a.dll"));
    assert_eq!(rooted.copy_items[0].relative_target_path, PathBuf::from("a.dll"));
    assert_eq!(rooted.referenced_project_target_paths, vec![PathBuf::from("/repo/B/bin/b.dll")]);
  }
}
