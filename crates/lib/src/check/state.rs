//! Rooted, immutable view of one configuration for a check.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::consts::DEFAULT_SET;
use crate::copy::ProjectCopyData;
use crate::project::{
  BuildAcceleration, BuiltFromInputFile, ConfiguredInput, InputItem, ItemChange, ItemsByKindBySet,
  ProjectConfiguration,
};
use crate::util::paths::make_rooted;

/// One configuration's inputs, outputs, markers and sets, with every path
/// resolved against the project directory.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckState {
  pub configuration: ProjectConfiguration,
  pub project_path: PathBuf,
  pub is_disabled: bool,
  pub build_acceleration: BuildAcceleration,
  pub acceleration_incompatible_packages: Vec<String>,
  pub newest_import_input: Option<PathBuf>,
  pub input_items_by_type: BTreeMap<String, Vec<InputItem>>,
  pub input_items_by_kind_by_set: ItemsByKindBySet,
  pub output_items_by_kind_by_set: ItemsByKindBySet,
  pub built_items_by_kind_by_set: ItemsByKindBySet,
  pub copy_up_to_date_marker: Option<PathBuf>,
  pub copy_reference_inputs: Vec<PathBuf>,
  pub built_from_input_files: Vec<BuiltFromInputFile>,
  pub last_items_changed_at: Option<DateTime<Utc>>,
  pub last_item_changes: Vec<ItemChange>,
  pub output_dir: Option<PathBuf>,
  pub intermediate_output_path: Option<PathBuf>,
  pub copy_data: Option<ProjectCopyData>,
}

fn root_sets(dir: &Path, sets: &ItemsByKindBySet) -> ItemsByKindBySet {
  sets
    .iter()
    .map(|(set, kinds)| {
      let kinds = kinds
        .iter()
        .map(|(kind, paths)| (kind.clone(), paths.iter().map(|p| make_rooted(dir, p)).collect()))
        .collect();
      (set.clone(), kinds)
    })
    .collect()
}

impl CheckState {
  /// Build the state for `configuration` of the project at `project_path`.
  ///
  /// `project_path` must already be absolute and normalized.
  pub fn new(project_path: &Path, configuration: &ProjectConfiguration, input: &ConfiguredInput) -> Self {
    let dir = project_path.parent().unwrap_or(Path::new(""));
    let root = |path: &PathBuf| make_rooted(dir, path);

    let copy_data = input.copy_data.as_ref().map(|data| data.rooted(project_path));
    let output_dir = input.output_path.as_ref().map(root).or_else(|| {
      copy_data
        .as_ref()
        .and_then(|data| data.target_path.parent().map(Path::to_path_buf))
    });

    Self {
      configuration: configuration.clone(),
      project_path: project_path.to_path_buf(),
      is_disabled: input.is_disabled,
      build_acceleration: input.build_acceleration,
      acceleration_incompatible_packages: input.acceleration_incompatible_packages.clone(),
      newest_import_input: input.newest_import_input.as_ref().map(root),
      input_items_by_type: input
        .input_items_by_type
        .iter()
        .map(|(item_type, items)| {
          let items = items
            .iter()
            .map(|item| InputItem {
              path: root(&item.path),
              required: item.required,
            })
            .collect();
          (item_type.clone(), items)
        })
        .collect(),
      input_items_by_kind_by_set: root_sets(dir, &input.input_items_by_kind_by_set),
      output_items_by_kind_by_set: root_sets(dir, &input.output_items_by_kind_by_set),
      built_items_by_kind_by_set: root_sets(dir, &input.built_items_by_kind_by_set),
      copy_up_to_date_marker: input.copy_up_to_date_marker.as_ref().map(root),
      copy_reference_inputs: input.copy_reference_inputs.iter().map(root).collect(),
      built_from_input_files: input
        .built_from_input_files
        .iter()
        .map(|pair| BuiltFromInputFile {
          destination: root(&pair.destination),
          source: root(&pair.source),
        })
        .collect(),
      last_items_changed_at: input.last_items_changed_at,
      last_item_changes: input.last_item_changes.clone(),
      output_dir,
      intermediate_output_path: input.intermediate_output_path.as_ref().map(root),
      copy_data,
    }
  }

  /// Every set named by any input, output or built item, default set first.
  pub fn set_names(&self) -> Vec<&str> {
    let mut names: BTreeSet<&str> = BTreeSet::new();
    names.insert(DEFAULT_SET);
    for sets in [
      &self.input_items_by_kind_by_set,
      &self.output_items_by_kind_by_set,
      &self.built_items_by_kind_by_set,
    ] {
      names.extend(sets.keys().map(String::as_str));
    }
    names.into_iter().collect()
  }

  /// The declared item set, as `(item type, path)` pairs.
  ///
  /// Explicit check inputs are labelled with their set and kind.
  pub fn declared_items(&self) -> BTreeSet<(String, PathBuf)> {
    let typed = self
      .input_items_by_type
      .iter()
      .flat_map(|(item_type, items)| items.iter().map(move |item| (item_type.clone(), item.path.clone())));
    let explicit = self.input_items_by_kind_by_set.iter().flat_map(|(set, kinds)| {
      kinds.iter().flat_map(move |(kind, paths)| {
        paths
          .iter()
          .map(move |path| (format!("{set}:{kind}"), path.clone()))
      })
    });
    typed.chain(explicit).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::copy::{CopyItem, CopyType};

  fn input() -> ConfiguredInput {
    let mut input = ConfiguredInput::default();
    input
      .input_items_by_type
      .insert("Compile".to_string(), vec![InputItem::required("src/a.cs")]);
    input.output_items_by_kind_by_set.insert(
      String::new(),
      [("Primary".to_string(), vec![PathBuf::from("bin/app.dll")])].into(),
    );
    input.output_items_by_kind_by_set.insert(
      "Docs".to_string(),
      [("Default".to_string(), vec![PathBuf::from("docs/out.html")])].into(),
    );
    input.input_items_by_kind_by_set.insert(
      "Docs".to_string(),
      [("Default".to_string(), vec![PathBuf::from("docs/in.md")])].into(),
    );
    input
  }

  #[cfg(unix)]
  #[test]
  fn roots_every_path() {
    let state = CheckState::new(Path::new("/repo/App/App.proj"), &ProjectConfiguration::default(), &input());
    assert_eq!(
      state.input_items_by_type["Compile"][0].path,
      PathBuf::from("/repo/App/src/a.cs")
    );
    assert_eq!(
      state.output_items_by_kind_by_set[""]["Primary"][0],
      PathBuf::from("/repo/App/bin/app.dll")
    );
  }

  #[test]
  fn default_set_comes_first() {
    let state = CheckState::new(Path::new("/repo/App/App.proj"), &ProjectConfiguration::default(), &input());
    assert_eq!(state.set_names(), vec!["", "Docs"]);
  }

  #[cfg(unix)]
  #[test]
  fn output_dir_falls_back_to_target_directory() {
    let mut input = input();
    input.copy_data = Some(ProjectCopyData {
      target_path: PathBuf::from("bin/Debug/app.dll"),
      copy_items: vec![CopyItem {
        source_path: PathBuf::from("content/x.txt"),
        relative_target_path: PathBuf::from("x.txt"),
        copy_type: CopyType::Always,
        is_acceleration_only: false,
      }],
      ..ProjectCopyData::default()
    });
    let state = CheckState::new(Path::new("/repo/App/App.proj"), &ProjectConfiguration::default(), &input);
    assert_eq!(state.output_dir, Some(PathBuf::from("/repo/App/bin/Debug")));

    input.output_path = Some(PathBuf::from("out"));
    let state = CheckState::new(Path::new("/repo/App/App.proj"), &ProjectConfiguration::default(), &input);
    assert_eq!(state.output_dir, Some(PathBuf::from("/repo/App/out")));
  }

  #[test]
  fn declared_items_include_explicit_inputs() {
    let state = CheckState::new(Path::new("/repo/App/App.proj"), &ProjectConfiguration::default(), &input());
    let types: Vec<String> = state.declared_items().into_iter().map(|(t, _)| t).collect();
    assert_eq!(types, vec!["Compile".to_string(), "Docs:Default".to_string()]);
  }
}
