//! Item collectors for the input/output comparison.
//!
//! Pure functions over a [`CheckState`]; each returns a lazy sequence of the
//! items that take part in one set's comparison.

use std::collections::HashSet;
use std::path::Path;

use super::state::CheckState;
use crate::consts::DEFAULT_SET;
use crate::project::ItemsByKindBySet;

/// An input taking part in a set's comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRef<'a> {
  pub path: &'a Path,
  pub required: bool,
  /// Item type or kind, for diagnostics.
  pub label: &'a str,
}

fn kinds_in_set<'a>(
  sets: &'a ItemsByKindBySet,
  set: &'a str,
  ignore_kinds: &'a HashSet<String>,
) -> impl Iterator<Item = (&'a str, &'a Path)> + 'a {
  sets.get(set).into_iter().flat_map(move |kinds| {
    kinds
      .iter()
      .filter(move |(kind, _)| !ignore_kinds.contains(kind.as_str()))
      .flat_map(|(kind, paths)| paths.iter().map(move |path| (kind.as_str(), path.as_path())))
  })
}

/// Outputs of `set`: its output items followed by its built items.
pub fn outputs_for_set<'a>(
  state: &'a CheckState,
  set: &'a str,
  ignore_kinds: &'a HashSet<String>,
) -> impl Iterator<Item = &'a Path> + 'a {
  kinds_in_set(&state.output_items_by_kind_by_set, set, ignore_kinds)
    .chain(kinds_in_set(&state.built_items_by_kind_by_set, set, ignore_kinds))
    .map(|(_, path)| path)
}

/// Inputs of `set`.
///
/// The default set also includes the project file, the newest import and
/// every typed input item.
pub fn inputs_for_set<'a>(
  state: &'a CheckState,
  set: &'a str,
  ignore_kinds: &'a HashSet<String>,
) -> impl Iterator<Item = InputRef<'a>> + 'a {
  let is_default = set == DEFAULT_SET;

  let project = is_default.then_some(InputRef {
    path: state.project_path.as_path(),
    required: true,
    label: "ProjectFile",
  });
  let import = state
    .newest_import_input
    .as_deref()
    .filter(|_| is_default)
    .map(|path| InputRef {
      path,
      required: true,
      label: "NewestImport",
    });
  let typed = state
    .input_items_by_type
    .iter()
    .filter(move |_| is_default)
    .flat_map(|(item_type, items)| {
      items.iter().map(move |item| InputRef {
        path: item.path.as_path(),
        required: item.required,
        label: item_type.as_str(),
      })
    });
  let explicit = kinds_in_set(&state.input_items_by_kind_by_set, set, ignore_kinds).map(|(kind, path)| InputRef {
    path,
    required: true,
    label: kind,
  });

  project.into_iter().chain(import).chain(typed).chain(explicit)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::project::{ConfiguredInput, InputItem, ProjectConfiguration};
  use std::path::PathBuf;

  fn state() -> CheckState {
    let mut input = ConfiguredInput {
      newest_import_input: Some(PathBuf::from("obj/import.props")),
      ..ConfiguredInput::default()
    };
    input.input_items_by_type.insert(
      "Compile".to_string(),
      vec![InputItem::required("a.cs"), InputItem::optional("gen.cs")],
    );
    input.output_items_by_kind_by_set.insert(
      String::new(),
      [
        ("Primary".to_string(), vec![PathBuf::from("bin/app.dll")]),
        ("Symbols".to_string(), vec![PathBuf::from("bin/app.pdb")]),
      ]
      .into(),
    );
    input.built_items_by_kind_by_set.insert(
      String::new(),
      [("Default".to_string(), vec![PathBuf::from("bin/app.xml")])].into(),
    );
    input.input_items_by_kind_by_set.insert(
      "Docs".to_string(),
      [("Default".to_string(), vec![PathBuf::from("docs/in.md")])].into(),
    );
    CheckState::new(&PathBuf::from("/repo/App/App.proj"), &ProjectConfiguration::default(), &input)
  }

  fn names<'a>(paths: impl Iterator<Item = &'a Path>) -> Vec<String> {
    paths
      .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
      .collect()
  }

  #[test]
  fn default_set_outputs_include_built_items() {
    let state = state();
    let none = HashSet::new();
    assert_eq!(
      names(outputs_for_set(&state, DEFAULT_SET, &none)),
      vec!["app.dll", "app.pdb", "app.xml"]
    );
  }

  #[test]
  fn ignored_kinds_are_excluded() {
    let state = state();
    let ignore: HashSet<String> = ["Symbols".to_string()].into();
    assert_eq!(names(outputs_for_set(&state, DEFAULT_SET, &ignore)), vec!["app.dll", "app.xml"]);
  }

  #[test]
  fn default_set_inputs_start_with_project_and_import() {
    let state = state();
    let none = HashSet::new();
    let inputs: Vec<_> = inputs_for_set(&state, DEFAULT_SET, &none).collect();
    let labels: Vec<&str> = inputs.iter().map(|i| i.label).collect();
    assert_eq!(labels, vec!["ProjectFile", "NewestImport", "Compile", "Compile"]);
    assert!(!inputs[3].required);
  }

  #[test]
  fn named_sets_only_see_their_own_inputs() {
    let state = state();
    let none = HashSet::new();
    let inputs: Vec<_> = inputs_for_set(&state, "Docs", &none).collect();
    assert_eq!(inputs.len(), 1);
    assert!(inputs[0].path.ends_with("docs/in.md"));
    assert_eq!(outputs_for_set(&state, "Docs", &none).count(), 0);
  }
}
