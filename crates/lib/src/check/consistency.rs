//! Cross-configuration consistency.
//!
//! All configurations of a project must agree on the project file, and no two
//! may write to the same target path or intermediate output path. A violation
//! does not fail the check, but it makes copy acceleration unsafe.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::state::CheckState;
use crate::util::paths::PathKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyFault {
  DivergentProjectPath {
    first: PathBuf,
    second: PathBuf,
  },
  DuplicateTargetPath {
    path: PathBuf,
    configurations: Vec<String>,
  },
  DuplicateIntermediateOutputPath {
    path: PathBuf,
    configurations: Vec<String>,
  },
}

impl fmt::Display for ConsistencyFault {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::DivergentProjectPath { first, second } => write!(
        f,
        "configurations disagree on the project file: '{}' and '{}'",
        first.display(),
        second.display()
      ),
      Self::DuplicateTargetPath { path, configurations } => write!(
        f,
        "configurations {} share target path '{}'",
        configurations.join(", "),
        path.display()
      ),
      Self::DuplicateIntermediateOutputPath { path, configurations } => write!(
        f,
        "configurations {} share intermediate output path '{}'",
        configurations.join(", "),
        path.display()
      ),
    }
  }
}

fn shared_paths<'a, F>(states: &'a [CheckState], select: F) -> Vec<(PathBuf, Vec<String>)>
where
  F: Fn(&'a CheckState) -> Option<&'a PathBuf>,
{
  let mut by_path: BTreeMap<PathKey, (PathBuf, Vec<String>)> = BTreeMap::new();
  for state in states {
    if let Some(path) = select(state) {
      by_path
        .entry(PathKey::new(path))
        .or_insert_with(|| (path.clone(), Vec::new()))
        .1
        .push(state.configuration.to_string());
    }
  }
  by_path
    .into_values()
    .filter(|(_, configurations)| configurations.len() > 1)
    .collect()
}

/// Find every consistency fault among one project's configurations.
pub fn find_consistency_faults(states: &[CheckState]) -> Vec<ConsistencyFault> {
  let mut faults = Vec::new();

  let mut project_paths = states
    .iter()
    .filter_map(|state| state.copy_data.as_ref().map(|data| &data.project_full_path));
  if let Some(first) = project_paths.next() {
    let first_key = PathKey::new(first);
    if let Some(second) = project_paths.find(|path| PathKey::new(path) != first_key) {
      faults.push(ConsistencyFault::DivergentProjectPath {
        first: first.clone(),
        second: second.clone(),
      });
    }
  }

  for (path, configurations) in shared_paths(states, |state| state.copy_data.as_ref().map(|data| &data.target_path)) {
    faults.push(ConsistencyFault::DuplicateTargetPath { path, configurations });
  }
  for (path, configurations) in shared_paths(states, |state| state.intermediate_output_path.as_ref()) {
    faults.push(ConsistencyFault::DuplicateIntermediateOutputPath { path, configurations });
  }

  faults
}
