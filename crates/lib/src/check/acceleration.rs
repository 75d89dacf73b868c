//! Build acceleration eligibility.
//!
//! Acceleration lets a check repair stale copy-to-output-directory items by
//! copying them instead of reporting the project out of date. It is only safe
//! when the copy graph is fully known and unambiguous.

use super::log::CheckLog;
use super::state::CheckState;
use crate::copy::CopyItemsResult;
use crate::project::BuildAcceleration;

/// Outcome of the eligibility gate for one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelerationDecision {
  /// The project's own setting.
  pub setting: BuildAcceleration,
  /// Whether copies may be staged for this configuration.
  pub is_active: bool,
}

impl AccelerationDecision {
  pub fn inactive(setting: BuildAcceleration) -> Self {
    Self {
      setting,
      is_active: false,
    }
  }
}

/// Run the eligibility gate, stopping at the first condition that fails.
pub fn evaluate_acceleration(
  state: &CheckState,
  copy_items: &CopyItemsResult,
  enabled_by_default: bool,
  has_consistency_faults: bool,
  log: &mut CheckLog,
) -> AccelerationDecision {
  let setting = state.build_acceleration;
  let decision = gate(state, copy_items, enabled_by_default, has_consistency_faults, log);

  if !copy_items.references_without_reference_assembly.is_empty() {
    log.info("These referenced projects do not produce reference assemblies:");
    log.indent();
    for project in &copy_items.references_without_reference_assembly {
      log.info(project.display().to_string());
    }
    log.unindent();
  }

  AccelerationDecision {
    setting,
    is_active: decision,
  }
}

fn gate(
  state: &CheckState,
  copy_items: &CopyItemsResult,
  enabled_by_default: bool,
  has_consistency_faults: bool,
  log: &mut CheckLog,
) -> bool {
  if !state.acceleration_incompatible_packages.is_empty() {
    log.info(format!(
      "Build acceleration is not available because these incompatible packages are referenced: {}",
      state.acceleration_incompatible_packages.join(", ")
    ));
    return false;
  }

  let enabled = match state.build_acceleration {
    BuildAcceleration::Enabled => true,
    BuildAcceleration::Disabled => false,
    BuildAcceleration::Unspecified => enabled_by_default,
  };
  if !enabled {
    log.verbose("Build acceleration is not enabled for this project.");
    return false;
  }

  if !copy_items.is_complete {
    log.info("Build acceleration is disabled because not all referenced projects have reported their copy items.");
    return false;
  }

  if !copy_items.duplicate_target_paths.is_empty() {
    log.info("Build acceleration is disabled because these copy items are contributed by more than one project:");
    log.indent();
    for path in &copy_items.duplicate_target_paths {
      log.info(path.display().to_string());
    }
    log.unindent();
    return false;
  }

  if has_consistency_faults {
    log.info("Build acceleration is disabled because the project's configurations are inconsistent.");
    return false;
  }

  log.verbose("Build acceleration is enabled for this project.");
  true
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::check::log::LogLevel;
  use crate::project::{ConfiguredInput, ProjectConfiguration};
  use std::path::{Path, PathBuf};

  fn state(setting: BuildAcceleration) -> CheckState {
    let input = ConfiguredInput {
      build_acceleration: setting,
      ..ConfiguredInput::default()
    };
    CheckState::new(Path::new("/repo/App/App.proj"), &ProjectConfiguration::default(), &input)
  }

  fn log() -> CheckLog {
    CheckLog::new(LogLevel::Verbose, Path::new("/repo/App/App.proj"))
  }

  #[test]
  fn explicit_setting_wins_over_default() {
    let complete = CopyItemsResult::empty();
    assert!(evaluate_acceleration(&state(BuildAcceleration::Enabled), &complete, false, false, &mut log()).is_active);
    assert!(!evaluate_acceleration(&state(BuildAcceleration::Disabled), &complete, true, false, &mut log()).is_active);
  }

  #[test]
  fn unspecified_follows_default_opt_in() {
    let complete = CopyItemsResult::empty();
    assert!(evaluate_acceleration(&state(BuildAcceleration::Unspecified), &complete, true, false, &mut log()).is_active);
    let decision = evaluate_acceleration(&state(BuildAcceleration::Unspecified), &complete, false, false, &mut log());
    assert!(!decision.is_active);
    assert_eq!(decision.setting, BuildAcceleration::Unspecified);
  }

  #[test]
  fn incompatible_packages_disable_acceleration() {
    let mut state = state(BuildAcceleration::Enabled);
    state.acceleration_incompatible_packages = vec!["Fody".to_string()];
    let mut log = log();
    assert!(!evaluate_acceleration(&state, &CopyItemsResult::empty(), true, false, &mut log).is_active);
    assert!(log.lines()[0].contains("Fody"));
  }

  #[test]
  fn incomplete_graph_disables_acceleration() {
    let incomplete = CopyItemsResult::default();
    assert!(!evaluate_acceleration(&state(BuildAcceleration::Enabled), &incomplete, false, false, &mut log()).is_active);
  }

  #[test]
  fn duplicates_disable_acceleration() {
    let result = CopyItemsResult {
      duplicate_target_paths: vec![PathBuf::from("shared.dll")],
      ..CopyItemsResult::empty()
    };
    let mut log = log();
    assert!(!evaluate_acceleration(&state(BuildAcceleration::Enabled), &result, false, false, &mut log).is_active);
    assert!(log.lines().iter().any(|line| line.contains("shared.dll")));
  }

  #[test]
  fn consistency_faults_disable_acceleration() {
    assert!(!evaluate_acceleration(
      &state(BuildAcceleration::Enabled),
      &CopyItemsResult::empty(),
      false,
      true,
      &mut log()
    )
    .is_active);
  }
}
