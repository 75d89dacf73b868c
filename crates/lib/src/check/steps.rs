//! The ordered sub-checks for one configuration.
//!
//! Each step either passes or stops the whole check with a reason. Steps run
//! in a fixed order and later steps never run once one has failed.

use std::path::Path;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::acceleration::{AccelerationDecision, evaluate_acceleration};
use super::items::{inputs_for_set, outputs_for_set};
use super::log::CheckLog;
use super::reason::{OutOfDateReason, local_time};
use super::state::CheckState;
use super::{CheckRequest, Stop, ensure_not_cancelled};
use crate::copy::{CopyItemAggregator, CopyItemsResult, CopyType, FileSystemOperationAggregator};
use crate::fs::FileSystem;
use crate::project::{BuildAcceleration, ItemChange};
use crate::source::BuildHost;
use crate::timestamp::TimestampCache;
use crate::util::paths::{make_rooted, paths_equal};

/// When the declared item set last changed, and how.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ItemsChanged<'a> {
  pub at: DateTime<Utc>,
  pub changes: &'a [ItemChange],
}

pub(crate) enum StepsOutcome {
  /// All steps passed; staged copies may still need applying.
  Passed,
  /// A validation run of a disabled project; nothing else to check.
  SkippedAsUpToDate,
}

pub(crate) struct ConfigurationCheck<'a> {
  pub state: &'a CheckState,
  pub request: &'a CheckRequest,
  pub host: &'a dyn BuildHost,
  pub fs: &'a dyn FileSystem,
  pub copy_graph: &'a CopyItemAggregator,
  pub acceleration_enabled_by_default: bool,
  pub has_consistency_faults: bool,
  pub last_successful_build_start: Option<DateTime<Utc>>,
  pub items_changed: Option<ItemsChanged<'a>>,
  pub timestamps: &'a mut TimestampCache,
  pub operations: &'a mut FileSystemOperationAggregator,
  pub log: &'a mut CheckLog,
  pub cancel: &'a CancellationToken,
}

impl<'a> ConfigurationCheck<'a> {
  pub fn run(&mut self) -> Result<StepsOutcome, Stop> {
    if let StepsOutcome::SkippedAsUpToDate = self.check_global_conditions()? {
      return Ok(StepsOutcome::SkippedAsUpToDate);
    }

    let state = self.state;
    for set in state.set_names() {
      ensure_not_cancelled(self.cancel)?;
      self.check_inputs_and_outputs(set)?;
    }

    ensure_not_cancelled(self.cancel)?;
    self.check_built_from_input_files()?;

    let copy_items = match &state.copy_data {
      Some(data) => self.copy_graph.try_gather_copy_items_for_project(&data.target_path),
      None => CopyItemsResult::empty(),
    };
    let acceleration = evaluate_acceleration(
      state,
      &copy_items,
      self.acceleration_enabled_by_default,
      self.has_consistency_faults,
      self.log,
    );

    ensure_not_cancelled(self.cancel)?;
    self.check_markers(&acceleration)?;

    ensure_not_cancelled(self.cancel)?;
    self.check_copy_to_output_directory(&copy_items, &acceleration)?;

    Ok(StepsOutcome::Passed)
  }

  fn check_global_conditions(&mut self) -> Result<StepsOutcome, Stop> {
    if self.host.has_pending_critical_tasks() {
      self.log.info("Build-critical background tasks are still running.");
      return Err(OutOfDateReason::CriticalTasks.into());
    }

    if self.state.is_disabled {
      if self.request.is_validation_run {
        self.log.info("The up-to-date check is disabled; skipping validation.");
        return Ok(StepsOutcome::SkippedAsUpToDate);
      }
      return Err(OutOfDateReason::Disabled.into());
    }

    match self.last_successful_build_start {
      None if !self.request.is_validation_run => return Err(OutOfDateReason::FirstRun.into()),
      None => self.log.verbose("No successful build has been recorded; validating outputs only."),
      Some(start) => {
        self
          .log
          .verbose(format!("Last successful build started at {}.", local_time(&start)));
        if let Some(changed) = self.items_changed
          && changed.at > start
        {
          self
            .log
            .info(format!("The set of project items changed at {}:", local_time(&changed.at)));
          self.log.indent();
          for change in changed.changes {
            self.log.info(change.to_string());
          }
          self.log.unindent();
          return Err(
            OutOfDateReason::ProjectItemsChangedSinceLastSuccessfulBuildStart {
              items_changed_at: changed.at,
              last_successful_build_start: start,
            }
            .into(),
          );
        }
      }
    }

    Ok(StepsOutcome::Passed)
  }

  fn check_inputs_and_outputs(&mut self, set: &'a str) -> Result<(), Stop> {
    let state = self.state;
    let request = self.request;
    let set_label = if set.is_empty() {
      "the default set".to_string()
    } else {
      format!("set '{set}'")
    };

    let mut earliest: Option<(DateTime<Utc>, &Path)> = None;
    let mut output_count = 0usize;
    for output in outputs_for_set(state, set, &request.ignore_kinds) {
      ensure_not_cancelled(self.cancel)?;
      output_count += 1;
      let Some(time) = self.timestamps.get_timestamp_utc(output) else {
        return Err(
          OutOfDateReason::OutputNotFound {
            path: output.to_path_buf(),
          }
          .into(),
        );
      };
      if earliest.is_none_or(|(earliest_time, _)| time < earliest_time) {
        earliest = Some((time, output));
      }
    }

    let Some((earliest_time, earliest_path)) = earliest else {
      self.log.verbose(format!("No build outputs are defined in {set_label}."));
      return Ok(());
    };
    self.log.verbose(format!(
      "Checked {output_count} outputs in {set_label}; the earliest is '{}' ({}).",
      earliest_path.display(),
      local_time(&earliest_time)
    ));

    let mut latest: Option<(DateTime<Utc>, &Path)> = None;
    for input in inputs_for_set(state, set, &request.ignore_kinds) {
      ensure_not_cancelled(self.cancel)?;
      let Some(time) = self.timestamps.get_timestamp_utc(input.path) else {
        if input.required {
          return Err(
            OutOfDateReason::InputNotFound {
              path: input.path.to_path_buf(),
            }
            .into(),
          );
        }
        self.log.verbose(format!(
          "Optional {} input '{}' does not exist, ignoring.",
          input.label,
          input.path.display()
        ));
        continue;
      };

      if time > earliest_time {
        return Err(
          OutOfDateReason::InputNewerThanEarliestOutput {
            input: input.path.to_path_buf(),
            input_time: time,
            output: earliest_path.to_path_buf(),
            output_time: earliest_time,
          }
          .into(),
        );
      }

      if let Some(start) = self.last_successful_build_start
        && time > start
      {
        return Err(
          OutOfDateReason::InputModifiedSinceLastSuccessfulBuildStart {
            input: input.path.to_path_buf(),
            input_time: time,
            last_successful_build_start: start,
          }
          .into(),
        );
      }

      if latest.is_none_or(|(latest_time, _)| time > latest_time) {
        latest = Some((time, input.path));
      }
    }

    if let Some((time, path)) = latest {
      self.log.verbose(format!(
        "The latest input in {set_label} is '{}' ({}).",
        path.display(),
        local_time(&time)
      ));
    }
    Ok(())
  }

  fn check_built_from_input_files(&mut self) -> Result<(), Stop> {
    let state = self.state;
    for pair in &state.built_from_input_files {
      ensure_not_cancelled(self.cancel)?;
      let Some(source_time) = self.timestamps.get_timestamp_utc(&pair.source) else {
        return Err(
          OutOfDateReason::BuiltFromInputFileSourceNotFound {
            source: pair.source.clone(),
          }
          .into(),
        );
      };
      let Some(destination_time) = self.timestamps.get_timestamp_utc(&pair.destination) else {
        return Err(
          OutOfDateReason::BuiltFromInputFileDestinationNotFound {
            destination: pair.destination.clone(),
          }
          .into(),
        );
      };
      if destination_time < source_time {
        return Err(
          OutOfDateReason::BuiltFromInputFileSourceNewer {
            source: pair.source.clone(),
            source_time,
            destination: pair.destination.clone(),
            destination_time,
          }
          .into(),
        );
      }
    }

    if !state.built_from_input_files.is_empty() {
      self.log.verbose(format!(
        "Checked {} files built from a single input.",
        state.built_from_input_files.len()
      ));
    }
    Ok(())
  }

  fn check_markers(&mut self, acceleration: &AccelerationDecision) -> Result<(), Stop> {
    if acceleration.is_active {
      self
        .log
        .verbose("Skipping the copy marker check because build acceleration is enabled.");
      return Ok(());
    }

    let state = self.state;
    let Some(output_marker) = state.copy_up_to_date_marker.as_deref() else {
      return Ok(());
    };
    if state.copy_reference_inputs.is_empty() {
      return Ok(());
    }

    let mut latest: Option<(DateTime<Utc>, &Path)> = None;
    for marker in &state.copy_reference_inputs {
      ensure_not_cancelled(self.cancel)?;
      if let Some(time) = self.timestamps.get_timestamp_utc(marker)
        && latest.is_none_or(|(latest_time, _)| time > latest_time)
      {
        latest = Some((time, marker.as_path()));
      }
    }

    let Some((input_time, input_marker)) = latest else {
      self.log.verbose("No input markers exist, skipping the marker check.");
      return Ok(());
    };
    let Some(output_time) = self.timestamps.get_timestamp_utc(output_marker) else {
      self.log.verbose(format!(
        "Output marker '{}' does not exist, skipping the marker check.",
        output_marker.display()
      ));
      return Ok(());
    };

    if input_time > output_time {
      if acceleration.setting == BuildAcceleration::Unspecified {
        self.operations.mark_acceleration_candidate();
      }
      return Err(
        OutOfDateReason::InputMarkerNewerThanOutputMarker {
          input_marker: input_marker.to_path_buf(),
          input_marker_time: input_time,
          output_marker: output_marker.to_path_buf(),
          output_marker_time: output_time,
        }
        .into(),
      );
    }

    self.log.verbose(format!(
      "Output marker '{}' is newer than every input marker.",
      output_marker.display()
    ));
    Ok(())
  }

  fn check_copy_to_output_directory(
    &mut self,
    copy_items: &CopyItemsResult,
    acceleration: &AccelerationDecision,
  ) -> Result<(), Stop> {
    if copy_items.items_by_project.is_empty() {
      return Ok(());
    }
    let Some(output_dir) = self.state.output_dir.as_deref() else {
      self
        .log
        .verbose("The project has no output directory, skipping copy items.");
      return Ok(());
    };

    for (project, items) in &copy_items.items_by_project {
      self
        .log
        .verbose(format!("Checking copy items from project '{}':", project.display()));
      self.log.indent();

      for item in items {
        ensure_not_cancelled(self.cancel)?;
        if item.is_acceleration_only && !acceleration.is_active {
          continue;
        }

        let source = item.source_path.as_path();
        let destination = make_rooted(output_dir, &item.relative_target_path);
        if paths_equal(source, &destination) {
          continue;
        }

        let Some(source_time) = self.timestamps.get_source_timestamp_utc(source) else {
          return Err(
            OutOfDateReason::CopyToOutputDirectorySourceNotFound {
              source: source.to_path_buf(),
            }
            .into(),
          );
        };

        let stale = match self.timestamps.get_timestamp_utc(&destination) {
          None => Some(OutOfDateReason::CopyToOutputDirectoryDestinationNotFound {
            source: source.to_path_buf(),
            destination: destination.clone(),
          }),
          Some(destination_time) => match item.copy_type {
            CopyType::Always => {
              let differs = destination_time != source_time || self.file_size(source) != self.file_size(&destination);
              differs.then(|| OutOfDateReason::CopyAlwaysItemDiffers {
                source: source.to_path_buf(),
                destination: destination.clone(),
              })
            }
            CopyType::PreserveNewest => {
              (destination_time < source_time).then(|| OutOfDateReason::CopyToOutputDirectorySourceNewer {
                source: source.to_path_buf(),
                source_time,
                destination: destination.clone(),
                destination_time,
              })
            }
          },
        };

        if let Some(reason) = stale {
          if !self.operations.add_copy(source, &destination, acceleration) {
            return Err(reason.into());
          }
          self.log.verbose(format!("Staging copy because {reason}."));
        }
      }

      self.log.unindent();
    }
    Ok(())
  }

  fn file_size(&self, path: &Path) -> Option<u64> {
    self.fs.file_size_bytes(path).ok().flatten()
  }
}
