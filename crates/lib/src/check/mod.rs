//! The incremental up-to-date check.
//!
//! A [`ProjectChecker`] answers, for one project, whether the build system can
//! skip building it. It works from the newest [`ProjectSnapshot`] published by
//! a [`SnapshotSource`], compares file timestamps against what the snapshot
//! declares, and may bring copy-to-output items up to date itself instead of
//! asking for a build.
//!
//! # Check Order
//!
//! For each configuration, stopping at the first failure:
//!
//! 1. Global conditions: critical tasks, disabled, first run, item set changes
//! 2. Inputs against outputs, for every set
//! 3. Files built from a single input
//! 4. Copy markers (skipped under build acceleration)
//! 5. Copy-to-output items, staging copies where acceleration allows
//!
//! Staged copies are applied only once every configuration has passed.

pub mod acceleration;
pub mod consistency;
pub mod items;
pub mod log;
pub mod reason;
pub mod state;
mod steps;
mod tracking;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::copy::FileSystemOperationAggregator;
use crate::persistence::StateError;
use crate::project::{ItemChange, ProjectSnapshot};
use crate::session::SolutionBuildContext;
use crate::source::{SnapshotSource, SourceError};
use crate::timestamp::TimestampCache;
use crate::util::paths::{make_absolute, normalize};
use consistency::{ConsistencyFault, find_consistency_faults};
use log::CheckLog;
use reason::OutOfDateReason;
use state::CheckState;
use steps::{ConfigurationCheck, ItemsChanged, StepsOutcome};
use tracking::ItemSetTracker;

/// What the build system is about to do with the project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildAction {
  #[default]
  Build,
  Rebuild,
}

#[derive(Debug, Clone, Default)]
pub struct CheckRequest {
  pub build_action: BuildAction,
  /// Validation runs never copy and never fail for lack of a recorded build.
  pub is_validation_run: bool,
  /// Restrict the check to configurations with this target framework.
  pub target_framework: Option<String>,
  /// Item kinds left out of the input/output comparison.
  pub ignore_kinds: HashSet<String>,
}

impl CheckRequest {
  pub fn build() -> Self {
    Self::default()
  }

  pub fn validation() -> Self {
    Self {
      is_validation_run: true,
      ..Self::default()
    }
  }
}

/// Result of one completed check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
  pub project_path: PathBuf,
  pub is_up_to_date: bool,
  /// Why the project is out of date. `None` when it is up to date.
  pub reason: Option<OutOfDateReason>,
  /// Files copied to bring the project up to date.
  pub copy_count: usize,
  pub is_acceleration_candidate: bool,
  pub consistency_faults: Vec<ConsistencyFault>,
  pub configurations_checked: usize,
  pub duration_ms: u64,
  pub log: Vec<String>,
}

#[derive(Debug, Error)]
pub enum CheckError {
  #[error("the up-to-date check was cancelled")]
  Cancelled,

  #[error(transparent)]
  Source(#[from] SourceError),

  #[error(transparent)]
  State(#[from] StateError),
}

/// Why a check stopped before finishing.
pub(crate) enum Stop {
  OutOfDate(OutOfDateReason),
  Cancelled,
  Failed(String),
}

impl From<OutOfDateReason> for Stop {
  fn from(reason: OutOfDateReason) -> Self {
    Stop::OutOfDate(reason)
  }
}

impl From<StateError> for Stop {
  fn from(e: StateError) -> Self {
    Stop::Failed(e.to_string())
  }
}

impl From<SourceError> for Stop {
  fn from(e: SourceError) -> Self {
    Stop::Failed(e.to_string())
  }
}

pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), Stop> {
  if cancel.is_cancelled() {
    return Err(Stop::Cancelled);
  }
  Ok(())
}

#[derive(Default)]
struct CheckerInner {
  version: Option<u64>,
  states: Vec<CheckState>,
  tracker: ItemSetTracker,
  build_started_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct CheckReport {
  copy_count: usize,
  is_acceleration_candidate: bool,
  consistency_faults: Vec<ConsistencyFault>,
  configurations_checked: usize,
}

/// Up-to-date checker for a single project.
///
/// Checks on one checker never overlap: a second call waits for the first to
/// finish. Checkers of different projects share a [`SolutionBuildContext`].
pub struct ProjectChecker {
  project_path: PathBuf,
  source: Arc<dyn SnapshotSource>,
  context: Arc<SolutionBuildContext>,
  inner: Mutex<CheckerInner>,
}

impl ProjectChecker {
  /// A relative `project_path` is resolved against the working directory.
  pub fn new(project_path: &Path, source: Arc<dyn SnapshotSource>, context: Arc<SolutionBuildContext>) -> Self {
    let project_path = make_absolute(project_path).unwrap_or_else(|e| {
      warn!(path = %project_path.display(), error = %e, "could not make project path absolute");
      normalize(project_path)
    });
    Self {
      project_path,
      source,
      context,
      inner: Mutex::new(CheckerInner::default()),
    }
  }

  pub fn project_path(&self) -> &Path {
    &self.project_path
  }

  /// Take in the newest snapshot without checking anything.
  ///
  /// Registers the project's copy data with the solution and updates item-set
  /// tracking. Returns the snapshot version now in effect.
  pub async fn refresh(&self, cancel: &CancellationToken) -> Result<u64, CheckError> {
    let mut inner = tokio::select! {
      _ = cancel.cancelled() => return Err(CheckError::Cancelled),
      inner = self.inner.lock() => inner,
    };
    let snapshot = tokio::select! {
      _ = cancel.cancelled() => return Err(CheckError::Cancelled),
      snapshot = self.source.latest() => snapshot?,
    };
    self.ingest(&mut inner, &snapshot)?;
    Ok(snapshot.version)
  }

  /// Decide whether the project needs to be built.
  ///
  /// Only cancellation is reported as an error. Everything else, including
  /// failures while reading state or copying files, yields an out-of-date
  /// outcome so the build system falls back to building.
  pub async fn is_up_to_date(
    &self,
    request: &CheckRequest,
    cancel: &CancellationToken,
  ) -> Result<CheckOutcome, CheckError> {
    let started = Instant::now();
    let mut inner = tokio::select! {
      _ = cancel.cancelled() => return Err(CheckError::Cancelled),
      inner = self.inner.lock() => inner,
    };

    let mut log = CheckLog::new(self.context.config().log_level, &self.project_path);
    let mut report = CheckReport::default();
    let result = self.run(&mut inner, request, cancel, &mut log, &mut report).await;
    drop(inner);

    let reason = match result {
      Ok(()) => None,
      Err(Stop::Cancelled) => {
        info!(project = %self.project_path.display(), "up-to-date check cancelled");
        return Err(CheckError::Cancelled);
      }
      Err(Stop::OutOfDate(reason)) => Some(reason),
      Err(Stop::Failed(message)) => {
        error!(project = %self.project_path.display(), error = %message, "up-to-date check failed");
        Some(OutOfDateReason::Exception { message })
      }
    };

    log.reset_indent();
    match &reason {
      Some(reason) => {
        log.fail(reason);
        if report.is_acceleration_candidate {
          log.info(
            "This project looks like a candidate for build acceleration; \
             enable it to copy changed files instead of building.",
          );
        }
      }
      None if report.copy_count > 0 => log.info(format!(
        "Project is up to date after copying {} files.",
        report.copy_count
      )),
      None => log.info("Project is up to date."),
    }

    let outcome = CheckOutcome {
      project_path: self.project_path.clone(),
      is_up_to_date: reason.is_none(),
      reason,
      copy_count: report.copy_count,
      is_acceleration_candidate: report.is_acceleration_candidate,
      consistency_faults: report.consistency_faults,
      configurations_checked: report.configurations_checked,
      duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
      log: log.into_lines(),
    };
    self.context.statistics().record(&outcome);
    info!(
      project = %self.project_path.display(),
      up_to_date = outcome.is_up_to_date,
      code = outcome.reason.as_ref().map(OutOfDateReason::code).unwrap_or("up_to_date"),
      copies = outcome.copy_count,
      duration_ms = outcome.duration_ms,
      "up-to-date check complete"
    );
    Ok(outcome)
  }

  /// A validation run: reports staleness without copying anything.
  pub async fn validate_up_to_date(&self, cancel: &CancellationToken) -> Result<CheckOutcome, CheckError> {
    self.is_up_to_date(&CheckRequest::validation(), cancel).await
  }

  /// Remember when the build of this project started.
  pub async fn notify_build_starting(&self, started_at: DateTime<Utc>) {
    let mut inner = self.inner.lock().await;
    inner.build_started_at = Some(started_at);
    debug!(project = %self.project_path.display(), %started_at, "build starting");
  }

  /// Record the outcome of the build announced by [`Self::notify_build_starting`].
  ///
  /// On success the build's start time becomes the last successful build
  /// start of every configuration. Either way, cached timestamps of anything
  /// the build may have written are dropped.
  pub async fn notify_build_completed(&self, succeeded: bool) -> Result<(), StateError> {
    let mut inner = self.inner.lock().await;
    let Some(started_at) = inner.build_started_at.take() else {
      debug!(project = %self.project_path.display(), "build completed without a recorded start");
      return Ok(());
    };

    if succeeded {
      for state in &inner.states {
        self
          .context
          .state()
          .store_last_successful_build_start(&self.project_path, &state.configuration, started_at)?;
      }
    }

    let written: Vec<PathBuf> = inner.states.iter().flat_map(build_written_paths).collect();
    let dropped = self.context.invalidate_timestamps(written.iter().map(PathBuf::as_path));
    info!(
      project = %self.project_path.display(),
      succeeded,
      %started_at,
      invalidated = dropped,
      "build completed"
    );
    Ok(())
  }

  fn ingest(&self, inner: &mut CheckerInner, snapshot: &ProjectSnapshot) -> Result<(), StateError> {
    if inner.version == Some(snapshot.version) {
      return Ok(());
    }

    let now = Utc::now();
    let states: Vec<CheckState> = snapshot
      .configurations
      .iter()
      .map(|entry| CheckState::new(&self.project_path, &entry.configuration, &entry.input))
      .collect();
    for state in &states {
      if let Some(data) = &state.copy_data {
        self.context.copy_items().set_project_data(data.clone());
      }
      inner
        .tracker
        .observe(self.context.state(), &self.project_path, state, now)?;
    }

    debug!(
      project = %self.project_path.display(),
      version = snapshot.version,
      configurations = states.len(),
      "took in project snapshot"
    );
    inner.states = states;
    inner.version = Some(snapshot.version);
    Ok(())
  }

  async fn run(
    &self,
    inner: &mut CheckerInner,
    request: &CheckRequest,
    cancel: &CancellationToken,
    log: &mut CheckLog,
    report: &mut CheckReport,
  ) -> Result<(), Stop> {
    if request.build_action == BuildAction::Rebuild {
      return Err(OutOfDateReason::RebuildRequested.into());
    }

    let snapshot = tokio::select! {
      _ = cancel.cancelled() => return Err(Stop::Cancelled),
      snapshot = self.source.latest() => snapshot?,
    };
    self.ingest(inner, &snapshot)?;
    let inner = &*inner;

    if inner.states.is_empty() {
      return Err(OutOfDateReason::NoConfigurations.into());
    }

    let faults = find_consistency_faults(&inner.states);
    for fault in &faults {
      warn!(project = %self.project_path.display(), %fault, "inconsistent project configurations");
      log.minimal(format!("Warning: {fault}"));
    }
    report.consistency_faults = faults;

    let states: Vec<&CheckState> = match request.target_framework.as_deref() {
      Some(target_framework) => inner
        .states
        .iter()
        .filter(|state| state.configuration.target_framework() == Some(target_framework))
        .collect(),
      None => inner.states.iter().collect(),
    };
    if states.is_empty() {
      return Err(
        OutOfDateReason::NoMatchingConfiguration {
          target_framework: request.target_framework.clone().unwrap_or_default(),
        }
        .into(),
      );
    }

    let mut operations = FileSystemOperationAggregator::new(self.context.file_system().clone(), request.is_validation_run);
    let result = self.check_configurations(inner, &states, request, cancel, log, &mut operations, report);
    report.is_acceleration_candidate = operations.is_acceleration_candidate();
    if let StepsOutcome::SkippedAsUpToDate = result? {
      return Ok(());
    }

    ensure_not_cancelled(cancel)?;
    report.copy_count = operations
      .try_apply_file_system_operations(log)
      .map_err(|e| OutOfDateReason::CopyFailed { message: e.to_string() })?;
    Ok(())
  }

  #[allow(clippy::too_many_arguments)]
  fn check_configurations(
    &self,
    inner: &CheckerInner,
    states: &[&CheckState],
    request: &CheckRequest,
    cancel: &CancellationToken,
    log: &mut CheckLog,
    operations: &mut FileSystemOperationAggregator,
    report: &mut CheckReport,
  ) -> Result<StepsOutcome, Stop> {
    let context = &self.context;
    for state in states.iter().copied() {
      ensure_not_cancelled(cancel)?;
      report.configurations_checked += 1;
      log.info(format!("Checking configuration {}:", state.configuration));
      log.indent();

      let record = context.state().restore_state(&self.project_path, &state.configuration)?;
      let tracked_at = record.as_ref().and_then(|record| record.items_changed_at);
      let last_successful_build_start = record.and_then(|record| record.last_successful_build_start);
      let items_changed = effective_items_changed(state, tracked_at, inner.tracker.changes(&state.configuration));

      let mut timestamps =
        TimestampCache::new(context.file_system().clone()).with_shared(context.shared_source_timestamps());
      let outcome = ConfigurationCheck {
        state,
        request,
        host: context.host(),
        fs: context.file_system().as_ref(),
        copy_graph: context.copy_items(),
        acceleration_enabled_by_default: context.config().acceleration_enabled_by_default,
        has_consistency_faults: !report.consistency_faults.is_empty(),
        last_successful_build_start,
        items_changed,
        timestamps: &mut timestamps,
        operations: &mut *operations,
        log: &mut *log,
        cancel,
      }
      .run();
      debug!(
        project = %self.project_path.display(),
        configuration = %state.configuration,
        hits = timestamps.hits(),
        misses = timestamps.misses(),
        "timestamp cache usage"
      );

      if let StepsOutcome::SkippedAsUpToDate = outcome? {
        return Ok(StepsOutcome::SkippedAsUpToDate);
      }
      log.unindent();
    }
    Ok(StepsOutcome::Passed)
  }
}

/// The later of the upstream item-change time and the tracked one.
fn effective_items_changed<'a>(
  state: &'a CheckState,
  tracked_at: Option<DateTime<Utc>>,
  tracked_changes: &'a [ItemChange],
) -> Option<ItemsChanged<'a>> {
  let upstream = state.last_items_changed_at.map(|at| ItemsChanged {
    at,
    changes: &state.last_item_changes,
  });
  let tracked = tracked_at.map(|at| ItemsChanged {
    at,
    changes: tracked_changes,
  });
  match (upstream, tracked) {
    (Some(upstream), Some(tracked)) if tracked.at > upstream.at => Some(tracked),
    (Some(upstream), _) => Some(upstream),
    (None, tracked) => tracked,
  }
}

/// Paths a build of this configuration may write or depend on for copying.
fn build_written_paths(state: &CheckState) -> Vec<PathBuf> {
  let mut paths: Vec<PathBuf> = [&state.output_items_by_kind_by_set, &state.built_items_by_kind_by_set]
    .into_iter()
    .flat_map(|sets| sets.values())
    .flat_map(|kinds| kinds.values())
    .flatten()
    .cloned()
    .collect();
  paths.extend(state.built_from_input_files.iter().map(|pair| pair.destination.clone()));
  paths.extend(state.copy_up_to_date_marker.clone());
  if let Some(data) = &state.copy_data {
    paths.push(data.target_path.clone());
    paths.extend(data.copy_items.iter().map(|item| item.source_path.clone()));
  }
  paths
}
