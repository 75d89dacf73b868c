//! State shared by every project checked within one solution build.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::Serialize;
use tracing::info;

use crate::check::CheckOutcome;
use crate::config::UpCheckConfig;
use crate::copy::CopyItemAggregator;
use crate::fs::{FileSystem, RealFileSystem};
use crate::persistence::{StateError, StateStore};
use crate::source::{BuildHost, IdleBuildHost};
use crate::timestamp::SharedTimestampCache;

/// The solution-wide context handed to every [`crate::check::ProjectChecker`].
///
/// Holds the copy-item graph, the persisted check state, and, while a
/// solution build is in progress, the cross-project cache of copy-source
/// timestamps.
pub struct SolutionBuildContext {
  config: UpCheckConfig,
  fs: Arc<dyn FileSystem>,
  host: Arc<dyn BuildHost>,
  copy_items: CopyItemAggregator,
  state: StateStore,
  source_timestamps: Arc<SharedTimestampCache>,
  in_solution_build: AtomicBool,
  statistics: BuildStatistics,
}

impl SolutionBuildContext {
  /// A context whose state lives in the configured state directory.
  pub fn new(config: UpCheckConfig) -> Self {
    let state = StateStore::new(config.state_dir());
    Self::with_state_store(config, state)
  }

  pub fn with_state_store(config: UpCheckConfig, state: StateStore) -> Self {
    Self {
      config,
      fs: Arc::new(RealFileSystem),
      host: Arc::new(IdleBuildHost),
      copy_items: CopyItemAggregator::new(),
      state,
      source_timestamps: Arc::new(SharedTimestampCache::new()),
      in_solution_build: AtomicBool::new(false),
      statistics: BuildStatistics::default(),
    }
  }

  pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
    self.fs = fs;
    self
  }

  pub fn with_host(mut self, host: Arc<dyn BuildHost>) -> Self {
    self.host = host;
    self
  }

  pub fn config(&self) -> &UpCheckConfig {
    &self.config
  }

  pub fn file_system(&self) -> &Arc<dyn FileSystem> {
    &self.fs
  }

  pub fn host(&self) -> &dyn BuildHost {
    self.host.as_ref()
  }

  pub fn copy_items(&self) -> &CopyItemAggregator {
    &self.copy_items
  }

  pub fn state(&self) -> &StateStore {
    &self.state
  }

  pub fn statistics(&self) -> &BuildStatistics {
    &self.statistics
  }

  pub fn is_in_solution_build(&self) -> bool {
    self.in_solution_build.load(Ordering::Acquire)
  }

  /// The cross-project source timestamp cache, only while a solution build runs.
  pub fn shared_source_timestamps(&self) -> Option<Arc<SharedTimestampCache>> {
    self
      .is_in_solution_build()
      .then(|| Arc::clone(&self.source_timestamps))
  }

  /// Drop cached source timestamps for `paths`. Returns how many were cached.
  pub fn invalidate_timestamps<'a, I>(&self, paths: I) -> usize
  where
    I: IntoIterator<Item = &'a Path>,
  {
    self.source_timestamps.invalidate(paths)
  }

  pub fn begin_solution_build(&self) {
    self.source_timestamps.clear();
    self.statistics.reset();
    self.in_solution_build.store(true, Ordering::Release);
    info!("solution build started");
  }

  /// End the solution build, flush persisted state, and return its statistics.
  pub fn end_solution_build(&self) -> Result<StatisticsSnapshot, StateError> {
    self.in_solution_build.store(false, Ordering::Release);
    let cached_sources = self.source_timestamps.len();
    self.source_timestamps.clear();
    let statistics = self.statistics.snapshot();
    self.flush_state()?;
    info!(
      cached_sources,
      checks = statistics.checks,
      up_to_date = statistics.up_to_date,
      out_of_date = statistics.out_of_date,
      accelerated = statistics.accelerated,
      files_copied = statistics.files_copied,
      "solution build finished"
    );
    Ok(statistics)
  }

  /// Write persisted state if anything changed. Returns whether it wrote.
  pub fn flush_state(&self) -> Result<bool, StateError> {
    self.state.flush()
  }
}

/// Counters over the checks of one solution build.
#[derive(Debug, Default)]
pub struct BuildStatistics {
  checks: AtomicUsize,
  up_to_date: AtomicUsize,
  out_of_date: AtomicUsize,
  accelerated: AtomicUsize,
  files_copied: AtomicUsize,
  acceleration_candidates: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
  pub checks: usize,
  pub up_to_date: usize,
  pub out_of_date: usize,
  /// Checks that ended up to date only because files were copied.
  pub accelerated: usize,
  pub files_copied: usize,
  pub acceleration_candidates: usize,
}

impl BuildStatistics {
  pub fn record(&self, outcome: &CheckOutcome) {
    self.checks.fetch_add(1, Ordering::Relaxed);
    if outcome.is_up_to_date {
      self.up_to_date.fetch_add(1, Ordering::Relaxed);
    } else {
      self.out_of_date.fetch_add(1, Ordering::Relaxed);
    }
    if outcome.copy_count > 0 {
      self.accelerated.fetch_add(1, Ordering::Relaxed);
      self.files_copied.fetch_add(outcome.copy_count, Ordering::Relaxed);
    }
    if outcome.is_acceleration_candidate {
      self.acceleration_candidates.fetch_add(1, Ordering::Relaxed);
    }
  }

  pub fn snapshot(&self) -> StatisticsSnapshot {
    StatisticsSnapshot {
      checks: self.checks.load(Ordering::Relaxed),
      up_to_date: self.up_to_date.load(Ordering::Relaxed),
      out_of_date: self.out_of_date.load(Ordering::Relaxed),
      accelerated: self.accelerated.load(Ordering::Relaxed),
      files_copied: self.files_copied.load(Ordering::Relaxed),
      acceleration_candidates: self.acceleration_candidates.load(Ordering::Relaxed),
    }
  }

  fn reset(&self) {
    for counter in [
      &self.checks,
      &self.up_to_date,
      &self.out_of_date,
      &self.accelerated,
      &self.files_copied,
      &self.acceleration_candidates,
    ] {
      counter.store(0, Ordering::Relaxed);
    }
  }
}
