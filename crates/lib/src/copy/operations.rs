//! Staging and committing accelerated copies.
//!
//! While the copy-to-output-directory check runs, every stale destination that
//! acceleration may repair is staged here instead of failing the check. Once
//! the whole check has passed, [`FileSystemOperationAggregator::try_apply_file_system_operations`]
//! commits the batch in two phases. All sources are first copied to temporary
//! files beside their destinations; if any of those copies fails, nothing is
//! applied. The temporaries are then renamed into place, with every replaced
//! destination set aside until the batch is complete, so a failed rename puts
//! back the files the earlier renames replaced.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempPath;
use thiserror::Error;
use tracing::{info, warn};

use crate::check::acceleration::AccelerationDecision;
use crate::check::log::CheckLog;
use crate::fs::FileSystem;
use crate::project::BuildAcceleration;
use crate::util::paths::PathKey;

/// A staged copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOperation {
  pub source: PathBuf,
  pub destination: PathBuf,
}

/// A staged copy that could not be applied.
#[derive(Debug, Error)]
#[error("failed to copy {} to {}: {error}", source_path.display(), destination.display())]
pub struct CopyError {
  pub source_path: PathBuf,
  pub destination: PathBuf,
  #[source]
  pub error: io::Error,
}

impl CopyError {
  fn new(copy: &CopyOperation, error: io::Error) -> Self {
    Self {
      source_path: copy.source.clone(),
      destination: copy.destination.clone(),
      error,
    }
  }
}

/// Check-scoped accumulator of copy operations.
pub struct FileSystemOperationAggregator {
  fs: Arc<dyn FileSystem>,
  is_validation_run: bool,
  copies: Vec<CopyOperation>,
  destinations: HashSet<PathKey>,
  is_acceleration_candidate: bool,
}

impl FileSystemOperationAggregator {
  pub fn new(fs: Arc<dyn FileSystem>, is_validation_run: bool) -> Self {
    Self {
      fs,
      is_validation_run,
      copies: Vec::new(),
      destinations: HashSet::new(),
      is_acceleration_candidate: false,
    }
  }

  /// Stage a copy. Performs no I/O.
  ///
  /// Returns `false` when acceleration is not active for the configuration
  /// (or this is a validation run), in which case the caller must treat the
  /// stale item as a failure.
  pub fn add_copy(&mut self, source: &Path, destination: &Path, acceleration: &AccelerationDecision) -> bool {
    if self.is_validation_run || !acceleration.is_active {
      if acceleration.setting == BuildAcceleration::Unspecified {
        self.is_acceleration_candidate = true;
      }
      return false;
    }

    if self.destinations.insert(PathKey::new(destination)) {
      self.copies.push(CopyOperation {
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
      });
    }
    true
  }

  /// Record that acceleration would likely have avoided this build.
  pub fn mark_acceleration_candidate(&mut self) {
    self.is_acceleration_candidate = true;
  }

  pub fn is_acceleration_candidate(&self) -> bool {
    self.is_acceleration_candidate
  }

  pub fn copies(&self) -> &[CopyOperation] {
    &self.copies
  }

  pub fn is_empty(&self) -> bool {
    self.copies.is_empty()
  }

  /// Apply every staged copy as one unit. Returns the number of files copied.
  ///
  /// On error the destinations are left as they were before the call.
  pub fn try_apply_file_system_operations(&mut self, log: &mut CheckLog) -> Result<usize, CopyError> {
    let copies = std::mem::take(&mut self.copies);
    self.destinations.clear();
    if copies.is_empty() {
      return Ok(0);
    }

    info!(count = copies.len(), "applying accelerated copies");
    log.info(format!("Copying {} files to accelerate build:", copies.len()));
    log.indent();

    let result = self.stage(&copies).and_then(|staged| self.commit(staged));
    match &result {
      Ok(()) => {
        for copy in &copies {
          log.info(format!(
            "From '{}' to '{}'",
            copy.source.display(),
            copy.destination.display()
          ));
        }
      }
      Err(e) => warn!(
        source = %e.source_path.display(),
        destination = %e.destination.display(),
        error = %e.error,
        "accelerated copies were not applied"
      ),
    }

    log.unindent();
    result.map(|()| copies.len())
  }

  /// Copy every source beside its destination. Dropping the result removes
  /// whatever was staged.
  fn stage<'a>(&self, copies: &'a [CopyOperation]) -> Result<Vec<(TempPath, &'a CopyOperation)>, CopyError> {
    copies
      .iter()
      .map(|copy| {
        let staged = self.stage_one(copy).map_err(|e| CopyError::new(copy, e))?;
        Ok((staged, copy))
      })
      .collect()
  }

  fn stage_one(&self, copy: &CopyOperation) -> io::Result<TempPath> {
    if self.fs.is_dir(&copy.destination)? {
      return Err(io::Error::new(
        io::ErrorKind::IsADirectory,
        "destination is a directory",
      ));
    }
    if let Some(parent) = copy.destination.parent() {
      self.fs.create_dir_all(parent)?;
    }
    self.fs.stage_copy(&copy.source, &copy.destination)
  }

  fn commit(&self, staged: Vec<(TempPath, &CopyOperation)>) -> Result<(), CopyError> {
    let mut committed: Vec<(&CopyOperation, Option<TempPath>)> = Vec::with_capacity(staged.len());
    for (temp, copy) in staged {
      let aside = match self.fs.set_aside(&copy.destination) {
        Ok(aside) => aside,
        Err(e) => {
          self.roll_back(committed);
          return Err(CopyError::new(copy, e));
        }
      };
      if let Err(e) = self.fs.rename(&temp, &copy.destination) {
        if let Some(aside) = aside {
          self.restore(copy, aside);
        }
        self.roll_back(committed);
        return Err(CopyError::new(copy, e));
      }
      forget(temp);
      committed.push((copy, aside));
    }
    Ok(())
  }

  /// Undo committed renames, newest first.
  fn roll_back(&self, committed: Vec<(&CopyOperation, Option<TempPath>)>) {
    for (copy, aside) in committed.into_iter().rev() {
      match aside {
        Some(aside) => self.restore(copy, aside),
        None => {
          if let Err(e) = self.fs.remove_file(&copy.destination) {
            warn!(destination = %copy.destination.display(), error = %e, "failed to remove accelerated copy");
          }
        }
      }
    }
  }

  fn restore(&self, copy: &CopyOperation, aside: TempPath) {
    if let Err(e) = self.fs.rename(&aside, &copy.destination) {
      // Keep the original content on disk rather than deleting it with the guard.
      let kept = aside.keep().map(|path| path.display().to_string()).unwrap_or_default();
      warn!(destination = %copy.destination.display(), kept, error = %e, "failed to restore replaced file");
      return;
    }
    forget(aside);
  }
}

/// Drop a guard whose file has already been renamed away.
fn forget(temp: TempPath) {
  let _ = temp.keep();
}
