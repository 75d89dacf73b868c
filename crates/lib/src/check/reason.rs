//! Why a project is not up to date.
//!
//! Every out-of-date verdict carries one [`OutOfDateReason`]. The variant's
//! [`code`](OutOfDateReason::code) is stable and meant for tooling; the
//! `Display` form is for people and renders timestamps in local time.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code")]
pub enum OutOfDateReason {
  RebuildRequested,
  NoConfigurations,
  NoMatchingConfiguration {
    target_framework: String,
  },
  CriticalTasks,
  Disabled,
  FirstRun,
  ProjectItemsChangedSinceLastSuccessfulBuildStart {
    items_changed_at: DateTime<Utc>,
    last_successful_build_start: DateTime<Utc>,
  },
  OutputNotFound {
    path: PathBuf,
  },
  InputNotFound {
    path: PathBuf,
  },
  InputNewerThanEarliestOutput {
    input: PathBuf,
    input_time: DateTime<Utc>,
    output: PathBuf,
    output_time: DateTime<Utc>,
  },
  InputModifiedSinceLastSuccessfulBuildStart {
    input: PathBuf,
    input_time: DateTime<Utc>,
    last_successful_build_start: DateTime<Utc>,
  },
  BuiltFromInputFileSourceNotFound {
    source: PathBuf,
  },
  BuiltFromInputFileDestinationNotFound {
    destination: PathBuf,
  },
  BuiltFromInputFileSourceNewer {
    source: PathBuf,
    source_time: DateTime<Utc>,
    destination: PathBuf,
    destination_time: DateTime<Utc>,
  },
  InputMarkerNewerThanOutputMarker {
    input_marker: PathBuf,
    input_marker_time: DateTime<Utc>,
    output_marker: PathBuf,
    output_marker_time: DateTime<Utc>,
  },
  CopyToOutputDirectorySourceNotFound {
    source: PathBuf,
  },
  CopyToOutputDirectoryDestinationNotFound {
    source: PathBuf,
    destination: PathBuf,
  },
  CopyToOutputDirectorySourceNewer {
    source: PathBuf,
    source_time: DateTime<Utc>,
    destination: PathBuf,
    destination_time: DateTime<Utc>,
  },
  CopyAlwaysItemDiffers {
    source: PathBuf,
    destination: PathBuf,
  },
  CopyFailed {
    message: String,
  },
  Exception {
    message: String,
  },
}

impl OutOfDateReason {
  /// Stable machine-readable code.
  pub fn code(&self) -> &'static str {
    match self {
      Self::RebuildRequested => "RebuildRequested",
      Self::NoConfigurations => "NoConfigurations",
      Self::NoMatchingConfiguration { .. } => "NoMatchingConfiguration",
      Self::CriticalTasks => "CriticalTasks",
      Self::Disabled => "Disabled",
      Self::FirstRun => "FirstRun",
      Self::ProjectItemsChangedSinceLastSuccessfulBuildStart { .. } => {
        "ProjectItemsChangedSinceLastSuccessfulBuildStart"
      }
      Self::OutputNotFound { .. } => "OutputNotFound",
      Self::InputNotFound { .. } => "InputNotFound",
      Self::InputNewerThanEarliestOutput { .. } => "InputNewerThanEarliestOutput",
      Self::InputModifiedSinceLastSuccessfulBuildStart { .. } => "InputModifiedSinceLastSuccessfulBuildStart",
      Self::BuiltFromInputFileSourceNotFound { .. } => "BuiltFromInputFileSourceNotFound",
      Self::BuiltFromInputFileDestinationNotFound { .. } => "BuiltFromInputFileDestinationNotFound",
      Self::BuiltFromInputFileSourceNewer { .. } => "BuiltFromInputFileSourceNewer",
      Self::InputMarkerNewerThanOutputMarker { .. } => "InputMarkerNewerThanOutputMarker",
      Self::CopyToOutputDirectorySourceNotFound { .. } => "CopyToOutputDirectorySourceNotFound",
      Self::CopyToOutputDirectoryDestinationNotFound { .. } => "CopyToOutputDirectoryDestinationNotFound",
      Self::CopyToOutputDirectorySourceNewer { .. } => "CopyToOutputDirectorySourceNewer",
      Self::CopyAlwaysItemDiffers { .. } => "CopyAlwaysItemDiffers",
      Self::CopyFailed { .. } => "CopyFailed",
      Self::Exception { .. } => "Exception",
    }
  }
}

/// Render a UTC timestamp in the local time zone.
pub fn local_time(time: &DateTime<Utc>) -> String {
  time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

impl fmt::Display for OutOfDateReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::RebuildRequested => write!(f, "a rebuild was requested"),
      Self::NoConfigurations => write!(f, "the project has no configurations to check"),
      Self::NoMatchingConfiguration { target_framework } => {
        write!(f, "no configuration targets framework '{target_framework}'")
      }
      Self::CriticalTasks => write!(f, "build-critical background tasks are still running"),
      Self::Disabled => write!(f, "the up-to-date check is disabled for this project"),
      Self::FirstRun => write!(f, "the project has not been built successfully since tracking began"),
      Self::ProjectItemsChangedSinceLastSuccessfulBuildStart {
        items_changed_at,
        last_successful_build_start,
      } => write!(
        f,
        "the set of project items changed at {}, after the last successful build started at {}",
        local_time(items_changed_at),
        local_time(last_successful_build_start)
      ),
      Self::OutputNotFound { path } => write!(f, "output '{}' does not exist", path.display()),
      Self::InputNotFound { path } => write!(f, "input '{}' does not exist and is required", path.display()),
      Self::InputNewerThanEarliestOutput {
        input,
        input_time,
        output,
        output_time,
      } => write!(
        f,
        "input '{}' ({}) is newer than earliest output '{}' ({})",
        input.display(),
        local_time(input_time),
        output.display(),
        local_time(output_time)
      ),
      Self::InputModifiedSinceLastSuccessfulBuildStart {
        input,
        input_time,
        last_successful_build_start,
      } => write!(
        f,
        "input '{}' ({}) was modified after the last successful build started at {}",
        input.display(),
        local_time(input_time),
        local_time(last_successful_build_start)
      ),
      Self::BuiltFromInputFileSourceNotFound { source } => {
        write!(f, "source '{}' of a built-from-input file does not exist", source.display())
      }
      Self::BuiltFromInputFileDestinationNotFound { destination } => {
        write!(f, "built-from-input file '{}' does not exist", destination.display())
      }
      Self::BuiltFromInputFileSourceNewer {
        source,
        source_time,
        destination,
        destination_time,
      } => write!(
        f,
        "source '{}' ({}) is newer than built-from-input file '{}' ({})",
        source.display(),
        local_time(source_time),
        destination.display(),
        local_time(destination_time)
      ),
      Self::InputMarkerNewerThanOutputMarker {
        input_marker,
        input_marker_time,
        output_marker,
        output_marker_time,
      } => write!(
        f,
        "input marker '{}' ({}) is newer than output marker '{}' ({})",
        input_marker.display(),
        local_time(input_marker_time),
        output_marker.display(),
        local_time(output_marker_time)
      ),
      Self::CopyToOutputDirectorySourceNotFound { source } => {
        write!(f, "source '{}' of a copy-to-output-directory item does not exist", source.display())
      }
      Self::CopyToOutputDirectoryDestinationNotFound { source, destination } => write!(
        f,
        "destination '{}' of copy item '{}' does not exist",
        destination.display(),
        source.display()
      ),
      Self::CopyToOutputDirectorySourceNewer {
        source,
        source_time,
        destination,
        destination_time,
      } => write!(
        f,
        "copy source '{}' ({}) is newer than destination '{}' ({})",
        source.display(),
        local_time(source_time),
        destination.display(),
        local_time(destination_time)
      ),
      Self::CopyAlwaysItemDiffers { source, destination } => write!(
        f,
        "copy-always item '{}' differs from destination '{}' in timestamp or size",
        source.display(),
        destination.display()
      ),
      Self::CopyFailed { message } => write!(f, "an accelerated copy failed: {message}"),
      Self::Exception { message } => write!(f, "an unexpected error occurred: {message}"),
    }
  }
}
