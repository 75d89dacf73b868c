//! Per-check diagnostic log.
//!
//! Collects the human-readable lines explaining a verdict at the configured
//! [`LogLevel`], and mirrors them as `tracing` events tagged with the project.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::reason::OutOfDateReason;

/// How much detail a check records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
  None,
  Minimal,
  #[default]
  Info,
  Verbose,
}

impl std::str::FromStr for LogLevel {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "none" => Ok(Self::None),
      "minimal" => Ok(Self::Minimal),
      "info" => Ok(Self::Info),
      "verbose" => Ok(Self::Verbose),
      other => Err(format!("unknown log level: {other}")),
    }
  }
}

pub struct CheckLog {
  level: LogLevel,
  project: PathBuf,
  indent: usize,
  lines: Vec<String>,
}

impl CheckLog {
  pub fn new(level: LogLevel, project: &Path) -> Self {
    Self {
      level,
      project: project.to_path_buf(),
      indent: 0,
      lines: Vec::new(),
    }
  }

  pub fn minimal(&mut self, message: impl Into<String>) {
    self.write(LogLevel::Minimal, message.into());
  }

  pub fn info(&mut self, message: impl Into<String>) {
    self.write(LogLevel::Info, message.into());
  }

  pub fn verbose(&mut self, message: impl Into<String>) {
    self.write(LogLevel::Verbose, message.into());
  }

  pub fn indent(&mut self) {
    self.indent += 1;
  }

  pub fn unindent(&mut self) {
    self.indent = self.indent.saturating_sub(1);
  }

  pub fn reset_indent(&mut self) {
    self.indent = 0;
  }

  /// Record the reason a check failed.
  pub fn fail(&mut self, reason: &OutOfDateReason) {
    info!(
      project = %self.project.display(),
      code = reason.code(),
      "project is not up to date"
    );
    let saved = self.indent;
    self.indent = 0;
    self.write(LogLevel::Minimal, format!("Project is not up to date: {reason}"));
    self.indent = saved;
  }

  pub fn lines(&self) -> &[String] {
    &self.lines
  }

  pub fn into_lines(self) -> Vec<String> {
    self.lines
  }

  fn write(&mut self, level: LogLevel, message: String) {
    if self.level == LogLevel::None || level > self.level {
      return;
    }
    debug!(project = %self.project.display(), indent = self.indent, "{message}");
    self.lines.push(format!("{}{}", "    ".repeat(self.indent), message));
  }
}
