//! Terminal rendering shared by the `upcheck` commands.
//!
//! Check verdicts print as one colored line per project with the check log
//! indented beneath. `check` and `state list` emit JSON instead with `--output json`.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};
use upcheck_lib::CheckOutcome;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

/// A UTC timestamp in local time, or "never".
pub fn format_time(time: Option<&DateTime<Utc>>) -> String {
  match time {
    Some(time) => time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
    None => "never".to_string(),
  }
}

/// Configuration dimensions as `Debug|net8.0`, or `(default)` when there are none.
pub fn format_dimensions(dimensions: &BTreeMap<String, String>) -> String {
  if dimensions.is_empty() {
    return "(default)".to_string();
  }
  dimensions.values().map(String::as_str).collect::<Vec<_>>().join("|")
}

/// The one-line verdict for a checked project.
pub fn verdict(outcome: &CheckOutcome) -> String {
  let name = outcome.project_path.display();
  match &outcome.reason {
    None if outcome.copy_count > 0 => format!("{name}: up to date (copied {} files)", outcome.copy_count),
    None => format!("{name}: up to date"),
    Some(reason) => format!("{name}: not up to date ({})", reason.code()),
  }
}

pub fn print_verdict(outcome: &CheckOutcome) {
  if outcome.is_up_to_date {
    print_success(&verdict(outcome));
  } else {
    print_failure(&verdict(outcome));
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_failure(message: &str) {
  println!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()),
    message
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// One line of a check log, indented under its project.
pub fn print_log_line(line: &str) {
  println!("    {}", line.if_supports_color(Stream::Stdout, |s| s.dimmed()));
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use upcheck_lib::check::reason::OutOfDateReason;

  use super::*;

  fn outcome(reason: Option<OutOfDateReason>, copy_count: usize) -> CheckOutcome {
    CheckOutcome {
      project_path: PathBuf::from("/repo/app/app.proj"),
      is_up_to_date: reason.is_none(),
      reason,
      copy_count,
      is_acceleration_candidate: false,
      consistency_faults: Vec::new(),
      configurations_checked: 1,
      duration_ms: 0,
      log: Vec::new(),
    }
  }

  #[test]
  fn test_verdict() {
    assert_eq!(verdict(&outcome(None, 0)), "/repo/app/app.proj: up to date");
    assert_eq!(verdict(&outcome(None, 3)), "/repo/app/app.proj: up to date (copied 3 files)");
    assert_eq!(
      verdict(&outcome(Some(OutOfDateReason::FirstRun), 0)),
      "/repo/app/app.proj: not up to date (FirstRun)"
    );
  }

  #[test]
  fn test_format_dimensions() {
    assert_eq!(format_dimensions(&BTreeMap::new()), "(default)");
    let dimensions = BTreeMap::from([
      ("Configuration".to_string(), "Debug".to_string()),
      ("TargetFramework".to_string(), "net8.0".to_string()),
    ]);
    assert_eq!(format_dimensions(&dimensions), "Debug|net8.0");
  }

  #[test]
  fn test_truncate_hash() {
    assert_eq!(truncate_hash("abcdef123456789"), "abcdef123456");
    assert_eq!(truncate_hash("short"), "short");
    assert_eq!(truncate_hash(""), "");
  }

  #[test]
  fn test_format_duration() {
    assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
    assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
  }

  #[test]
  fn test_format_time_without_a_value() {
    assert_eq!(format_time(None), "never");
  }
}
