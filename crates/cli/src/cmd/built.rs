//! Implementation of the `upcheck built` command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use upcheck_lib::solution::Solution;
use upcheck_lib::source::WatchSnapshotSource;
use upcheck_lib::{ProjectChecker, SolutionBuildContext};

use super::{load_config, open_state_store};
use crate::output::{format_time, print_stat, print_success};

/// Record a successful build of `project` that started at `started_at`, or now.
pub fn cmd_built(solution_path: &Path, project: &str, started_at: Option<&str>, state_dir: Option<&Path>) -> Result<()> {
  let solution = Solution::load(solution_path).context("Failed to load solution")?;
  let project = solution.find_project(project)?;
  let started_at = started_at
    .map(|text| {
      DateTime::parse_from_rfc3339(text)
        .map(|time| time.with_timezone(&Utc))
        .with_context(|| format!("Invalid build start time '{text}'"))
    })
    .transpose()?;

  let config = load_config(Some(solution.root()))?;
  let state = open_state_store(&config, state_dir);
  let context = Arc::new(SolutionBuildContext::with_state_store(config, state));

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let started_at = rt.block_on(async {
    let source = Arc::new(WatchSnapshotSource::new());
    source.publish(Solution::snapshot(project, 1));
    let checker = ProjectChecker::new(&project.path, source, context.clone());
    checker.refresh(&CancellationToken::new()).await?;

    // Taken after the refresh so that an item-set change it records does not
    // postdate the build it belongs to.
    let started_at = started_at.unwrap_or_else(Utc::now);
    checker.notify_build_starting(started_at).await;
    checker.notify_build_completed(true).await?;
    anyhow::Ok(started_at)
  })?;

  context.flush_state().context("Failed to save check state")?;

  print_success(&format!("Recorded a successful build of {}", project.path.display()));
  print_stat("Started", &format_time(Some(&started_at)));
  Ok(())
}
