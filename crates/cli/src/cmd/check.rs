//! Implementation of the `upcheck check` command.
//!
//! Plays the part of a build driver: every project of the solution publishes
//! its snapshot so the copy-item graph is complete, then the selected projects
//! are checked in reference order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use upcheck_lib::check::log::LogLevel;
use upcheck_lib::session::StatisticsSnapshot;
use upcheck_lib::solution::Solution;
use upcheck_lib::source::WatchSnapshotSource;
use upcheck_lib::util::paths::paths_equal;
use upcheck_lib::{BuildAction, CheckOutcome, CheckRequest, ProjectChecker, SolutionBuildContext};

use super::{load_config, open_state_store};
use crate::output::{
  OutputFormat, format_duration, print_info, print_json, print_log_line, print_stat, print_verdict, print_warning,
};

pub struct CheckArgs {
  pub projects: Vec<String>,
  pub validate: bool,
  pub rebuild: bool,
  pub target_framework: Option<String>,
  pub ignore_kinds: Vec<String>,
  pub accelerate: bool,
  pub verbose: bool,
}

#[derive(Serialize)]
struct CheckReport {
  outcomes: Vec<CheckOutcome>,
  statistics: StatisticsSnapshot,
}

/// Execute the check command.
///
/// Exits with status 1 when any checked project is out of date.
pub fn cmd_check(solution_path: &Path, args: CheckArgs, state_dir: Option<&Path>, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let solution = Solution::load(solution_path).context("Failed to load solution")?;

  let mut config = load_config(Some(solution.root()))?;
  if args.accelerate {
    config.acceleration_enabled_by_default = true;
  }
  if args.verbose {
    config.log_level = LogLevel::Verbose;
  }
  let state = open_state_store(&config, state_dir);
  let context = Arc::new(SolutionBuildContext::with_state_store(config, state));

  let selected = args
    .projects
    .iter()
    .map(|name| solution.find_project(name).map(|project| project.path.clone()))
    .collect::<Result<Vec<PathBuf>, _>>()?;
  let request = CheckRequest {
    build_action: if args.rebuild {
      BuildAction::Rebuild
    } else {
      BuildAction::Build
    },
    is_validation_run: args.validate,
    target_framework: args.target_framework,
    ignore_kinds: args.ignore_kinds.into_iter().collect::<HashSet<_>>(),
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(run_checks(&solution, &selected, &request, context))?;

  let all_up_to_date = report.outcomes.iter().all(|outcome| outcome.is_up_to_date);
  if output.is_json() {
    print_json(&report)?;
  } else {
    print_report(&report, args.verbose);
    println!();
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  if !all_up_to_date {
    std::process::exit(1);
  }
  Ok(())
}

async fn run_checks(
  solution: &Solution,
  selected: &[PathBuf],
  request: &CheckRequest,
  context: Arc<SolutionBuildContext>,
) -> Result<CheckReport> {
  let cancel = CancellationToken::new();
  let on_ctrl_c = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      on_ctrl_c.cancel();
    }
  });

  context.begin_solution_build();

  let mut checkers = Vec::with_capacity(solution.projects().len());
  for project in solution.build_order()? {
    let source = Arc::new(WatchSnapshotSource::new());
    source.publish(Solution::snapshot(project, 1));
    let checker = ProjectChecker::new(&project.path, source, context.clone());
    checker
      .refresh(&cancel)
      .await
      .with_context(|| format!("Failed to load {}", project.path.display()))?;
    checkers.push(checker);
  }

  let mut outcomes = Vec::new();
  for checker in &checkers {
    if !selected.is_empty() && !selected.iter().any(|path| paths_equal(path, checker.project_path())) {
      continue;
    }
    debug!(project = %checker.project_path().display(), "checking project");
    outcomes.push(checker.is_up_to_date(request, &cancel).await?);
  }

  let statistics = context.end_solution_build().context("Failed to save check state")?;
  Ok(CheckReport { outcomes, statistics })
}

fn print_report(report: &CheckReport, verbose: bool) {
  for outcome in &report.outcomes {
    print_verdict(outcome);
    for fault in &outcome.consistency_faults {
      print_warning(&fault.to_string());
    }
    if verbose || !outcome.is_up_to_date {
      for line in &outcome.log {
        print_log_line(line);
      }
    }
  }

  let statistics = &report.statistics;
  println!();
  print_info("Summary");
  print_stat("Checked", &statistics.checks.to_string());
  print_stat("Up to date", &statistics.up_to_date.to_string());
  print_stat("Out of date", &statistics.out_of_date.to_string());
  print_stat("Accelerated", &statistics.accelerated.to_string());
  print_stat("Files copied", &statistics.files_copied.to_string());
  if statistics.acceleration_candidates > 0 {
    print_stat("Acceleration candidates", &statistics.acceleration_candidates.to_string());
  }
}
