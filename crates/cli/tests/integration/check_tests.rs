use predicates::prelude::*;

use super::common::{ACCELERATED_SOLUTION, APP_SOLUTION, TestEnv, set_mtime};

#[test]
fn first_check_is_out_of_date() {
  let env = TestEnv::with_solution(APP_SOLUTION);
  env.built_app_tree();

  env
    .check(&[])
    .code(1)
    .stdout(predicate::str::contains("not up to date (FirstRun)"));
}

#[test]
fn check_after_a_recorded_build_is_up_to_date() {
  let env = TestEnv::with_solution(APP_SOLUTION);
  env.built_app_tree();
  env.record_build("app");

  env
    .check(&[])
    .success()
    .stdout(predicate::str::contains("app.proj: up to date"))
    .stdout(predicate::str::contains("Up to date: 1"));
}

#[test]
fn newer_input_is_out_of_date() {
  let env = TestEnv::with_solution(APP_SOLUTION);
  env.built_app_tree();
  env.record_build("app");
  set_mtime(&env.path("app/src/a.cs"), 150);

  env
    .check(&[])
    .code(1)
    .stdout(predicate::str::contains("InputNewerThanEarliestOutput"))
    .stdout(predicate::str::contains("Project is not up to date:"));
}

#[test]
fn validation_run_needs_no_recorded_build() {
  let env = TestEnv::with_solution(APP_SOLUTION);
  env.built_app_tree();

  env.check(&["--validate"]).success();
}

#[test]
fn rebuild_is_out_of_date() {
  let env = TestEnv::with_solution(APP_SOLUTION);
  env.built_app_tree();
  env.record_build("app");

  env
    .check(&["--rebuild"])
    .code(1)
    .stdout(predicate::str::contains("RebuildRequested"));
}

#[test]
fn unmatched_target_framework_is_out_of_date() {
  let env = TestEnv::with_solution(APP_SOLUTION);
  env.built_app_tree();
  env.record_build("app");

  env
    .check(&["--target-framework", "net6.0"])
    .code(1)
    .stdout(predicate::str::contains("NoMatchingConfiguration"));
  env.check(&["--target-framework", "net8.0"]).success();
}

#[test]
fn unknown_project_fails() {
  let env = TestEnv::with_solution(APP_SOLUTION);

  env
    .check(&["--project", "missing"])
    .code(2)
    .stderr(predicate::str::contains("no project in the solution matches 'missing'"));
}

#[test]
fn json_output_reports_outcomes_and_statistics() {
  let env = TestEnv::with_solution(APP_SOLUTION);
  env.built_app_tree();
  env.record_build("app");

  env
    .check(&["-o", "json"])
    .success()
    .stdout(predicate::str::contains("\"is_up_to_date\": true"))
    .stdout(predicate::str::contains("\"statistics\""));
}

#[test]
fn acceleration_copies_referenced_outputs() {
  let env = TestEnv::with_solution(ACCELERATED_SOLUTION);
  env.touch("lib/lib.proj", 10);
  env.touch("lib/bin/lib.dll", 100);
  env.touch("lib/bin/a.dll", 80);
  env.touch("app/app.proj", 10);
  env.touch("app/bin/app.dll", 100);
  env.record_build("app");

  env
    .check(&["--project", "app"])
    .success()
    .stdout(predicate::str::contains("copied 1 files"));
  assert!(env.path("app/bin/a.dll").exists());

  env
    .check(&["--project", "app"])
    .success()
    .stdout(predicate::str::contains("copied 1 files").not())
    .stdout(predicate::str::contains("Files copied: 0"));
}

#[test]
fn missing_copy_source_is_out_of_date() {
  let env = TestEnv::with_solution(ACCELERATED_SOLUTION);
  env.touch("lib/lib.proj", 10);
  env.touch("app/app.proj", 10);
  env.touch("app/bin/app.dll", 100);
  env.record_build("app");

  env
    .check(&["--project", "app"])
    .code(1)
    .stdout(predicate::str::contains("CopyToOutputDirectorySourceNotFound"));
}

#[test]
fn state_dir_flag_overrides_the_environment() {
  let env = TestEnv::with_solution(APP_SOLUTION);
  env.built_app_tree();
  let custom = env.path("custom-state");

  env
    .upcheck_cmd()
    .arg("--state-dir")
    .arg(&custom)
    .arg("built")
    .arg(env.solution_path())
    .args(["--project", "app"])
    .assert()
    .success();

  assert!(custom.join("state.json").exists());
  assert!(!env.state_path().join("state.json").exists());
}

#[test]
fn build_recorded_through_an_absolute_path_is_found_through_a_relative_one() {
  let env = TestEnv::with_solution(APP_SOLUTION);
  env.built_app_tree();
  env.record_build("app");

  env
    .upcheck_cmd()
    .args(["check", "solution.json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("app.proj: up to date"));

  let project = env.path("app/app.proj");
  env
    .upcheck_cmd()
    .args(["state", "list"])
    .assert()
    .success()
    .stdout(predicate::str::contains(project.display().to_string()))
    .stdout(predicate::str::contains("Records: 1"));
}
