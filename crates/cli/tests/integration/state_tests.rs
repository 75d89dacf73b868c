use predicates::prelude::*;

use super::common::{APP_SOLUTION, TestEnv};

#[test]
fn recorded_builds_are_listed() {
  let env = TestEnv::with_solution(APP_SOLUTION);
  env.built_app_tree();
  env.record_build("app");

  env
    .upcheck_cmd()
    .args(["state", "list"])
    .assert()
    .success()
    .stdout(predicate::str::contains("app.proj"))
    .stdout(predicate::str::contains("Debug|net8.0"))
    .stdout(predicate::str::contains("Records: 1"));
}

#[test]
fn state_list_json_has_build_times() {
  let env = TestEnv::with_solution(APP_SOLUTION);
  env.built_app_tree();
  env.record_build("app");

  env
    .upcheck_cmd()
    .args(["state", "list", "-o", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"last_successful_build_start\": \"1970-01-01T00:01:30Z\""));
}

#[test]
fn prune_removes_old_records() {
  let env = TestEnv::with_solution(APP_SOLUTION);
  env.built_app_tree();
  env.record_build("app");

  env
    .upcheck_cmd()
    .args(["state", "prune", "--older-than", "30d"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Pruned 1 records"));

  env
    .check(&[])
    .code(1)
    .stdout(predicate::str::contains("FirstRun"));
}

#[test]
fn clear_forgets_everything() {
  let env = TestEnv::with_solution(APP_SOLUTION);
  env.built_app_tree();
  env.record_build("app");

  env
    .upcheck_cmd()
    .args(["state", "clear"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Cleared 1 records"));

  env
    .upcheck_cmd()
    .args(["state", "list"])
    .assert()
    .success()
    .stdout(predicate::str::contains("No check state recorded"));
}
