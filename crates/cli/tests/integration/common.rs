//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use filetime::FileTime;
use tempfile::TempDir;

/// One application project compiling `src/a.cs` into `bin/app.dll`.
pub const APP_SOLUTION: &str = r#"{
  "projects": [
    {
      "path": "app/app.proj",
      "configurations": [
        {
          "dimensions": { "Configuration": "Debug", "TargetFramework": "net8.0" },
          "input": {
            "input_items_by_type": { "Compile": ["src/a.cs"] },
            "output_items_by_kind_by_set": { "": { "Output": ["bin/app.dll"] } }
          }
        }
      ]
    }
  ]
}"#;

/// An application referencing a library that contributes `a.dll` to its output.
pub const ACCELERATED_SOLUTION: &str = r#"{
  "projects": [
    {
      "path": "app/app.proj",
      "configurations": [
        {
          "dimensions": { "Configuration": "Debug" },
          "input": {
            "build_acceleration": "enabled",
            "output_items_by_kind_by_set": { "": { "Output": ["bin/app.dll"] } },
            "copy_data": {
              "target_path": "bin/app.dll",
              "produces_reference_assembly": true,
              "referenced_project_target_paths": ["../lib/bin/lib.dll"]
            }
          }
        }
      ]
    },
    {
      "path": "lib/lib.proj",
      "configurations": [
        {
          "dimensions": { "Configuration": "Debug" },
          "input": {
            "output_items_by_kind_by_set": { "": { "Output": ["bin/lib.dll"] } },
            "copy_data": {
              "target_path": "bin/lib.dll",
              "produces_reference_assembly": true,
              "copy_items": [
                { "source_path": "bin/a.dll", "relative_target_path": "a.dll", "copy_type": "preserve_newest" }
              ]
            }
          }
        }
      ]
    }
  ]
}"#;

/// RFC 3339 form of T=90.
pub const BUILD_STARTED_AT: &str = "1970-01-01T00:01:30Z";

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the solution tree and
/// the persisted check state.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create an environment whose `solution.json` has `content`.
  pub fn with_solution(content: &str) -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("solution.json"), content).unwrap();
    Self { temp }
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  pub fn solution_path(&self) -> PathBuf {
    self.path("solution.json")
  }

  pub fn state_path(&self) -> PathBuf {
    self.path("state")
  }

  /// Create `relative` if needed and pin its modification time to `secs`.
  pub fn touch(&self, relative: &str, secs: i64) {
    let path = self.path(relative);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    if !path.exists() {
      std::fs::write(&path, relative).unwrap();
    }
    set_mtime(&path, secs);
  }

  /// Lay out the application of [`APP_SOLUTION`] as freshly built at T=100.
  pub fn built_app_tree(&self) {
    self.touch("app/app.proj", 10);
    self.touch("app/src/a.cs", 50);
    self.touch("app/bin/app.dll", 100);
  }

  /// Get a pre-configured Command for the upcheck binary.
  ///
  /// Sets `UPCHECK_STATE_DIR` to the isolated state path, and the cache
  /// variables to the temp directory in case it is ever ignored.
  pub fn upcheck_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("upcheck");
    cmd.env("UPCHECK_STATE_DIR", self.state_path());
    cmd.env("XDG_CACHE_HOME", self.path("cache"));
    cmd.env("LOCALAPPDATA", self.path("cache")); // For Windows
    cmd.current_dir(self.temp.path());
    cmd
  }

  /// `upcheck check <solution> <args>`.
  pub fn check(&self, args: &[&str]) -> assert_cmd::assert::Assert {
    self
      .upcheck_cmd()
      .arg("check")
      .arg(self.solution_path())
      .args(args)
      .assert()
  }

  /// Record a successful build of `project` that started at T=90.
  pub fn record_build(&self, project: &str) {
    self
      .upcheck_cmd()
      .arg("built")
      .arg(self.solution_path())
      .args(["--project", project, "--started-at", BUILD_STARTED_AT])
      .assert()
      .success();
  }
}

pub fn set_mtime(path: &Path, secs: i64) {
  filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
}
