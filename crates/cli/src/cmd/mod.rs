mod built;
mod check;
mod state;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use upcheck_lib::config::UpCheckConfig;
use upcheck_lib::persistence::StateStore;

pub use built::cmd_built;
pub use check::{CheckArgs, cmd_check};
pub use state::{cmd_state_clear, cmd_state_list, cmd_state_prune};

/// Load `upcheck.json` from the solution's directory, or the working
/// directory when there is no solution.
fn load_config(solution_dir: Option<&Path>) -> Result<UpCheckConfig> {
  let dir = match solution_dir {
    Some(dir) => dir.to_path_buf(),
    None => std::env::current_dir().context("Failed to determine the working directory")?,
  };
  UpCheckConfig::load_from_dir(&dir).context("Failed to load upcheck.json")
}

/// The state store, honouring `--state-dir` over every other source.
fn open_state_store(config: &UpCheckConfig, state_dir: Option<&Path>) -> StateStore {
  let dir: PathBuf = match state_dir {
    Some(dir) => dunce::simplified(dir).to_path_buf(),
    None => config.state_dir(),
  };
  StateStore::new(dir)
}
