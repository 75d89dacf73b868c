//! Solution-wide settings.
//!
//! Read from an optional `upcheck.json` next to the solution file. Every field
//! has a default, so an absent or empty file is valid.
//!
//! ```json
//! {
//!   "acceleration_enabled_by_default": true,
//!   "log_level": "verbose",
//!   "state_dir": ".upcheck"
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::check::log::LogLevel;
use crate::consts::CONFIG_FILENAME;
use crate::platform::paths::{cache_dir, env_state_dir};
use crate::util::paths::make_rooted;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse config {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpCheckConfig {
  /// Accelerate projects that neither enable nor disable acceleration.
  pub acceleration_enabled_by_default: bool,
  pub log_level: LogLevel,
  /// Where check state is persisted. Relative paths are resolved against the
  /// directory holding the config file.
  pub state_dir: Option<PathBuf>,
}

impl Default for UpCheckConfig {
  fn default() -> Self {
    Self {
      acceleration_enabled_by_default: false,
      log_level: LogLevel::Info,
      state_dir: None,
    }
  }
}

impl UpCheckConfig {
  /// Load `path`, falling back to defaults if it does not exist.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Self::default());
      }
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    let mut config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    if let (Some(dir), Some(parent)) = (config.state_dir.as_ref(), path.parent()) {
      config.state_dir = Some(make_rooted(parent, dir));
    }
    debug!(path = %path.display(), ?config, "loaded config");
    Ok(config)
  }

  /// Load `upcheck.json` from `dir`.
  pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
    Self::load(&dir.join(CONFIG_FILENAME))
  }

  /// The state directory: `UPCHECK_STATE_DIR`, then the configured one, then
  /// the platform cache directory.
  pub fn state_dir(&self) -> PathBuf {
    env_state_dir()
      .or_else(|| self.state_dir.clone())
      .unwrap_or_else(cache_dir)
  }
}
