//! Lexical path normalization and platform-aware path identity.
//!
//! Every path the checker compares goes through [`make_rooted`] first, so
//! that `bin/../bin/app.dll` and `bin/app.dll` name the same file. Identity
//! for map keys uses [`PathKey`], which folds case where the platform's file
//! system does.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::platform::CASE_INSENSITIVE_PATHS;

/// Resolve `path` against `base` (when relative) and normalize the result.
pub fn make_rooted(base: &Path, path: &Path) -> PathBuf {
  if path.is_absolute() {
    normalize(path)
  } else {
    normalize(&base.join(path))
  }
}

/// Resolve `path` against the working directory (when relative) and
/// normalize the result.
pub fn make_absolute(path: &Path) -> io::Result<PathBuf> {
  Ok(normalize(&std::path::absolute(path)?))
}

/// Lexically normalize a path: drop `.` segments and fold `..` into its parent.
///
/// Does not touch the file system, so symlinks are not resolved.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in dunce::simplified(path).components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if matches!(out.components().next_back(), Some(Component::Normal(_))) {
          out.pop();
        } else if !out.has_root() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

/// Whether two paths name the same file under the platform's comparison rules.
pub fn paths_equal(a: &Path, b: &Path) -> bool {
  PathKey::new(a) == PathKey::new(b)
}

/// Comparison key for a normalized path.
///
/// Separators are unified and, on Windows and macOS, case is folded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathKey(String);

impl PathKey {
  pub fn new(path: &Path) -> Self {
    let normalized = normalize(path);
    let mut key = normalized.to_string_lossy().into_owned();
    if cfg!(windows) {
      key = key.replace('\\', "/");
    }
    if CASE_INSENSITIVE_PATHS {
      key = key.to_lowercase();
    }
    Self(key)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&Path> for PathKey {
  fn from(path: &Path) -> Self {
    Self::new(path)
  }
}

impl fmt::Display for PathKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}
