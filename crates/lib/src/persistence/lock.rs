//! Advisory lock on the state directory.
//!
//! Loads hold a shared lock and flushes an exclusive one, so concurrent
//! processes never observe a half-merged state file. Locks block until
//! granted and are released when the [`StateLock`] is dropped.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

const LOCK_FILENAME: &str = ".lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

#[derive(Debug, Error)]
pub enum StateLockError {
  #[error("Failed to create state directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("Failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("Failed to acquire lock on {}: {source}", lock_path.display())]
  LockFailed {
    lock_path: PathBuf,
    #[source]
    source: io::Error,
  },
}

pub struct StateLock {
  _file: File,
  lock_path: PathBuf,
}

impl StateLock {
  /// Lock the state directory `dir`, creating it if needed.
  pub fn acquire(dir: &Path, mode: LockMode) -> Result<Self, StateLockError> {
    let lock_path = dir.join(LOCK_FILENAME);

    if !dir.exists() {
      std::fs::create_dir_all(dir).map_err(StateLockError::CreateDir)?;
    }

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(StateLockError::OpenFile)?;

    lock(&file, mode).map_err(|source| StateLockError::LockFailed {
      lock_path: lock_path.clone(),
      source,
    })?;

    Ok(StateLock { _file: file, lock_path })
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

#[cfg(unix)]
fn lock(file: &File, mode: LockMode) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  let operation = match mode {
    LockMode::Shared => FlockOperation::LockShared,
    LockMode::Exclusive => FlockOperation::LockExclusive,
  };

  flock(file.as_fd(), operation).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn lock(file: &File, mode: LockMode) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;
  let flags = match mode {
    LockMode::Shared => 0,
    LockMode::Exclusive => LOCKFILE_EXCLUSIVE_LOCK,
  };

  // SAFETY: OVERLAPPED is a plain data struct that is valid when zero-initialized.
  // LockFileEx is safe to call with a valid file handle and zeroed OVERLAPPED.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn creates_directory_and_lock_file() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("state");
    let lock = StateLock::acquire(&dir, LockMode::Exclusive).unwrap();
    assert!(lock.lock_path().exists());
  }

  #[test]
  fn shared_locks_coexist() {
    let temp = TempDir::new().unwrap();
    let first = StateLock::acquire(temp.path(), LockMode::Shared).unwrap();
    let second = StateLock::acquire(temp.path(), LockMode::Shared).unwrap();
    assert_eq!(first.lock_path(), second.lock_path());
  }

  #[test]
  fn exclusive_lock_is_released_on_drop() {
    let temp = TempDir::new().unwrap();
    {
      let _lock = StateLock::acquire(temp.path(), LockMode::Exclusive).unwrap();
    }
    let lock = StateLock::acquire(temp.path(), LockMode::Exclusive).unwrap();
    assert!(lock.lock_path().exists());
  }
}
