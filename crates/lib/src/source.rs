//! Boundaries with the host: where snapshots come from and whether the host
//! is still busy with work that affects the build.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::project::ProjectSnapshot;

#[derive(Debug, Error)]
pub enum SourceError {
  #[error("snapshot source closed before a snapshot was published")]
  Closed,
}

/// Supplier of versioned project snapshots.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
  /// The newest snapshot, waiting for the first one if none was published yet.
  async fn latest(&self) -> Result<Arc<ProjectSnapshot>, SourceError>;

  /// The newest snapshot once its version is at least `min_version`.
  async fn wait_for_version(&self, min_version: u64) -> Result<Arc<ProjectSnapshot>, SourceError>;
}

/// In-process [`SnapshotSource`] backed by a watch channel.
///
/// Publishing coalesces: a waiter only ever sees the newest snapshot, and
/// snapshots older than the current one are ignored.
pub struct WatchSnapshotSource {
  sender: watch::Sender<Option<Arc<ProjectSnapshot>>>,
}

impl Default for WatchSnapshotSource {
  fn default() -> Self {
    Self::new()
  }
}

impl WatchSnapshotSource {
  pub fn new() -> Self {
    let (sender, _) = watch::channel(None);
    Self { sender }
  }

  /// Publish `snapshot`. Returns false if a snapshot with the same or a newer
  /// version is already current.
  pub fn publish(&self, snapshot: ProjectSnapshot) -> bool {
    let version = snapshot.version;
    let published = self.sender.send_if_modified(|current| match current {
      Some(existing) if existing.version >= version => false,
      _ => {
        *current = Some(Arc::new(snapshot));
        true
      }
    });
    debug!(version, published, "publishing project snapshot");
    published
  }

  /// Current version, if anything was published.
  pub fn version(&self) -> Option<u64> {
    self.sender.borrow().as_ref().map(|snapshot| snapshot.version)
  }
}

#[async_trait]
impl SnapshotSource for WatchSnapshotSource {
  async fn latest(&self) -> Result<Arc<ProjectSnapshot>, SourceError> {
    self.wait_for_version(0).await
  }

  async fn wait_for_version(&self, min_version: u64) -> Result<Arc<ProjectSnapshot>, SourceError> {
    let mut receiver = self.sender.subscribe();
    let current = receiver
      .wait_for(|snapshot| snapshot.as_ref().is_some_and(|s| s.version >= min_version))
      .await
      .map_err(|_| SourceError::Closed)?;
    (*current).clone().ok_or(SourceError::Closed)
  }
}

/// The host environment the build runs in.
pub trait BuildHost: Send + Sync {
  /// Whether background work that can change build inputs is still running.
  fn has_pending_critical_tasks(&self) -> bool;
}

/// A host with no background work.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleBuildHost;

impl BuildHost for IdleBuildHost {
  fn has_pending_critical_tasks(&self) -> bool {
    false
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  fn snapshot(version: u64) -> ProjectSnapshot {
    ProjectSnapshot {
      version,
      configurations: Vec::new(),
    }
  }

  #[tokio::test]
  async fn latest_returns_published_snapshot() {
    let source = WatchSnapshotSource::new();
    assert!(source.publish(snapshot(1)));
    assert_eq!(source.latest().await.unwrap().version, 1);
  }

  #[tokio::test]
  async fn older_versions_are_ignored() {
    let source = WatchSnapshotSource::new();
    source.publish(snapshot(3));
    assert!(!source.publish(snapshot(2)));
    assert!(!source.publish(snapshot(3)));
    assert_eq!(source.version(), Some(3));
  }

  #[tokio::test]
  async fn waits_for_a_newer_version() {
    let source = Arc::new(WatchSnapshotSource::new());
    source.publish(snapshot(1));

    let waiter = {
      let source = source.clone();
      tokio::spawn(async move { source.wait_for_version(2).await.unwrap().version })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiter.is_finished());

    source.publish(snapshot(2));
    assert_eq!(waiter.await.unwrap(), 2);
  }
}
