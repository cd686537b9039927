//! Cheap change detection between full passes, and the `watch` loop.

use std::{future::Future, path::Path, time::Duration};

use jalm_core::store::ApplicationStore;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{Error, Result, reconcile::Reconciler, scanner::tree_fingerprint};

/// Outcome of one [`ChangeMonitor::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
  Unchanged,
  /// `previous` is `None` on the first check.
  Changed { previous: Option<usize>, current: usize },
}

impl Drift {
  pub fn is_changed(&self) -> bool { matches!(self, Drift::Changed { .. }) }
}

/// Remembers the record count and folder tree fingerprint seen last, so
/// another writer's inserts or deletes, and folders created or removed on
/// disk, can be noticed without a full pass.
#[derive(Debug, Default)]
pub struct ChangeMonitor {
  last_count: Option<usize>,
  last_tree:  Option<u64>,
}

impl ChangeMonitor {
  pub fn new() -> Self { Self::default() }

  pub fn last_count(&self) -> Option<usize> { self.last_count }

  pub async fn check<S: ApplicationStore>(&mut self, store: &S) -> Result<Drift> {
    let current = store.count().await.map_err(Error::from_store)?;
    let previous = self.last_count.replace(current);
    Ok(if previous == Some(current) {
      Drift::Unchanged
    } else {
      Drift::Changed { previous, current }
    })
  }

  /// True when the folder tree under `root` differs from the last call.
  /// The first call always reports a change.
  pub async fn tree_changed(&mut self, root: &Path) -> Result<bool> {
    let root = root.to_path_buf();
    let current = tokio::task::spawn_blocking(move || tree_fingerprint(&root)).await?;
    let first = self.last_tree.is_none();
    let previous = std::mem::replace(&mut self.last_tree, current);
    Ok(first || previous != current)
  }

  /// Record the count left behind by a pass this process ran itself.
  pub fn mark_synced(&mut self, count: usize) { self.last_count = Some(count); }

  /// Forget everything, so the next checks report a change.
  pub fn reset(&mut self) { *self = Self::default(); }
}

// ─── Watch loop ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct WatchSchedule {
  /// How often the record count and folder tree are checked.
  pub poll:      Duration,
  /// Longest time between two full passes.
  pub full_scan: Duration,
}

/// Reconcile `root` once, then keep it reconciled until `shutdown` resolves.
///
/// A full pass runs when the record count drifted, the folder tree changed,
/// or `full_scan` elapsed. Contention is logged and retried on the next tick;
/// any other error ends the loop.
pub async fn watch<S, F>(
  store: &S,
  root: &Path,
  schedule: WatchSchedule,
  shutdown: F,
) -> Result<()>
where
  S: ApplicationStore,
  F: Future<Output = ()>,
{
  let reconciler = Reconciler::new(store);
  let mut monitor = ChangeMonitor::new();
  let mut last_pass: Option<Instant> = None;

  let mut ticker = tokio::time::interval(schedule.poll);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
  tokio::pin!(shutdown);

  info!(root = %root.display(), poll = ?schedule.poll, "watching");
  loop {
    tokio::select! {
      biased;
      _ = &mut shutdown => {
        info!("shutdown requested");
        return Ok(());
      }
      _ = ticker.tick() => {}
    }

    let due = last_pass.is_none_or(|at| at.elapsed() >= schedule.full_scan);
    let outcome = async {
      let drift = monitor.check(store).await?;
      let tree_moved = monitor.tree_changed(root).await?;
      if !(due || drift.is_changed() || tree_moved) {
        return Ok(false);
      }
      if let Drift::Changed { previous: Some(previous), current } = drift {
        debug!(previous, current, "record count drifted");
      }
      if tree_moved {
        debug!("folder tree changed");
      }
      reconciler.run(root).await?;
      monitor.mark_synced(store.count().await.map_err(Error::from_store)?);
      Ok::<_, Error>(true)
    }
    .await;

    match outcome {
      Ok(true) => last_pass = Some(Instant::now()),
      Ok(false) => {}
      Err(e) if e.is_retryable() => {
        // The change that triggered this pass is still pending.
        monitor.reset();
        warn!(error = %e, "store busy; retrying on next tick");
      }
      Err(e) => return Err(e),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use jalm_core::{
    application::NewApplication,
    store::{ApplicationStore, ListQuery},
  };
  use jalm_store_sqlite::SqliteStore;

  use super::*;

  #[tokio::test]
  async fn first_check_reports_change_then_settles() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let mut monitor = ChangeMonitor::new();

    assert_eq!(
      monitor.check(&store).await.unwrap(),
      Drift::Changed { previous: None, current: 0 }
    );
    assert_eq!(monitor.check(&store).await.unwrap(), Drift::Unchanged);

    store
      .insert(NewApplication::new("Acme", "Engineer", "/x").unwrap())
      .await
      .unwrap();
    assert_eq!(
      monitor.check(&store).await.unwrap(),
      Drift::Changed { previous: Some(0), current: 1 }
    );
    assert_eq!(monitor.last_count(), Some(1));
  }

  #[tokio::test]
  async fn mark_synced_suppresses_own_changes() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let mut monitor = ChangeMonitor::new();
    monitor.check(&store).await.unwrap();

    store
      .insert(NewApplication::new("Acme", "Engineer", "/x").unwrap())
      .await
      .unwrap();
    monitor.mark_synced(1);
    assert_eq!(monitor.check(&store).await.unwrap(), Drift::Unchanged);
  }

  #[tokio::test]
  async fn tree_change_detection() {
    let dir = tempfile::tempdir().unwrap();
    let mut monitor = ChangeMonitor::new();
    assert!(monitor.tree_changed(dir.path()).await.unwrap());
    assert!(!monitor.tree_changed(dir.path()).await.unwrap());

    fs::create_dir_all(dir.path().join("Acme/Engineer")).unwrap();
    assert!(monitor.tree_changed(dir.path()).await.unwrap());
    assert!(!monitor.tree_changed(dir.path()).await.unwrap());

    monitor.reset();
    assert!(monitor.tree_changed(dir.path()).await.unwrap());
  }

  #[tokio::test]
  async fn watch_picks_up_new_folders_before_full_scan_is_due() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("Acme/Engineer")).unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();

    let schedule = WatchSchedule {
      poll:      Duration::from_millis(10),
      full_scan: Duration::from_secs(1800),
    };
    let root = dir.path().to_path_buf();
    let second = root.join("Globex/Analyst");
    let shutdown = async {
      for _ in 0..300 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if store.count().await.unwrap() == 1 && !second.exists() {
          fs::create_dir_all(&second).unwrap();
        }
        if store.count().await.unwrap() == 2 {
          return;
        }
      }
    };

    watch(&store, &root, schedule, shutdown).await.unwrap();
    let records = store.list(&ListQuery::all()).await.unwrap();
    assert_eq!(records.len(), 2);
  }

  #[tokio::test]
  async fn watch_prunes_removed_folders_before_full_scan_is_due() {
    let dir = tempfile::tempdir().unwrap();
    let doomed = dir.path().join("Acme/Engineer");
    fs::create_dir_all(&doomed).unwrap();
    fs::create_dir_all(dir.path().join("Globex/Analyst")).unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();

    let schedule = WatchSchedule {
      poll:      Duration::from_millis(10),
      full_scan: Duration::from_secs(1800),
    };
    let shutdown = async {
      for _ in 0..300 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let n = store.count().await.unwrap();
        if n == 2 && doomed.exists() {
          fs::remove_dir_all(&doomed).unwrap();
        }
        if n == 1 && !doomed.exists() {
          return;
        }
      }
    };

    watch(&store, dir.path(), schedule, shutdown).await.unwrap();
    let records = store.list(&ListQuery::all()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].company, "Globex");
  }

  #[tokio::test]
  async fn watch_stops_immediately_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();
    let schedule = WatchSchedule {
      poll:      Duration::from_secs(3600),
      full_scan: Duration::from_secs(3600),
    };
    watch(&store, dir.path(), schedule, std::future::ready(()))
      .await
      .unwrap();
  }
}
