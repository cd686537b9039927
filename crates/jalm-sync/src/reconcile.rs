//! Reconciliation pass: on-disk folders → minimal store operations.
//!
//! One pass runs five steps in a fixed order:
//!
//! 1. scan the folder tree;
//! 2. index a fresh listing of the store;
//! 3. insert unknown folders, resync dates and paths of known ones, and
//!    promote on interview evidence;
//! 4. collapse records that share a folder path;
//! 5. prune records whose folder no longer exists.
//!
//! Collapsing runs after insertion so it is the single authority on folder
//! uniqueness. Pruning runs last, against a fresh listing, so a record is
//! never deleted and re-created by the same pass. Running a pass twice with no
//! change in between leaves the second run with nothing to do.

use std::{
  collections::{HashMap, HashSet},
  fmt,
  path::{Path, PathBuf},
};

use jalm_core::{
  application::{ApplicationRecord, ApplicationStatus, NewApplication},
  candidate::ScanCandidate,
  rules,
  store::{ApplicationStore, ListQuery, SortKey},
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  scanner::{INTERVIEW_MARKER, Scan},
};

// ─── Report ──────────────────────────────────────────────────────────────────

/// Counts from one pass. Advisory; the end state is what matters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
  /// Role folders seen on disk.
  pub scanned:            usize,
  pub inserted:           usize,
  /// Records whose date, path or status changed.
  pub updated:            usize,
  /// `duplicates_removed + orphans_removed`.
  pub removed:            usize,
  pub duplicates_removed: usize,
  pub orphans_removed:    usize,
}

impl ReconcileReport {
  pub fn is_noop(&self) -> bool {
    self.inserted == 0 && self.updated == 0 && self.removed == 0
  }
}

impl fmt::Display for ReconcileReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} inserted, {} updated, {} removed",
      self.inserted, self.updated, self.removed
    )
  }
}

// ─── Matching ────────────────────────────────────────────────────────────────

/// Pair every candidate with the record that already stands for it.
///
/// A record whose `folder_path` is the candidate's path wins; otherwise the
/// lowest-id record with the same (company, role) is used, unless a path
/// match already claimed it. `records` must be sorted by ascending id.
pub fn match_candidates<'a>(
  candidates: &'a [ScanCandidate],
  records: &'a [ApplicationRecord],
) -> Vec<(&'a ScanCandidate, Option<&'a ApplicationRecord>)> {
  let mut by_path: HashMap<&Path, &ApplicationRecord> = HashMap::new();
  let mut by_key: HashMap<(&str, &str), &ApplicationRecord> = HashMap::new();
  for record in records {
    by_path.entry(record.folder_path.as_path()).or_insert(record);
    by_key
      .entry((record.company.as_str(), record.role.as_str()))
      .or_insert(record);
  }

  let mut claimed: HashSet<i64> = HashSet::new();
  let mut matched: Vec<Option<&ApplicationRecord>> = candidates
    .iter()
    .map(|c| {
      let hit = by_path.get(c.path.as_path()).copied();
      if let Some(record) = hit {
        claimed.insert(record.id);
      }
      hit
    })
    .collect();

  for (candidate, slot) in candidates.iter().zip(matched.iter_mut()) {
    if slot.is_some() {
      continue;
    }
    if let Some(record) = by_key.get(&candidate.key()).copied()
      && claimed.insert(record.id)
    {
      *slot = Some(record);
    }
  }

  candidates.iter().zip(matched).collect()
}

// ─── Reconciler ──────────────────────────────────────────────────────────────

/// Run one pass over `root` with the default interview marker.
pub async fn reconcile<S: ApplicationStore>(
  store: &S,
  root: &Path,
) -> Result<ReconcileReport> {
  Reconciler::new(store).run(root).await
}

/// Drives reconciliation passes against one store.
pub struct Reconciler<'s, S> {
  store:  &'s S,
  marker: String,
}

impl<'s, S: ApplicationStore> Reconciler<'s, S> {
  pub fn new(store: &'s S) -> Self {
    Self { store, marker: INTERVIEW_MARKER.to_owned() }
  }

  /// Use a different interview marker file name.
  pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
    self.marker = marker.into();
    self
  }

  /// Run one full pass. Steps are strictly sequential.
  ///
  /// Lock contention aborts the pass with a retryable
  /// [`Error::Contention`]; every step is safe to repeat.
  pub async fn run(&self, root: &Path) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    // A missing root means nothing to reconcile yet, not that every folder
    // is gone.
    if !tokio::fs::metadata(root).await.is_ok_and(|m| m.is_dir()) {
      debug!(root = %root.display(), "root directory missing; skipping pass");
      return Ok(report);
    }

    // 1. Scan.
    let candidates = self.scan(root).await?;
    report.scanned = candidates.len();

    // 2. Index a fresh listing.
    let records = self
      .store
      .list(&ListQuery::sorted(SortKey::Id))
      .await
      .map_err(Error::from_store)?;

    // 3. Insert or resync.
    for (candidate, existing) in match_candidates(&candidates, &records) {
      match existing {
        None => self.insert(candidate, &mut report).await?,
        Some(record) => self.resync(record, candidate, &mut report).await?,
      }
    }

    // 4. Collapse duplicates.
    report.duplicates_removed = self
      .store
      .collapse_duplicates_by_folder_path()
      .await
      .map_err(Error::from_store)?;

    // 5. Prune orphans.
    report.orphans_removed = self.prune().await?;
    report.removed = report.duplicates_removed + report.orphans_removed;

    if report.is_noop() {
      debug!(root = %root.display(), scanned = report.scanned, "reconciliation found nothing to do");
    } else {
      info!(
        root = %root.display(),
        scanned = report.scanned,
        inserted = report.inserted,
        updated = report.updated,
        duplicates_removed = report.duplicates_removed,
        orphans_removed = report.orphans_removed,
        "reconciliation pass complete"
      );
    }
    Ok(report)
  }

  async fn scan(&self, root: &Path) -> Result<Vec<ScanCandidate>> {
    let root: PathBuf = root.to_path_buf();
    let marker = self.marker.clone();
    Ok(
      tokio::task::spawn_blocking(move || {
        Scan::new(&root, marker).collect::<Vec<_>>()
      })
        .await?,
    )
  }

  async fn insert(
    &self,
    candidate: &ScanCandidate,
    report: &mut ReconcileReport,
  ) -> Result<()> {
    let input = match NewApplication::new(
      candidate.company.as_str(),
      candidate.role.as_str(),
      candidate.path.as_path(),
    ) {
      Ok(input) => input.created_at(candidate.created_at),
      Err(e) => {
        warn!(path = %candidate.path.display(), error = %e, "skipping folder");
        return Ok(());
      }
    };

    let id = self.store.insert(input).await.map_err(Error::from_store)?;
    report.inserted += 1;
    info!(id, company = %candidate.company, role = %candidate.role, "discovered application folder");

    if let Some(next) =
      rules::promotion_for(ApplicationStatus::Applied, candidate.has_interview_evidence)
    {
      self.promote(id, ApplicationStatus::Applied, next).await?;
    }
    Ok(())
  }

  async fn resync(
    &self,
    record: &ApplicationRecord,
    candidate: &ScanCandidate,
    report: &mut ReconcileReport,
  ) -> Result<()> {
    let mut changed = false;

    if record.folder_path != candidate.path {
      debug!(
        id = record.id,
        from = %record.folder_path.display(),
        to = %candidate.path.display(),
        "folder relocated"
      );
      self
        .store
        .update_folder_path(record.id, &candidate.path)
        .await
        .map_err(Error::from_store)?;
      changed = true;
    }

    // The filesystem is authoritative for the creation date.
    if record.created_at != candidate.created_at {
      debug!(
        id = record.id,
        from = %record.created_at,
        to = %candidate.created_at,
        "resyncing creation date"
      );
      self
        .store
        .update_created_at(record.id, candidate.created_at)
        .await
        .map_err(Error::from_store)?;
      changed = true;
    }

    // Labels written by other tools are never promoted over.
    if let Some(current) = record.known_status()
      && let Some(next) =
        rules::promotion_for(current, candidate.has_interview_evidence)
    {
      changed |= self.promote(record.id, current, next).await?;
    }

    if changed {
      report.updated += 1;
    }
    Ok(())
  }

  /// Apply a promotion unless another writer changed the status since it was
  /// read.
  async fn promote(
    &self,
    id: i64,
    from: ApplicationStatus,
    to: ApplicationStatus,
  ) -> Result<bool> {
    let applied = self
      .store
      .update_status_if(id, from, to)
      .await
      .map_err(Error::from_store)?;
    if applied {
      info!(id, %from, %to, "promoted on interview evidence");
    } else {
      debug!(id, "status changed concurrently; promotion skipped");
    }
    Ok(applied)
  }

  async fn prune(&self) -> Result<usize> {
    let records = self
      .store
      .list(&ListQuery::sorted(SortKey::Id))
      .await
      .map_err(Error::from_store)?;

    let orphans: Vec<i64> = tokio::task::spawn_blocking(move || {
      records
        .into_iter()
        .filter(|r| !r.is_live())
        .map(|r| r.id)
        .collect()
    })
    .await?;

    if orphans.is_empty() {
      return Ok(0);
    }
    debug!(?orphans, "pruning records without a folder");
    self
      .store
      .delete_many(&orphans)
      .await
      .map_err(Error::from_store)
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
