//! The `ApplicationStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `jalm-store-sqlite`).
//! The reconciler and every read path depend on this abstraction, not on any
//! concrete backend.

use std::{future::Future, path::Path, str::FromStr};

use chrono::NaiveDateTime;

use crate::{
  Error,
  application::{ApplicationRecord, ApplicationStatus, Interview, NewApplication},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Ordering for [`ApplicationStore::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
  /// `created_at` descending, ties broken by id descending.
  #[default]
  Newest,
  Oldest,
  Company,
  Status,
  Id,
}

impl FromStr for SortKey {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Error> {
    match s.trim().to_ascii_lowercase().as_str() {
      "newest" => Ok(Self::Newest),
      "oldest" => Ok(Self::Oldest),
      "company" => Ok(Self::Company),
      "status" => Ok(Self::Status),
      "id" => Ok(Self::Id),
      _ => Err(Error::UnknownSortKey(s.to_owned())),
    }
  }
}

/// Parameters for [`ApplicationStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
  /// Case-insensitive substring filter over company and role.
  pub search: Option<String>,
  pub sort:   SortKey,
}

impl ListQuery {
  /// Every record, newest first.
  pub fn all() -> Self { Self::default() }

  pub fn sorted(sort: SortKey) -> Self { Self { search: None, sort } }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Classification hook for backend errors.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// True when the operation gave up waiting for a lock held by another
  /// writer. Such failures are retryable.
  fn is_busy(&self) -> bool;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a JALM application store backend.
///
/// Every method is a short, self-contained transaction. Backends must tolerate
/// other processes reading and writing the same store concurrently; a writer
/// that cannot get a lock within a bounded wait fails with an error whose
/// [`StoreError::is_busy`] is true.
pub trait ApplicationStore: Send + Sync {
  type Error: StoreError;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// List records matching `query`.
  fn list<'a>(
    &'a self,
    query: &'a ListQuery,
  ) -> impl Future<Output = Result<Vec<ApplicationRecord>, Self::Error>> + Send + 'a;

  /// Retrieve a record by id. Returns `None` if not found.
  fn get(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<ApplicationRecord>, Self::Error>> + Send + '_;

  /// The lowest-id record stored for `folder_path`, if any.
  fn find_by_folder_path<'a>(
    &'a self,
    folder_path: &'a Path,
  ) -> impl Future<Output = Result<Option<ApplicationRecord>, Self::Error>> + Send + 'a;

  /// Whether any record carries this exact (company, role) pair.
  fn exists<'a>(
    &'a self,
    company: &'a str,
    role: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Number of records for `company` whose role is `role` or a
  /// disambiguated `role (n)` variant of it.
  fn count_with_role_prefix<'a>(
    &'a self,
    company: &'a str,
    role: &'a str,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Total number of records. Cheap; used for change detection.
  fn count(&self) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Per-status totals, in [`ApplicationStatus::ALL`] order, zeroes included.
  fn status_counts(
    &self,
  ) -> impl Future<Output = Result<Vec<(ApplicationStatus, usize)>, Self::Error>>
  + Send
  + '_;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a new record with status `Applied` and return its id.
  fn insert(
    &self,
    input: NewApplication,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Returns `false` if no record has this id.
  fn update_status(
    &self,
    id: i64,
    status: ApplicationStatus,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Set `status` only while the record still has status `expected`.
  /// Returns `false` when the record is gone or was changed by someone else.
  fn update_status_if(
    &self,
    id: i64,
    expected: ApplicationStatus,
    status: ApplicationStatus,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Returns `false` if no record has this id.
  fn update_created_at(
    &self,
    id: i64,
    created_at: NaiveDateTime,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Point a record at a relocated folder. Returns `false` if no record has
  /// this id.
  fn update_folder_path<'a>(
    &'a self,
    id: i64,
    folder_path: &'a Path,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Returns `false` if no record has this id.
  fn delete(&self, id: i64) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every listed record in one transaction; all or none. Returns the
  /// number of rows that existed and were removed.
  fn delete_many<'a>(
    &'a self,
    ids: &'a [i64],
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// For every folder path held by more than one record, delete all but the
  /// lowest id. Each group is removed in its own transaction. Returns the
  /// number of records removed.
  fn collapse_duplicates_by_folder_path(
    &self,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Interviews ────────────────────────────────────────────────────────

  /// Log an interview round; its sequence is one past the existing count.
  fn add_interview(
    &self,
    application_id: i64,
    notes: Option<String>,
  ) -> impl Future<Output = Result<Interview, Self::Error>> + Send + '_;

  /// All interviews for an application in sequence order.
  fn list_interviews(
    &self,
    application_id: i64,
  ) -> impl Future<Output = Result<Vec<Interview>, Self::Error>> + Send + '_;
}
