//! Error type for the reconciliation engine.

use std::path::PathBuf;

use jalm_core::store::StoreError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// Another writer held the store lock past the busy timeout.
  #[error("store is busy, try again: {0}")]
  Contention(#[source] BoxError),

  #[error("store error: {0}")]
  Store(#[source] BoxError),

  #[error("core error: {0}")]
  Core(#[from] jalm_core::Error),

  #[error("root directory does not exist: {}", .0.display())]
  MissingRoot(PathBuf),

  #[error("{}: {source}", path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("application not found: {0}")]
  NotFound(i64),

  #[error("{name:?} has no characters usable in a folder name")]
  InvalidName { name: String },

  #[error("folder {} already belongs to application {id}", path.display())]
  FolderInUse { path: PathBuf, id: i64 },

  #[error("no helper command configured")]
  NoHelperCommand,

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("background task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl Error {
  /// Classify a backend error: lock contention is retryable, the rest is not.
  pub fn from_store<E: StoreError>(e: E) -> Self {
    if e.is_busy() {
      Error::Contention(Box::new(e))
    } else {
      Error::Store(Box::new(e))
    }
  }

  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Error::Io { path: path.into(), source }
  }

  /// True for failures a caller may simply retry later.
  pub fn is_retryable(&self) -> bool { matches!(self, Error::Contention(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
