//! Error types for `jalm-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown application status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown sort key: {0:?}")]
  UnknownSortKey(String),

  #[error("invalid timestamp {value:?}: {reason}")]
  InvalidTimestamp { value: String, reason: String },

  #[error("{field} must not be empty")]
  EmptyField { field: &'static str },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
