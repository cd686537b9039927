//! Scan candidates: transient descriptions of folders found on disk.

use std::path::PathBuf;

use chrono::NaiveDateTime;

/// One `root/company/role` directory observed during a scan. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCandidate {
  pub company:                String,
  pub role:                   String,
  pub path:                   PathBuf,
  pub created_at:             NaiveDateTime,
  pub has_interview_evidence: bool,
}

impl ScanCandidate {
  pub fn key(&self) -> (&str, &str) { (&self.company, &self.role) }
}
