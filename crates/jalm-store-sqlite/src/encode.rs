//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps use [`jalm_core::timestamp::FORMAT`]. Paths are stored as
//! (lossy) UTF-8 strings. Statuses are stored by display name.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use jalm_core::{
  application::{ApplicationRecord, ApplicationStatus, Interview},
  store::SortKey,
  timestamp,
};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_path(p: &Path) -> String { p.to_string_lossy().into_owned() }

pub fn encode_status(s: ApplicationStatus) -> &'static str { s.as_str() }

pub fn encode_ts(ts: NaiveDateTime) -> String { timestamp::format(ts) }

/// A missing or unreadable `created_at` decodes to the epoch; the next
/// reconciliation pass overwrites it with the folder's creation time.
fn decode_created_at(s: Option<&str>) -> NaiveDateTime {
  s.and_then(|s| timestamp::parse(s).ok()).unwrap_or_default()
}

/// NULL decodes to the default status. An unknown label is returned as-is
/// next to a placeholder status.
pub fn decode_status(label: Option<String>) -> (ApplicationStatus, Option<String>) {
  match label {
    None => (ApplicationStatus::default(), None),
    Some(label) => match label.parse() {
      Ok(status) => (status, None),
      Err(_) => (ApplicationStatus::default(), Some(label)),
    },
  }
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

pub fn order_by(sort: SortKey) -> &'static str {
  match sort {
    SortKey::Newest => "created_at DESC, id DESC",
    SortKey::Oldest => "created_at ASC, id ASC",
    SortKey::Company => {
      "company_name COLLATE NOCASE, role_name COLLATE NOCASE, id"
    }
    SortKey::Status => "status, created_at DESC, id DESC",
    SortKey::Id => "id",
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawApplication::from_row`].
pub const APPLICATION_COLUMNS: &str =
  "id, company_name, role_name, folder_path, status, created_at, job_description";

/// Raw values read directly from an `applications` row.
pub struct RawApplication {
  pub id:              i64,
  pub company:         String,
  pub role:            String,
  pub folder_path:     Option<String>,
  pub status:          Option<String>,
  pub created_at:      Option<String>,
  pub job_description: Option<String>,
}

impl RawApplication {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      company:         row.get(1)?,
      role:            row.get(2)?,
      folder_path:     row.get(3)?,
      status:          row.get(4)?,
      created_at:      row.get(5)?,
      job_description: row.get(6)?,
    })
  }

  /// Labels outside [`ApplicationStatus`] are kept in `unknown_status` so
  /// one foreign row never makes a whole listing unreadable.
  pub fn into_record(self) -> ApplicationRecord {
    let (status, unknown_status) = decode_status(self.status);
    ApplicationRecord {
      id: self.id,
      company: self.company,
      role: self.role,
      folder_path: self.folder_path.map(PathBuf::from).unwrap_or_default(),
      status,
      created_at: decode_created_at(self.created_at.as_deref()),
      job_description: self.job_description,
      unknown_status,
    }
  }
}

/// Raw values read directly from an `interviews` row.
pub struct RawInterview {
  pub id:             i64,
  pub application_id: i64,
  pub sequence:       i64,
  pub notes:          Option<String>,
  pub date:           Option<String>,
}

impl RawInterview {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      application_id: row.get(1)?,
      sequence:       row.get(2)?,
      notes:          row.get(3)?,
      date:           row.get(4)?,
    })
  }

  pub fn into_interview(self) -> Interview {
    Interview {
      id:             self.id,
      application_id: self.application_id,
      sequence:       u32::try_from(self.sequence).unwrap_or_default(),
      notes:          self.notes,
      date:           decode_created_at(self.date.as_deref()),
    }
  }
}
