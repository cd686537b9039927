//! Application records: one per `Company/Role` folder on disk.

use std::{fmt, path::PathBuf, str::FromStr};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Where an application stands. `Applied` is the initial state.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize,
  Deserialize,
)]
pub enum ApplicationStatus {
  #[default]
  Applied,
  #[serde(alias = "Interviewing")]
  Interviewed,
  Rejected,
  Offer,
  Ghosted,
}

impl ApplicationStatus {
  pub const ALL: [ApplicationStatus; 5] = [
    Self::Applied,
    Self::Interviewed,
    Self::Rejected,
    Self::Offer,
    Self::Ghosted,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Applied => "Applied",
      Self::Interviewed => "Interviewed",
      Self::Rejected => "Rejected",
      Self::Offer => "Offer",
      Self::Ghosted => "Ghosted",
    }
  }
}

impl fmt::Display for ApplicationStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ApplicationStatus {
  type Err = Error;

  /// Case-insensitive. `Interviewing` is the label older rows carry.
  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "applied" => Ok(Self::Applied),
      "interviewed" | "interviewing" => Ok(Self::Interviewed),
      "rejected" => Ok(Self::Rejected),
      "offer" => Ok(Self::Offer),
      "ghosted" => Ok(Self::Ghosted),
      _ => Err(Error::UnknownStatus(s.to_owned())),
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A persisted application.
///
/// `created_at` mirrors the folder's filesystem creation time, not the row's
/// insertion time; the reconciler keeps the two in sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
  pub id:              i64,
  pub company:         String,
  pub role:            String,
  pub folder_path:     PathBuf,
  pub status:          ApplicationStatus,
  pub created_at:      NaiveDateTime,
  pub job_description: Option<String>,
  /// Stored status label when it is none of [`ApplicationStatus`], e.g.
  /// written by another tool. `status` is then only a placeholder.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unknown_status:  Option<String>,
}

impl ApplicationRecord {
  /// A record is live while its folder exists.
  pub fn is_live(&self) -> bool {
    !self.folder_path.as_os_str().is_empty() && self.folder_path.is_dir()
  }

  /// The status as stored, including labels this crate does not know.
  pub fn status_label(&self) -> &str {
    self.unknown_status.as_deref().unwrap_or(self.status.as_str())
  }

  /// The status automatic rules may act on. `None` for unknown labels.
  pub fn known_status(&self) -> Option<ApplicationStatus> {
    self.unknown_status.is_none().then_some(self.status)
  }
}

/// Input to [`ApplicationStore::insert`](crate::store::ApplicationStore::insert).
///
/// When `created_at` is `None` the store stamps the current time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
  pub company:         String,
  pub role:            String,
  pub folder_path:     PathBuf,
  pub created_at:      Option<NaiveDateTime>,
  pub job_description: Option<String>,
}

impl NewApplication {
  /// Build an insertion request, rejecting blank company or role names.
  pub fn new(
    company: impl Into<String>,
    role: impl Into<String>,
    folder_path: impl Into<PathBuf>,
  ) -> Result<Self> {
    let company = company.into();
    let role = role.into();
    if company.trim().is_empty() {
      return Err(Error::EmptyField { field: "company" });
    }
    if role.trim().is_empty() {
      return Err(Error::EmptyField { field: "role" });
    }
    Ok(Self {
      company,
      role,
      folder_path: folder_path.into(),
      created_at: None,
      job_description: None,
    })
  }

  pub fn created_at(mut self, at: NaiveDateTime) -> Self {
    self.created_at = Some(at);
    self
  }

  pub fn job_description(mut self, text: impl Into<String>) -> Self {
    let text = text.into();
    self.job_description = (!text.trim().is_empty()).then_some(text);
    self
  }
}

// ─── Interviews ──────────────────────────────────────────────────────────────

/// One logged interview round. `sequence` starts at 1 per application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interview {
  pub id:             i64,
  pub application_id: i64,
  pub sequence:       u32,
  pub notes:          Option<String>,
  pub date:           NaiveDateTime,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_round_trips_through_display() {
    for status in ApplicationStatus::ALL {
      assert_eq!(status.to_string().parse::<ApplicationStatus>().unwrap(), status);
    }
  }

  #[test]
  fn legacy_interviewing_label_is_interviewed() {
    assert_eq!(
      "Interviewing".parse::<ApplicationStatus>().unwrap(),
      ApplicationStatus::Interviewed
    );
    let from_json: ApplicationStatus =
      serde_json::from_str("\"Interviewing\"").unwrap();
    assert_eq!(from_json, ApplicationStatus::Interviewed);
  }

  #[test]
  fn unknown_status_is_an_error() {
    assert!(matches!(
      "Hired".parse::<ApplicationStatus>(),
      Err(Error::UnknownStatus(_))
    ));
  }

  #[test]
  fn default_status_is_applied() {
    assert_eq!(ApplicationStatus::default(), ApplicationStatus::Applied);
  }

  #[test]
  fn new_application_rejects_blank_names() {
    assert!(matches!(
      NewApplication::new("  ", "Engineer", "/tmp/x"),
      Err(Error::EmptyField { field: "company" })
    ));
    assert!(matches!(
      NewApplication::new("Acme", "", "/tmp/x"),
      Err(Error::EmptyField { field: "role" })
    ));
  }

  #[test]
  fn blank_job_description_is_dropped() {
    let app = NewApplication::new("Acme", "Engineer", "/tmp/x")
      .unwrap()
      .job_description("   ");
    assert!(app.job_description.is_none());
  }

  #[test]
  fn empty_folder_path_is_never_live() {
    let record = ApplicationRecord {
      id:              1,
      company:         "Acme".into(),
      role:            "Engineer".into(),
      folder_path:     PathBuf::new(),
      status:          ApplicationStatus::Applied,
      created_at:      crate::timestamp::now(),
      job_description: None,
      unknown_status:  None,
    };
    assert!(!record.is_live());
  }

  #[test]
  fn unknown_label_is_reported_but_not_actionable() {
    let mut record = ApplicationRecord {
      id:              1,
      company:         "Acme".into(),
      role:            "Engineer".into(),
      folder_path:     PathBuf::new(),
      status:          ApplicationStatus::Applied,
      created_at:      crate::timestamp::now(),
      job_description: None,
      unknown_status:  None,
    };
    assert_eq!(record.status_label(), "Applied");
    assert_eq!(record.known_status(), Some(ApplicationStatus::Applied));

    record.unknown_status = Some("Withdrawn".into());
    assert_eq!(record.status_label(), "Withdrawn");
    assert_eq!(record.known_status(), None);
  }
}
