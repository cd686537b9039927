//! The store's timestamp representation.
//!
//! Timestamps are wall-clock local times with one-second resolution, rendered
//! as `YYYY-MM-DD HH:MM:SS`. Folder creation times are truncated to whole
//! seconds before comparison so that a resync against an unchanged folder is
//! an exact no-op.

use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime, Timelike};

use crate::{Error, Result};

/// Column format for every timestamp written by this workspace.
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats accepted when reading rows written by other programs.
const ACCEPTED: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

pub fn format(ts: NaiveDateTime) -> String { ts.format(FORMAT).to_string() }

pub fn parse(s: &str) -> Result<NaiveDateTime> {
  let trimmed = s.trim();
  ACCEPTED
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
    .map(truncate)
    .ok_or_else(|| Error::InvalidTimestamp {
      value:  s.to_owned(),
      reason: format!("expected {FORMAT}"),
    })
}

/// Convert a filesystem time into the store representation.
pub fn from_system_time(t: SystemTime) -> NaiveDateTime {
  truncate(DateTime::<Local>::from(t).naive_local())
}

pub fn now() -> NaiveDateTime { truncate(Local::now().naive_local()) }

fn truncate(ts: NaiveDateTime) -> NaiveDateTime {
  ts.with_nanosecond(0).unwrap_or(ts)
}
