//! Interactive workflows that touch both the folder tree and the store:
//! creating an application and logging an interview.
//!
//! Both leave the tree and the store in a state the next reconciliation pass
//! accepts without changes.

use std::path::{Path, PathBuf};

use jalm_core::{
  application::{ApplicationRecord, Interview, NewApplication},
  store::ApplicationStore,
  timestamp,
};
use tokio::{fs, io::AsyncWriteExt as _};
use tracing::info;

use crate::{Error, Result, scanner::INTERVIEW_MARKER};

/// Keep alphanumerics, space, `_` and `-`, then trim.
pub fn sanitize_component(name: &str) -> String {
  name
    .chars()
    .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
    .collect::<String>()
    .trim()
    .to_owned()
}

fn folder_name(name: &str) -> Result<String> {
  let clean = sanitize_component(name);
  if clean.is_empty() {
    return Err(Error::InvalidName { name: name.to_owned() });
  }
  Ok(clean)
}

// ─── Creation ────────────────────────────────────────────────────────────────

/// Create `root/<Company>/<Role>` and the record that stands for it.
///
/// A second application for the same company and role gets the role
/// `"{role} (n)"`, with `n` the first number from `count + 1` upward whose
/// key and folder are both unused.
/// The record keeps the display names; only the folder names are sanitized.
pub async fn create_application<S: ApplicationStore>(
  store: &S,
  root: &Path,
  company: &str,
  role: &str,
  job_description: Option<&str>,
) -> Result<ApplicationRecord> {
  let company = company.trim();
  let mut role = role.trim().to_owned();
  if company.is_empty() {
    return Err(jalm_core::Error::EmptyField { field: "company" }.into());
  }
  if role.is_empty() {
    return Err(jalm_core::Error::EmptyField { field: "role" }.into());
  }
  if !fs::metadata(root).await.is_ok_and(|m| m.is_dir()) {
    return Err(Error::MissingRoot(root.to_path_buf()));
  }

  let company_dir = std::path::absolute(root)
    .map_err(|e| Error::io(root, e))?
    .join(folder_name(company)?);

  if store.exists(company, &role).await.map_err(Error::from_store)? {
    let base = role;
    let mut n = store
      .count_with_role_prefix(company, &base)
      .await
      .map_err(Error::from_store)?
      + 1;
    // Deleted suffixes leave gaps; skip numbers whose key or folder is taken.
    role = loop {
      let next = format!("{base} ({n})");
      let folder = company_dir.join(folder_name(&next)?);
      let key_taken = store.exists(company, &next).await.map_err(Error::from_store)?;
      let folder_taken = store
        .find_by_folder_path(&folder)
        .await
        .map_err(Error::from_store)?
        .is_some();
      if !key_taken && !folder_taken {
        break next;
      }
      n += 1;
    };
  }

  let folder: PathBuf = company_dir.join(folder_name(&role)?);

  if let Some(owner) = store
    .find_by_folder_path(&folder)
    .await
    .map_err(Error::from_store)?
  {
    return Err(Error::FolderInUse { path: folder, id: owner.id });
  }

  fs::create_dir_all(&folder)
    .await
    .map_err(|e| Error::io(&folder, e))?;
  let meta = fs::metadata(&folder)
    .await
    .map_err(|e| Error::io(&folder, e))?;
  let created_at = meta
    .created()
    .or_else(|_| meta.modified())
    .map(timestamp::from_system_time)
    .unwrap_or_else(|_| timestamp::now());

  let mut input =
    NewApplication::new(company, role.as_str(), folder.as_path())?.created_at(created_at);
  if let Some(text) = job_description {
    input = input.job_description(text);
  }
  let id = store.insert(input).await.map_err(Error::from_store)?;
  info!(id, company, role = %role, folder = %folder.display(), "application created");

  store
    .get(id)
    .await
    .map_err(Error::from_store)?
    .ok_or(Error::NotFound(id))
}

// ─── Interviews ──────────────────────────────────────────────────────────────

/// Store the next interview round for `id` and append it to the folder's
/// interview log, which the scanner treats as interview evidence.
pub async fn log_interview<S: ApplicationStore>(
  store: &S,
  id: i64,
  notes: &str,
) -> Result<Interview> {
  let record = store
    .get(id)
    .await
    .map_err(Error::from_store)?
    .ok_or(Error::NotFound(id))?;

  let notes = notes.trim();
  let interview = store
    .add_interview(id, (!notes.is_empty()).then(|| notes.to_owned()))
    .await
    .map_err(Error::from_store)?;

  let log = record.folder_path.join(INTERVIEW_MARKER);
  let entry = format!(
    "--- Interview {} ({}) ---\n{}\n\n",
    interview.sequence,
    timestamp::format(interview.date),
    notes,
  );
  let mut file = fs::OpenOptions::new()
    .create(true)
    .append(true)
    .open(&log)
    .await
    .map_err(|e| Error::io(&log, e))?;
  file
    .write_all(entry.as_bytes())
    .await
    .map_err(|e| Error::io(&log, e))?;
  file.flush().await.map_err(|e| Error::io(&log, e))?;

  info!(id, sequence = interview.sequence, "interview logged");
  Ok(interview)
}
