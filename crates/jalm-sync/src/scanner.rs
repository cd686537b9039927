//! Filesystem scanner: walks `root/company/role` and yields one
//! [`ScanCandidate`] per role folder.
//!
//! The tree is mutated by other programs at any time. Anything that vanishes
//! or cannot be read between listing and stat is skipped, never reported as
//! an error.

use std::{
  fs,
  hash::{DefaultHasher, Hash, Hasher},
  path::{Path, PathBuf},
};

use jalm_core::{candidate::ScanCandidate, timestamp};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Presence of this file inside a role folder is interview evidence.
pub const INTERVIEW_MARKER: &str = "interviews.txt";

/// Scan `root` using the default interview marker.
pub fn scan(root: &Path) -> Scan { Scan::new(root, INTERVIEW_MARKER) }

/// Lazy iterator over the role folders under a root.
///
/// A missing or non-directory root yields nothing.
pub struct Scan {
  marker:  String,
  entries: walkdir::IntoIter,
}

impl Scan {
  pub fn new(root: &Path, marker: impl Into<String>) -> Self {
    let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
    Self { marker: marker.into(), entries: walk(&root).min_depth(2).into_iter() }
  }
}

impl Iterator for Scan {
  type Item = ScanCandidate;

  fn next(&mut self) -> Option<ScanCandidate> {
    for entry in self.entries.by_ref() {
      match entry {
        Ok(entry) => {
          if let Some(candidate) = role_candidate(&entry, &self.marker) {
            return Some(candidate);
          }
        }
        Err(e) => debug!(error = %e, "skipping unreadable entry"),
      }
    }
    None
  }
}

/// The two-level walk shared by [`Scan`] and [`tree_fingerprint`]. Follows
/// symlinks, like the folder browser users create these with.
fn walk(root: &Path) -> WalkDir {
  WalkDir::new(root).max_depth(2).follow_links(true)
}

fn role_candidate(entry: &DirEntry, marker: &str) -> Option<ScanCandidate> {
  if !entry.file_type().is_dir() {
    return None;
  }
  let path: PathBuf = entry.path().to_path_buf();
  let meta = match entry.metadata() {
    Ok(meta) => meta,
    Err(e) => {
      debug!(path = %path.display(), error = %e, "role folder vanished during scan");
      return None;
    }
  };
  let role = utf8_name(&path)?;
  let company = utf8_name(path.parent()?)?;

  let created_at = meta
    .created()
    .or_else(|_| meta.modified())
    .map(timestamp::from_system_time)
    .unwrap_or_else(|_| timestamp::now());
  let has_interview_evidence = path.join(marker).is_file();

  Some(ScanCandidate { company, role, path, created_at, has_interview_evidence })
}

fn utf8_name(path: &Path) -> Option<String> {
  let name = path.file_name()?;
  match name.to_str() {
    Some(s) => Some(s.to_owned()),
    None => {
      debug!(name = ?name, "skipping folder with non UTF-8 name");
      None
    }
  }
}

/// Best available creation time of a directory, in store representation.
pub fn folder_created_at(path: &Path) -> Option<chrono::NaiveDateTime> {
  let meta = fs::metadata(path).ok()?;
  meta
    .created()
    .or_else(|_| meta.modified())
    .ok()
    .map(timestamp::from_system_time)
}

/// Summary of the tree's shape, far cheaper than a full pass: the names and
/// modification times of the root, company and role folders.
///
/// It changes when a company or role folder is added, removed or renamed and
/// when files appear in or leave a role folder. `None` when the root is
/// missing.
pub fn tree_fingerprint(root: &Path) -> Option<u64> {
  if !root.is_dir() {
    return None;
  }
  let mut hasher = DefaultHasher::new();
  for entry in walk(root).sort_by_file_name().into_iter().filter_map(Result::ok) {
    if !entry.file_type().is_dir() {
      continue;
    }
    entry.path().hash(&mut hasher);
    entry
      .metadata()
      .ok()
      .and_then(|m| m.modified().ok())
      .hash(&mut hasher);
  }
  Some(hasher.finish())
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use super::*;

  fn names(root: &Path) -> BTreeSet<(String, String)> {
    scan(root)
      .map(|c| (c.company, c.role))
      .collect()
  }

  #[test]
  fn missing_root_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(scan(&dir.path().join("nope")).count(), 0);
  }

  #[test]
  fn file_root_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("root.txt");
    fs::write(&file, "x").unwrap();
    assert_eq!(scan(&file).count(), 0);
  }

  #[test]
  fn yields_one_candidate_per_role_folder() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("Acme/Engineer")).unwrap();
    fs::create_dir_all(root.join("Acme/Manager")).unwrap();
    fs::create_dir_all(root.join("Globex/Analyst")).unwrap();
    fs::create_dir_all(root.join("Empty Co")).unwrap();

    let expected: BTreeSet<(String, String)> = [
      ("Acme", "Engineer"),
      ("Acme", "Manager"),
      ("Globex", "Analyst"),
    ]
    .iter()
    .map(|(c, r)| (c.to_string(), r.to_string()))
    .collect();
    assert_eq!(names(root), expected);
  }

  #[test]
  fn files_at_either_level_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("jalm_apps.db"), "").unwrap();
    fs::create_dir_all(root.join("Acme/Engineer")).unwrap();
    fs::write(root.join("Acme/notes.md"), "").unwrap();
    // Deeper folders are not candidates.
    fs::create_dir_all(root.join("Acme/Engineer/drafts")).unwrap();

    let all: Vec<ScanCandidate> = scan(root).collect();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].role, "Engineer");
  }

  #[test]
  fn marker_file_sets_interview_evidence() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("Acme/Engineer")).unwrap();
    fs::create_dir_all(root.join("Acme/Manager")).unwrap();
    fs::write(root.join("Acme/Engineer").join(INTERVIEW_MARKER), "").unwrap();
    // A folder with the marker's name is not a marker.
    fs::create_dir_all(root.join("Acme/Manager").join(INTERVIEW_MARKER)).unwrap();

    for candidate in scan(root) {
      assert_eq!(
        candidate.has_interview_evidence,
        candidate.role == "Engineer",
        "{candidate:?}"
      );
    }
  }

  #[test]
  fn candidate_carries_absolute_path_and_folder_time() {
    let dir = tempfile::tempdir().unwrap();
    let role = dir.path().join("Acme/Engineer");
    fs::create_dir_all(&role).unwrap();

    let candidate = scan(dir.path()).next().unwrap();
    assert!(candidate.path.is_absolute());
    assert_eq!(candidate.path, std::path::absolute(&role).unwrap());
    assert_eq!(Some(candidate.created_at), folder_created_at(&role));
  }

  #[test]
  fn custom_marker_name() {
    let dir = tempfile::tempdir().unwrap();
    let role = dir.path().join("Acme/Engineer");
    fs::create_dir_all(&role).unwrap();
    fs::write(role.join("INTERVIEW"), "").unwrap();

    let candidate = Scan::new(dir.path(), "INTERVIEW").next().unwrap();
    assert!(candidate.has_interview_evidence);
    assert!(!scan(dir.path()).next().unwrap().has_interview_evidence);
  }

  #[cfg(unix)]
  #[test]
  fn symlinked_role_folder_is_followed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("jobs");
    let elsewhere = dir.path().join("elsewhere");
    fs::create_dir_all(root.join("Acme")).unwrap();
    fs::create_dir_all(&elsewhere).unwrap();
    std::os::unix::fs::symlink(&elsewhere, root.join("Acme/Engineer")).unwrap();
    std::os::unix::fs::symlink(dir.path().join("gone"), root.join("Acme/Broken"))
      .unwrap();

    let all: Vec<ScanCandidate> = scan(&root).collect();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].role, "Engineer");
    assert_eq!(all[0].path, root.join("Acme/Engineer"));
  }

  #[test]
  fn fingerprint_tracks_tree_shape() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    assert_eq!(tree_fingerprint(&root.join("nope")), None);

    fs::create_dir_all(root.join("Acme/Engineer")).unwrap();
    let first = tree_fingerprint(root).unwrap();
    assert_eq!(tree_fingerprint(root), Some(first));

    fs::create_dir_all(root.join("Globex/Analyst")).unwrap();
    let second = tree_fingerprint(root).unwrap();
    assert_ne!(first, second);

    fs::create_dir_all(root.join("Acme/Manager")).unwrap();
    let third = tree_fingerprint(root).unwrap();
    assert_ne!(second, third);

    // Directory mtimes tick at the kernel's coarse clock.
    std::thread::sleep(std::time::Duration::from_millis(50));
    fs::write(root.join("Acme/Engineer").join(INTERVIEW_MARKER), "").unwrap();
    assert_ne!(tree_fingerprint(root), Some(third));
  }
}
