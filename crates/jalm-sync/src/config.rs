//! Runtime configuration for `jalmd`.
//!
//! Values come from an optional TOML file layered under `JALM_*` environment
//! variables, e.g. `JALM_ROOT_DIRECTORY=~/Jobs`.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use serde::Deserialize;

use crate::{Error, Result};

/// File name of the store inside the root directory when no `store_path` is
/// configured.
pub const DEFAULT_STORE_FILE: &str = "jalm_apps.db";

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Folder holding one sub-folder per company.
  #[serde(default)]
  pub root_directory:          PathBuf,
  /// Defaults to `<root_directory>/jalm_apps.db`.
  #[serde(default)]
  pub store_path:              Option<PathBuf>,
  #[serde(default = "default_poll_interval")]
  pub poll_interval_secs:      u64,
  #[serde(default = "default_full_scan_interval")]
  pub full_scan_interval_secs: u64,
  #[serde(default = "default_busy_timeout")]
  pub busy_timeout_ms:         u64,
  /// Program and arguments of an external helper started by `watch`.
  #[serde(default)]
  pub helper_command:          Vec<String>,
  /// Directory the configuration was read from. Exposed to the helper.
  #[serde(skip)]
  pub config_dir:              PathBuf,
}

fn default_poll_interval() -> u64 { 5 }
fn default_full_scan_interval() -> u64 { 30 * 60 }
fn default_busy_timeout() -> u64 { 5_000 }

impl SyncConfig {
  /// Read `file` (if it exists) and the environment.
  pub fn load(file: &Path) -> Result<Self> {
    Self::load_with_env(file, "JALM")
  }

  pub(crate) fn load_with_env(file: &Path, prefix: &str) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix(prefix)
          .try_parsing(true)
          .list_separator(" ")
          .with_list_parse_key("helper_command"),
      )
      .build()?;

    let mut cfg: SyncConfig = settings.try_deserialize()?;
    if cfg.root_directory.as_os_str().is_empty() {
      return Err(Error::Config(config::ConfigError::NotFound(
        "root_directory".into(),
      )));
    }
    cfg.root_directory = expand_tilde(&cfg.root_directory);
    cfg.store_path = cfg.store_path.as_deref().map(expand_tilde);
    cfg.config_dir = std::path::absolute(file)
      .ok()
      .and_then(|p| p.parent().map(Path::to_path_buf))
      .unwrap_or_default();
    Ok(cfg)
  }

  /// A configuration rooted at `root` with every other value defaulted.
  pub fn with_root(root: impl Into<PathBuf>) -> Self {
    Self {
      root_directory:          root.into(),
      store_path:              None,
      poll_interval_secs:      default_poll_interval(),
      full_scan_interval_secs: default_full_scan_interval(),
      busy_timeout_ms:         default_busy_timeout(),
      helper_command:          Vec::new(),
      config_dir:              PathBuf::new(),
    }
  }

  pub fn root(&self) -> &Path { &self.root_directory }

  pub fn store_path(&self) -> PathBuf {
    self
      .store_path
      .clone()
      .unwrap_or_else(|| self.root_directory.join(DEFAULT_STORE_FILE))
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs.max(1))
  }

  pub fn full_scan_interval(&self) -> Duration {
    Duration::from_secs(self.full_scan_interval_secs)
  }

  pub fn busy_timeout(&self) -> Duration {
    Duration::from_millis(self.busy_timeout_ms)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;

  // Unique prefix so tests never see the developer's JALM_* variables.
  const NO_ENV: &str = "JALM_TEST_UNSET";

  #[test]
  fn file_values_and_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.toml");
    fs::write(
      &file,
      "root_directory = \"/srv/jobs\"\npoll_interval_secs = 2\n\
       helper_command = [\"jalm-helper\", \"--quiet\"]\n",
    )
    .unwrap();

    let cfg = SyncConfig::load_with_env(&file, NO_ENV).unwrap();
    assert_eq!(cfg.root(), Path::new("/srv/jobs"));
    assert_eq!(cfg.store_path(), Path::new("/srv/jobs/jalm_apps.db"));
    assert_eq!(cfg.poll_interval(), Duration::from_secs(2));
    assert_eq!(cfg.full_scan_interval(), Duration::from_secs(1800));
    assert_eq!(cfg.busy_timeout(), Duration::from_millis(5000));
    assert_eq!(cfg.helper_command, ["jalm-helper", "--quiet"]);
    assert_eq!(cfg.config_dir, dir.path());
  }

  #[test]
  fn explicit_store_path_wins() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.toml");
    fs::write(
      &file,
      "root_directory = \"/srv/jobs\"\nstore_path = \"/var/lib/jalm.db\"\n",
    )
    .unwrap();

    let cfg = SyncConfig::load_with_env(&file, NO_ENV).unwrap();
    assert_eq!(cfg.store_path(), Path::new("/var/lib/jalm.db"));
  }

  #[test]
  fn missing_root_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = SyncConfig::load_with_env(&dir.path().join("absent.toml"), NO_ENV)
      .unwrap_err();
    assert!(matches!(err, Error::Config(_)), "{err}");
  }

  #[test]
  fn tilde_expansion() {
    let Ok(home) = std::env::var("HOME") else {
      return;
    };
    assert_eq!(
      expand_tilde(Path::new("~/Jobs")),
      PathBuf::from(home).join("Jobs")
    );
    assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
    assert_eq!(expand_tilde(Path::new("~user/x")), PathBuf::from("~user/x"));
  }

  #[test]
  fn with_root_defaults() {
    let cfg = SyncConfig::with_root("/jobs");
    assert_eq!(cfg.store_path(), Path::new("/jobs/jalm_apps.db"));
    assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
  }
}
