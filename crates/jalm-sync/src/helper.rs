//! Handle for the optional external helper process started by `watch`.

use std::{path::PathBuf, process::Stdio, time::Duration};

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable telling the helper where the configuration lives.
pub const CONFIG_DIR_ENV: &str = "JALM_CONFIG_DIR";

/// How long [`HelperProcess::stop`] waits before killing the child.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Owns at most one running helper child.
///
/// Stopping closes the child's stdin and waits for it to exit, killing it
/// once the grace period runs out. A handle dropped without `stop` kills the
/// child.
#[derive(Debug)]
pub struct HelperProcess {
  program:    String,
  args:       Vec<String>,
  config_dir: PathBuf,
  grace:      Duration,
  child:      Option<Child>,
}

impl HelperProcess {
  /// `command` is the program followed by its arguments.
  pub fn new(command: &[String], config_dir: impl Into<PathBuf>) -> Result<Self> {
    let (program, args) = command.split_first().ok_or(Error::NoHelperCommand)?;
    Ok(Self {
      program:    program.clone(),
      args:       args.to_vec(),
      config_dir: config_dir.into(),
      grace:      DEFAULT_GRACE,
      child:      None,
    })
  }

  pub fn with_grace(mut self, grace: Duration) -> Self {
    self.grace = grace;
    self
  }

  /// Spawn the helper unless it is already running. Must be called from
  /// within a Tokio runtime.
  pub fn start(&mut self) -> Result<()> {
    if self.is_running() {
      return Ok(());
    }
    let child = Command::new(&self.program)
      .args(&self.args)
      .env(CONFIG_DIR_ENV, &self.config_dir)
      .stdin(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|e| Error::io(&self.program, e))?;
    info!(pid = ?child.id(), program = %self.program, "helper started");
    self.child = Some(child);
    Ok(())
  }

  /// True while the child has not exited. Reaps it once it has.
  pub fn is_running(&mut self) -> bool {
    let Some(child) = self.child.as_mut() else {
      return false;
    };
    match child.try_wait() {
      Ok(None) => true,
      Ok(Some(status)) => {
        info!(%status, "helper exited");
        self.child = None;
        false
      }
      Err(e) => {
        warn!(error = %e, "could not query helper state");
        true
      }
    }
  }

  /// Ask the helper to exit, then kill it after the grace period. A no-op
  /// when nothing is running.
  pub async fn stop(&mut self) {
    let Some(mut child) = self.child.take() else {
      return;
    };
    // EOF on stdin is the shutdown request.
    drop(child.stdin.take());

    match tokio::time::timeout(self.grace, child.wait()).await {
      Ok(Ok(status)) => {
        info!(%status, "helper stopped");
        return;
      }
      Ok(Err(e)) => warn!(error = %e, "failed to wait for helper; killing it"),
      Err(_) => warn!(pid = ?child.id(), "helper did not exit in time; killing it"),
    }

    if let Err(e) = child.start_kill() {
      warn!(error = %e, "failed to kill helper");
    }
    match child.wait().await {
      Ok(status) => info!(%status, "helper killed"),
      Err(e) => warn!(error = %e, "failed to reap helper"),
    }
  }
}

#[cfg(all(test, unix))]
mod tests {
  use std::time::Instant;

  use super::*;

  fn command(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_owned()).collect()
  }

  async fn wait_for_exit(helper: &mut HelperProcess) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while helper.is_running() && Instant::now() < deadline {
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
  }

  #[test]
  fn empty_command_is_rejected() {
    assert!(matches!(
      HelperProcess::new(&[], "/tmp"),
      Err(Error::NoHelperCommand)
    ));
  }

  #[tokio::test]
  async fn start_is_idempotent_and_stop_closes_stdin() {
    let mut helper = HelperProcess::new(&command(&["cat"]), "/tmp").unwrap();
    helper.start().unwrap();
    let pid = helper.child.as_ref().and_then(Child::id);
    helper.start().unwrap();
    assert_eq!(helper.child.as_ref().and_then(Child::id), pid);
    assert!(helper.is_running());

    let started = Instant::now();
    helper.stop().await;
    assert!(started.elapsed() < DEFAULT_GRACE);
    assert!(!helper.is_running());

    // Second stop does nothing.
    helper.stop().await;
  }

  #[tokio::test]
  async fn stubborn_helper_is_killed() {
    let mut helper = HelperProcess::new(&command(&["sleep", "30"]), "/tmp")
      .unwrap()
      .with_grace(Duration::from_millis(100));
    helper.start().unwrap();

    let started = Instant::now();
    helper.stop().await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!helper.is_running());
  }

  /// Running and not a zombie, per procfs.
  #[cfg(target_os = "linux")]
  fn running(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat")).is_ok_and(|stat| {
      stat
        .rsplit(')')
        .next()
        .is_some_and(|rest| !rest.trim_start().starts_with('Z'))
    })
  }

  #[cfg(target_os = "linux")]
  #[tokio::test]
  async fn dropped_handle_kills_the_child() {
    let mut helper = HelperProcess::new(&command(&["sleep", "30"]), "/tmp").unwrap();
    helper.start().unwrap();
    let pid = helper.child.as_ref().and_then(Child::id).unwrap();
    assert!(running(pid));
    drop(helper);

    let deadline = Instant::now() + Duration::from_secs(5);
    while running(pid) && Instant::now() < deadline {
      tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!running(pid), "helper {pid} survived its handle");
  }

  #[tokio::test]
  async fn exited_helper_is_reaped() {
    let mut helper = HelperProcess::new(&command(&["true"]), "/tmp").unwrap();
    helper.start().unwrap();
    wait_for_exit(&mut helper).await;
    assert!(!helper.is_running());
  }

  #[tokio::test]
  async fn config_dir_is_exported() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("env.txt");
    let script = format!("printf %s \"${CONFIG_DIR_ENV}\" > '{}'", out.display());
    let mut helper = HelperProcess::new(&command(&["sh", "-c", &script]), dir.path())
      .unwrap();
    helper.start().unwrap();
    wait_for_exit(&mut helper).await;
    assert_eq!(std::fs::read_to_string(out).unwrap(), dir.path().to_string_lossy());
  }
}
