//! Reconciliation engine for JALM application folders.
//!
//! The folder tree under the configured root is the source of truth for which
//! applications exist and when they were created; the store is the source of
//! truth for manually set status. [`reconcile`] brings the store in line with
//! the tree, [`monitor::watch`] keeps it there, and [`folders`] holds the
//! interactive workflows that change both at once.

pub mod config;
pub mod error;
pub mod folders;
pub mod helper;
pub mod monitor;
pub mod reconcile;
pub mod scanner;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use folders::{create_application, log_interview, sanitize_component};
pub use helper::HelperProcess;
pub use monitor::{ChangeMonitor, Drift, WatchSchedule, watch};
pub use reconcile::{ReconcileReport, Reconciler, reconcile};
pub use scanner::{INTERVIEW_MARKER, Scan, scan, tree_fingerprint};
