//! `jalmd`: keeps the JALM application store in line with the folder tree.
//!
//! # Usage
//!
//! ```
//! jalmd --config ~/.config/jalm/config.toml watch
//! jalmd scan
//! jalmd list --search acme --sort company
//! jalmd add "Acme, Inc." "Engineer" --description "Backend team"
//! ```

use std::path::PathBuf;

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use jalm_core::{
  application::ApplicationStatus,
  store::{ApplicationStore, ListQuery, SortKey},
  timestamp,
};
use jalm_store_sqlite::SqliteStore;
use jalm_sync::{HelperProcess, SyncConfig, WatchSchedule};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "JALM folder reconciliation daemon")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run one reconciliation pass and print what changed.
  Scan,
  /// Reconcile continuously until interrupted.
  Watch,
  /// Print application records.
  List {
    /// Only records whose company or role contains this text.
    #[arg(long)]
    search: Option<String>,
    /// newest, oldest, company, status or id.
    #[arg(long, default_value = "newest")]
    sort:   SortKey,
    /// Print JSON instead of a table.
    #[arg(long)]
    json:   bool,
  },
  /// Create a new application folder and record.
  Add {
    company:     String,
    role:        String,
    #[arg(long)]
    description: Option<String>,
  },
  /// Set an application's status by hand.
  Status { id: i64, status: ApplicationStatus },
  /// Log an interview round for an application.
  Interview { id: i64, notes: String },
  /// Print per-status totals.
  Stats,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = SyncConfig::load(&cli.config).context("failed to load configuration")?;
  let store_path = cfg.store_path();
  let store = SqliteStore::open_with_timeout(&store_path, cfg.busy_timeout())
    .await
    .with_context(|| format!("failed to open store at {}", store_path.display()))?;

  match cli.command {
    Command::Scan => {
      let report = jalm_sync::reconcile(&store, cfg.root()).await?;
      println!("{report}");
    }
    Command::Watch => watch(&store, &cfg).await?,
    Command::List { search, sort, json } => {
      let records = store.list(&ListQuery { search, sort }).await?;
      if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
      } else {
        for r in &records {
          println!(
            "{:>5}  {:<11}  {}  {}  /  {}",
            r.id,
            r.status_label(),
            timestamp::format(r.created_at),
            r.company,
            r.role
          );
        }
      }
    }
    Command::Add { company, role, description } => {
      let record = jalm_sync::create_application(
        &store,
        cfg.root(),
        &company,
        &role,
        description.as_deref(),
      )
      .await?;
      println!("{}  {}", record.id, record.folder_path.display());
    }
    Command::Status { id, status } => {
      if !store.update_status(id, status).await? {
        bail!("no application with id {id}");
      }
    }
    Command::Interview { id, notes } => {
      let interview = jalm_sync::log_interview(&store, id, &notes).await?;
      println!("interview {} logged for application {id}", interview.sequence);
    }
    Command::Stats => {
      let counts = store.status_counts().await?;
      let total: usize = counts.iter().map(|(_, n)| n).sum();
      for (status, n) in counts {
        println!("{:<11}  {n}", status.as_str());
      }
      println!("{:<11}  {total}", "Total");
    }
  }

  Ok(())
}

async fn watch(store: &SqliteStore, cfg: &SyncConfig) -> anyhow::Result<()> {
  let mut helper = if cfg.helper_command.is_empty() {
    None
  } else {
    let mut helper = HelperProcess::new(&cfg.helper_command, &cfg.config_dir)?;
    helper.start().context("failed to start helper")?;
    Some(helper)
  };

  let schedule = WatchSchedule {
    poll:      cfg.poll_interval(),
    full_scan: cfg.full_scan_interval(),
  };
  let shutdown = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::warn!(error = %e, "cannot listen for Ctrl-C");
      std::future::pending::<()>().await;
    }
  };
  let result = jalm_sync::watch(store, cfg.root(), schedule, shutdown).await;

  if let Some(helper) = helper.as_mut() {
    helper.stop().await;
  }
  Ok(result?)
}
