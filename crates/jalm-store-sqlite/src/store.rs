//! [`SqliteStore`]: the SQLite implementation of [`ApplicationStore`].

use std::{path::Path, time::Duration};

use chrono::NaiveDateTime;
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use jalm_core::{
  application::{ApplicationRecord, ApplicationStatus, Interview, NewApplication},
  store::{ApplicationStore, ListQuery},
  timestamp,
};

use crate::{
  encode::{
    APPLICATION_COLUMNS, RawApplication, RawInterview, decode_status, encode_path,
    encode_status, encode_ts, escape_like, order_by,
  },
  schema::{MIGRATIONS, PRAGMAS, SCHEMA, SCHEMA_VERSION},
  Error, Result,
};

/// How long a writer waits on another process's lock before failing busy.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A JALM application store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Separate
/// processes should each open their own store on the same file.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with the default busy timeout.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT).await
  }

  /// Open (or create) a store at `path`; writers blocked by another
  /// connection give up after `busy_timeout`.
  pub async fn open_with_timeout(
    path: impl AsRef<Path>,
    busy_timeout: Duration,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init(busy_timeout).await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init(DEFAULT_BUSY_TIMEOUT).await?;
    Ok(store)
  }

  async fn init(&self, busy_timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(PRAGMAS)?;
        conn.execute_batch(SCHEMA)?;

        let columns: Vec<String> = {
          let mut stmt =
            conn.prepare("SELECT name FROM pragma_table_info('applications')")?;
          let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          names
        };
        for &(column, alter) in MIGRATIONS {
          if !columns.iter().any(|c| c == column) {
            conn.execute_batch(alter)?;
          }
        }

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a single-row `UPDATE` and report whether a row matched.
  async fn update_one(
    &self,
    sql: &'static str,
    value: String,
    id: i64,
  ) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params![value, id])?))
      .await?;
    Ok(changed > 0)
  }
}

// ─── ApplicationStore impl ───────────────────────────────────────────────────

impl ApplicationStore for SqliteStore {
  type Error = Error;

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn list(&self, query: &ListQuery) -> Result<Vec<ApplicationRecord>> {
    let pattern = query
      .search
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(|s| format!("%{}%", escape_like(s)));
    let sql = format!(
      "SELECT {APPLICATION_COLUMNS} FROM applications
       WHERE ?1 IS NULL
          OR company_name LIKE ?1 ESCAPE '\\'
          OR role_name    LIKE ?1 ESCAPE '\\'
       ORDER BY {}",
      order_by(query.sort)
    );

    let raws: Vec<RawApplication> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![pattern], RawApplication::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawApplication::into_record).collect())
  }

  async fn get(&self, id: i64) -> Result<Option<ApplicationRecord>> {
    let raw: Option<RawApplication> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
            rusqlite::params![id],
            RawApplication::from_row,
          )
          .optional()?)
      })
      .await?;

    Ok(raw.map(RawApplication::into_record))
  }

  async fn find_by_folder_path(
    &self,
    folder_path: &Path,
  ) -> Result<Option<ApplicationRecord>> {
    let path_str = encode_path(folder_path);

    let raw: Option<RawApplication> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {APPLICATION_COLUMNS} FROM applications
               WHERE folder_path = ?1 ORDER BY id LIMIT 1"
            ),
            rusqlite::params![path_str],
            RawApplication::from_row,
          )
          .optional()?)
      })
      .await?;

    Ok(raw.map(RawApplication::into_record))
  }

  async fn exists(&self, company: &str, role: &str) -> Result<bool> {
    let company = company.to_owned();
    let role = role.to_owned();

    let found = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM applications
             WHERE company_name = ?1 AND role_name = ?2 LIMIT 1",
            rusqlite::params![company, role],
            |_| Ok(()),
          )
          .optional()?
          .is_some())
      })
      .await?;
    Ok(found)
  }

  async fn count_with_role_prefix(&self, company: &str, role: &str) -> Result<usize> {
    let company = company.to_owned();
    let variant = format!("{} (%)", escape_like(role));
    let role = role.to_owned();

    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM applications
           WHERE company_name = ?1
             AND (role_name = ?2 OR role_name LIKE ?3 ESCAPE '\\')",
          rusqlite::params![company, role, variant],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(usize::try_from(n).unwrap_or_default())
  }

  async fn count(&self) -> Result<usize> {
    let n: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM applications", [], |row| {
          row.get(0)
        })?)
      })
      .await?;
    Ok(usize::try_from(n).unwrap_or_default())
  }

  async fn status_counts(&self) -> Result<Vec<(ApplicationStatus, usize)>> {
    let rows: Vec<(Option<String>, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT status, COUNT(*) FROM applications GROUP BY status")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut totals: Vec<(ApplicationStatus, usize)> =
      ApplicationStatus::ALL.iter().map(|s| (*s, 0)).collect();
    for (label, n) in rows {
      // Labels written by other tools have no bucket of their own.
      let (status, None) = decode_status(label) else {
        continue;
      };
      if let Some(slot) = totals.iter_mut().find(|(s, _)| *s == status) {
        slot.1 += usize::try_from(n).unwrap_or_default();
      }
    }
    Ok(totals)
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn insert(&self, input: NewApplication) -> Result<i64> {
    let created_at = encode_ts(input.created_at.unwrap_or_else(timestamp::now));
    let path_str = encode_path(&input.folder_path);
    let NewApplication { company, role, job_description, .. } = input;

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO applications
             (company_name, role_name, folder_path, status, created_at, job_description)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            company,
            role,
            path_str,
            encode_status(ApplicationStatus::Applied),
            created_at,
            job_description,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(id)
  }

  async fn update_status(&self, id: i64, status: ApplicationStatus) -> Result<bool> {
    self
      .update_one(
        "UPDATE applications SET status = ?1 WHERE id = ?2",
        encode_status(status).to_owned(),
        id,
      )
      .await
  }

  async fn update_status_if(
    &self,
    id: i64,
    expected: ApplicationStatus,
    status: ApplicationStatus,
  ) -> Result<bool> {
    // Rows written by older releases may still say 'Interviewing'.
    let (expected_a, expected_b) = match expected {
      ApplicationStatus::Interviewed => ("Interviewed", "Interviewing"),
      other => (encode_status(other), encode_status(other)),
    };
    let status = encode_status(status);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE applications SET status = ?1
           WHERE id = ?2 AND status IN (?3, ?4)",
          rusqlite::params![status, id, expected_a, expected_b],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn update_created_at(&self, id: i64, created_at: NaiveDateTime) -> Result<bool> {
    self
      .update_one(
        "UPDATE applications SET created_at = ?1 WHERE id = ?2",
        encode_ts(created_at),
        id,
      )
      .await
  }

  async fn update_folder_path(&self, id: i64, folder_path: &Path) -> Result<bool> {
    self
      .update_one(
        "UPDATE applications SET folder_path = ?1 WHERE id = ?2",
        encode_path(folder_path),
        id,
      )
      .await
  }

  async fn delete(&self, id: i64) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM applications WHERE id = ?1",
          rusqlite::params![id],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn delete_many(&self, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
      return Ok(0);
    }
    let ids = ids.to_vec();

    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut removed = 0;
        {
          let mut stmt = tx.prepare("DELETE FROM applications WHERE id = ?1")?;
          for id in &ids {
            removed += stmt.execute(rusqlite::params![id])?;
          }
        }
        tx.commit()?;
        Ok(removed)
      })
      .await?;
    Ok(removed)
  }

  async fn collapse_duplicates_by_folder_path(&self) -> Result<usize> {
    let removed = self
      .conn
      .call(|conn| {
        let groups: Vec<String> = {
          let mut stmt = conn.prepare(
            "SELECT folder_path FROM applications
             GROUP BY folder_path HAVING COUNT(*) > 1",
          )?;
          let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          paths
        };

        // One transaction per group; the minimum is re-read under the lock so
        // a concurrent insert cannot make us drop the survivor.
        let mut removed = 0;
        for path in groups {
          let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
          removed += tx.execute(
            "DELETE FROM applications
             WHERE folder_path = ?1
               AND id > (SELECT MIN(id) FROM applications WHERE folder_path = ?1)",
            rusqlite::params![path],
          )?;
          tx.commit()?;
        }
        Ok(removed)
      })
      .await?;
    Ok(removed)
  }

  // ── Interviews ────────────────────────────────────────────────────────────

  async fn add_interview(
    &self,
    application_id: i64,
    notes: Option<String>,
  ) -> Result<Interview> {
    let date = timestamp::now();
    let date_str = encode_ts(date);
    let notes_col = notes.clone();

    let inserted: Option<(i64, i64)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM applications WHERE id = ?1",
            rusqlite::params![application_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(None);
        }

        let count: i64 = tx.query_row(
          "SELECT COUNT(*) FROM interviews WHERE app_id = ?1",
          rusqlite::params![application_id],
          |row| row.get(0),
        )?;
        let sequence = count + 1;
        tx.execute(
          "INSERT INTO interviews (app_id, sequence, notes, date)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![application_id, sequence, notes_col, date_str],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Some((id, sequence)))
      })
      .await?;

    let (id, sequence) =
      inserted.ok_or(Error::ApplicationNotFound(application_id))?;
    Ok(Interview {
      id,
      application_id,
      sequence: u32::try_from(sequence).unwrap_or_default(),
      notes,
      date,
    })
  }

  async fn list_interviews(&self, application_id: i64) -> Result<Vec<Interview>> {
    let raws: Vec<RawInterview> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, app_id, sequence, notes, date FROM interviews
           WHERE app_id = ?1 ORDER BY sequence ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![application_id], RawInterview::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawInterview::into_interview).collect())
  }
}
