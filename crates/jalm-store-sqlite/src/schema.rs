//! SQL schema for the JALM SQLite store.
//!
//! The table layout matches databases created by earlier JALM releases, so an
//! existing `jalm_apps.db` opens in place. Columns added since then are
//! back-filled by [`MIGRATIONS`].

/// Connection-level settings. Applied on every open.
///
/// `synchronous = NORMAL` under WAL may lose the last commits on power loss
/// but never reorders or corrupts them.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous  = NORMAL;
PRAGMA foreign_keys = ON;
";

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS applications (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    company_name    TEXT NOT NULL,
    role_name       TEXT NOT NULL,
    folder_path     TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'Applied'
                    CHECK (status IN ('Applied', 'Interviewed', 'Interviewing',
                                      'Rejected', 'Offer', 'Ghosted')),
    created_at      TEXT NOT NULL,   -- 'YYYY-MM-DD HH:MM:SS', folder creation time
    job_description TEXT
);

-- (company_name, role_name) is the logical key but deliberately not UNIQUE:
-- a user may create 'Role (2)' style variants and other writers share the
-- table.
CREATE INDEX IF NOT EXISTS idx_apps_company ON applications(company_name);
CREATE INDEX IF NOT EXISTS idx_apps_role    ON applications(role_name);
CREATE INDEX IF NOT EXISTS idx_apps_created ON applications(created_at);
CREATE INDEX IF NOT EXISTS idx_apps_folder  ON applications(folder_path);

CREATE TABLE IF NOT EXISTS interviews (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    app_id   INTEGER NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
    sequence INTEGER NOT NULL,
    notes    TEXT,
    date     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_interviews_app ON interviews(app_id);
";

/// Columns that older databases may lack: `(column, ALTER statement)`.
pub const MIGRATIONS: &[(&str, &str)] = &[(
  "job_description",
  "ALTER TABLE applications ADD COLUMN job_description TEXT",
)];

/// Bumped whenever [`SCHEMA`] or [`MIGRATIONS`] change.
pub const SCHEMA_VERSION: i64 = 2;
