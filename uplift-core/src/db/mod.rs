//! SQLite database layer for Uplift.
//!
//! Provides persistent storage for:
//! - API keys (the client secret)
//! - Settings (app preferences)
//! - Upload history (one row per file handled by a batch)

mod migrations;

use crate::upload::UploadOutcome;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// One row of the upload history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub id: i64,
    pub file_path: String,
    pub outcome: UploadOutcome,
    pub created_at: DateTime<Utc>,
}

/// Database connection wrapper.
///
/// Automatically handles connection setup, migrations, and file permissions.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open the database at the default location.
    ///
    /// Default path: `~/.local/share/uplift/uplift.db`
    pub fn open() -> anyhow::Result<Self> {
        let path = Self::default_path()?;
        Self::open_at(path)
    }

    /// Open the database at a specific path.
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 0600 on Unix (holds the client secret).
    pub fn open_at(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            {
                tracing::warn!(path = %path.display(), error = %e, "Failed to set database file permissions");
            }
        }

        Ok(Self { conn, path })
    }

    /// Get the default database path.
    ///
    /// Returns `~/.local/share/uplift/uplift.db` (or platform equivalent).
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

        Ok(data_dir.join("uplift").join("uplift.db"))
    }

    /// Run database migrations.
    ///
    /// Safe to call multiple times - migrations are tracked and only run once.
    pub fn migrate(&self) -> anyhow::Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // API Key Storage
    // =========================================================================

    /// Save an API key to the database (upsert).
    pub fn save_api_key(&self, name: &str, api_key: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO api_keys (name, api_key, updated_at) VALUES (?, ?, unixepoch())
             ON CONFLICT(name) DO UPDATE SET api_key = excluded.api_key, updated_at = excluded.updated_at",
            [name, api_key],
        )?;
        Ok(())
    }

    /// Get an API key from the database.
    ///
    /// Returns `None` if the key doesn't exist.
    pub fn get_api_key(&self, name: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT api_key FROM api_keys WHERE name = ?")?;
        let result = stmt.query_row([name], |row| row.get(0));
        match result {
            Ok(key) => Ok(Some(key)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if an API key exists in the database.
    pub fn has_api_key(&self, name: &str) -> bool {
        self.get_api_key(name).ok().flatten().is_some()
    }

    // =========================================================================
    // Settings Storage
    // =========================================================================

    /// Save a setting to the database (upsert).
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, unixepoch())
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            [key, value],
        )?;
        Ok(())
    }

    /// Get a setting from the database.
    ///
    /// Returns `None` if the setting doesn't exist.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM settings WHERE key = ?")?;
        let result = stmt.query_row([key], |row| row.get(0));
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Upload History
    // =========================================================================

    /// Append the outcome of one file.
    pub fn record_upload(
        &self,
        file_path: &Path,
        outcome: &UploadOutcome,
    ) -> Result<i64, rusqlite::Error> {
        let (kind, activity_id, reason) = match outcome {
            UploadOutcome::Uploaded { activity_id } => {
                ("uploaded", activity_id.map(|id| id as i64), None)
            }
            UploadOutcome::Skipped => ("skipped", None, None),
            UploadOutcome::Failed { reason } => ("failed", None, Some(reason.as_str())),
        };

        self.conn.execute(
            "INSERT INTO upload_history (file_path, outcome, activity_id, reason) VALUES (?, ?, ?, ?)",
            rusqlite::params![file_path.to_string_lossy(), kind, activity_id, reason],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent history rows first.
    pub fn list_uploads(&self, limit: usize) -> Result<Vec<UploadRecord>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, file_path, outcome, activity_id, reason, created_at
             FROM upload_history ORDER BY id DESC LIMIT ?",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            let kind: String = row.get(2)?;
            let activity_id: Option<i64> = row.get(3)?;
            let reason: Option<String> = row.get(4)?;
            let created_at: i64 = row.get(5)?;

            let outcome = match kind.as_str() {
                "uploaded" => UploadOutcome::Uploaded {
                    activity_id: activity_id.map(|id| id as u64),
                },
                "skipped" => UploadOutcome::Skipped,
                _ => UploadOutcome::Failed {
                    reason: reason.unwrap_or_default(),
                },
            };

            Ok(UploadRecord {
                id: row.get(0)?,
                file_path: row.get(1)?,
                outcome,
                created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
            })
        })?;
        rows.collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
