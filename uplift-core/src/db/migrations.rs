//! Database migrations for Uplift.
//!
//! Simple migration system that tracks applied migrations and runs each only once.

use rusqlite::Connection;

/// SQL for the initial schema migration.
const MIGRATION_001_INITIAL: &str = r#"
-- API keys table (client secret and other credentials)
CREATE TABLE IF NOT EXISTS api_keys (
    name TEXT PRIMARY KEY,
    api_key TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (unixepoch()),
    updated_at INTEGER NOT NULL DEFAULT (unixepoch())
);

-- Settings table (key-value store for app preferences)
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (unixepoch())
);
"#;

/// SQL for the upload history migration.
const MIGRATION_002_UPLOAD_HISTORY: &str = r#"
-- One row per file handled by a batch
CREATE TABLE IF NOT EXISTS upload_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    outcome TEXT NOT NULL CHECK (outcome IN ('uploaded', 'skipped', 'failed')),
    activity_id INTEGER,
    reason TEXT,
    created_at INTEGER NOT NULL DEFAULT (unixepoch())
);

CREATE INDEX IF NOT EXISTS idx_upload_history_created ON upload_history(created_at);
"#;

/// All migrations in order. Each is (name, sql).
const MIGRATIONS: &[(&str, &str)] = &[
    ("001_initial", MIGRATION_001_INITIAL),
    ("002_upload_history", MIGRATION_002_UPLOAD_HISTORY),
];

/// Run all pending migrations.
///
/// Creates the migrations tracking table if needed, then applies any migrations
/// that haven't been run yet.
pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL DEFAULT (unixepoch())
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let applied: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
            [name],
            |row| row.get(0),
        )?;

        if !applied {
            tracing::info!(migration = %name, "Running migration");
            conn.execute_batch(sql)?;
            conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
            tracing::info!(migration = %name, "Migration complete");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i32);
    }

    #[test]
    fn test_migrations_create_expected_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            let rows = stmt.query_map([], |row| row.get(0)).unwrap();
            rows.map(|r| r.unwrap()).collect()
        };

        assert!(tables.contains(&"api_keys".to_string()));
        assert!(tables.contains(&"settings".to_string()));
        assert!(tables.contains(&"upload_history".to_string()));
        assert!(tables.contains(&"migrations".to_string()));
    }

    #[test]
    fn test_upload_history_rejects_unknown_outcome() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO upload_history (file_path, outcome) VALUES ('a.tcx', 'lost')",
            [],
        );
        assert!(result.is_err());
    }
}
