//! Schema migration system.
//!
//! Migrations are static SQL strings keyed by version number. Applied
//! versions are recorded in a `_migrations` table, so running the set
//! again is a no-op.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

/// A single migration: version, label, and the SQL that applies it.
/// Add new migrations at the end; never edit an applied one.
struct Migration {
    version: u32,
    label: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        label: "inventory schema — categories, accounts, history, audit_log, formats",
        sql: r#"
            CREATE TABLE categories (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                name       TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE accounts (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                payload  TEXT NOT NULL,
                format   TEXT NOT NULL,
                added_at INTEGER NOT NULL
            );
            CREATE INDEX idx_accounts_fifo ON accounts(category, added_at, id);

            CREATE TABLE history (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                category     TEXT NOT NULL,
                payload      TEXT NOT NULL,
                format       TEXT NOT NULL,
                retrieved_at INTEGER NOT NULL
            );
            CREATE INDEX idx_history_page ON history(category, retrieved_at);

            CREATE TABLE audit_log (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                action     TEXT NOT NULL,
                account_id INTEGER NOT NULL,
                timestamp  INTEGER NOT NULL
            );

            CREATE TABLE formats (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
        "#,
    },
    Migration {
        version: 2,
        label: "gateway_state — key-value store for transport state (poll offsets)",
        sql: r#"
            CREATE TABLE gateway_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#,
    },
];

// ── public API ───────────────────────────────────────────────────────

/// Run all pending migrations against `conn`.
///
/// This is a **synchronous** function — call it from `spawn_blocking`.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version    INTEGER PRIMARY KEY,
            label      TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        );",
    )
    .map_err(|e| migration_failed(0, format!("bookkeeping table: {e}")))?;

    let current = current_version(conn)?;
    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration)?;
        applied += 1;
    }

    if applied == 0 {
        debug!(current_version = current, "database schema is up to date");
    } else {
        info!(from = current, applied, "migrations applied");
    }
    Ok(())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| migration_failed(0, format!("reading current version: {e}")))
}

// ── internals ────────────────────────────────────────────────────────

fn migration_failed(version: u32, message: String) -> StoreError {
    StoreError::Migration { version, message }
}

/// Apply one migration inside its own transaction: the DDL and the
/// bookkeeping row land together or not at all.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    info!(version = migration.version, label = migration.label, "applying migration");
    let fail = |message: String| migration_failed(migration.version, message);

    // `conn.transaction()` needs `&mut Connection`, so the transaction
    // is managed manually here.
    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| fail(format!("begin: {e}")))?;

    let outcome = conn
        .execute_batch(migration.sql)
        .map_err(|e| fail(format!("sql: {e}")))
        .and_then(|_| {
            conn.execute(
                "INSERT INTO _migrations (version, label, applied_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    migration.version,
                    migration.label,
                    chrono::Utc::now().timestamp()
                ],
            )
            .map(|_| ())
            .map_err(|e| fail(format!("bookkeeping row: {e}")))
        });

    match outcome {
        Ok(()) => conn
            .execute_batch("COMMIT;")
            .map_err(|e| fail(format!("commit: {e}"))),
        Err(err) => {
            warn!(version = migration.version, %err, "migration failed, rolling back");
            let _ = conn.execute_batch("ROLLBACK;");
            Err(err)
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// The expected latest migration version (update when adding migrations).
    const LATEST_VERSION: u32 = 2;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        conn
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[1].version > window[0].version,
                "migration versions must be strictly increasing: {} >= {}",
                window[0].version,
                window[1].version,
            );
        }
    }

    #[test]
    fn run_all_on_fresh_db() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), LATEST_VERSION);
    }

    #[test]
    fn run_all_is_idempotent() {
        let conn = setup_conn();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), LATEST_VERSION);
    }

    #[test]
    fn migrations_create_all_tables() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
                )
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .map(|r| r.unwrap())
                .collect()
        };

        // v1 tables
        assert!(tables.contains(&"categories".to_string()));
        assert!(tables.contains(&"accounts".to_string()));
        assert!(tables.contains(&"history".to_string()));
        assert!(tables.contains(&"audit_log".to_string()));
        assert!(tables.contains(&"formats".to_string()));
        // v2 tables
        assert!(tables.contains(&"gateway_state".to_string()));
    }

    #[test]
    fn category_names_are_unique() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO categories (name, created_at) VALUES ('US', 0)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO categories (name, created_at) VALUES ('US', 1)",
            [],
        );
        assert!(dup.is_err());
    }
}
