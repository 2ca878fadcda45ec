//! Key-value store for persistent transport state.
//!
//! Holds small string pairs that must survive restarts — currently the
//! Telegram long-poll offset, so a restarted gateway does not replay
//! updates it already handled.

use rusqlite::OptionalExtension;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::StoreResult;

/// Persistent key-value store for gateway state.
#[derive(Clone)]
pub struct GatewayStateStore {
    db: Database,
}

impl GatewayStateStore {
    /// Create a new gateway state store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a value by key, returning `None` if not found.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let value = conn
                    .query_row(
                        "SELECT value FROM gateway_state WHERE key = ?1",
                        rusqlite::params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await
    }

    /// Set a value for a key (insert or update).
    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO gateway_state (key, value) VALUES (?1, ?2) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    rusqlite::params![key, value],
                )?;
                debug!(key = %key, "gateway state updated");
                Ok(())
            })
            .await
    }

    /// Get a value parsed as i64, returning `None` if unset or unparseable.
    pub async fn get_i64(&self, key: &str) -> StoreResult<Option<i64>> {
        Ok(self.get(key).await?.and_then(|v| v.parse().ok()))
    }

    /// Set an i64 value.
    pub async fn set_i64(&self, key: &str, value: i64) -> StoreResult<()> {
        self.set(key, &value.to_string()).await
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_store() -> GatewayStateStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        GatewayStateStore::new(db)
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let store = setup_store().await;
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_overwrite() {
        let store = setup_store().await;

        store.set("offset", "old").await.unwrap();
        store.set("offset", "new").await.unwrap();
        assert_eq!(store.get("offset").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn i64_roundtrip() {
        let store = setup_store().await;

        store.set_i64("offset", 1234).await.unwrap();
        assert_eq!(store.get_i64("offset").await.unwrap(), Some(1234));

        store.set("offset", "garbage").await.unwrap();
        assert_eq!(store.get_i64("offset").await.unwrap(), None);
    }
}
