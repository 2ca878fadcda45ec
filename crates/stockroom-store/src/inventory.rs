//! Table operations for the account inventory.
//!
//! [`InventoryStore`] is the sole reader/writer of the inventory
//! schema: categories, active accounts, withdrawal history, the audit
//! log, and registered formats. Timestamps are unix seconds; callers
//! supply them so tests can control the clock.
//!
//! The one multi-step mutation is [`InventoryStore::withdraw_oldest`],
//! which moves the oldest accounts of a category into history as a
//! single all-or-nothing transaction.

use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::StoreResult;

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// Row counts for the fixed day / week / month windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounts {
    /// Rows with a timestamp in the last day.
    pub day: i64,
    /// Rows with a timestamp in the last week.
    pub week: i64,
    /// Rows with a timestamp in the last month.
    pub month: i64,
}

// ═══════════════════════════════════════════════════════════════════════
//  InventoryStore
// ═══════════════════════════════════════════════════════════════════════

/// Typed operations on the inventory tables.
#[derive(Clone)]
pub struct InventoryStore {
    db: Database,
}

impl InventoryStore {
    /// Create a new inventory store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ── categories ───────────────────────────────────────────────────

    /// Create a category. Returns `true` if a row was inserted,
    /// `false` if the name already existed (idempotent).
    #[instrument(skip(self))]
    pub async fn create_category(&self, name: &str, created_at: i64) -> StoreResult<bool> {
        let name = name.to_string();
        self.db
            .execute(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO categories (name, created_at) VALUES (?1, ?2) \
                     ON CONFLICT(name) DO NOTHING",
                    rusqlite::params![name, created_at],
                )?;
                Ok(inserted > 0)
            })
            .await
    }

    /// List category names in insertion order.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> StoreResult<Vec<String>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare("SELECT name FROM categories ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
    }

    /// Whether a category with this name exists.
    pub async fn category_exists(&self, name: &str) -> StoreResult<bool> {
        let name = name.to_string();
        self.db
            .execute(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM categories WHERE name = ?1",
                    rusqlite::params![name],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
    }

    /// Delete a category and all of its active accounts in one
    /// transaction. History for the category is retained. Returns
    /// `false` if no such category existed.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, name: &str) -> StoreResult<bool> {
        let name = name.to_string();
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                let deleted = tx.execute(
                    "DELETE FROM categories WHERE name = ?1",
                    rusqlite::params![name],
                )?;
                let accounts = tx.execute(
                    "DELETE FROM accounts WHERE category = ?1",
                    rusqlite::params![name],
                )?;
                tx.commit()?;
                debug!(category = %name, accounts, "category deleted");
                Ok(deleted > 0)
            })
            .await
    }

    // ── active accounts ──────────────────────────────────────────────

    /// Insert one account per payload, all tagged with the same
    /// category, format, and timestamp. One transaction; returns the
    /// number of rows inserted.
    #[instrument(skip(self, payloads))]
    pub async fn insert_batch(
        &self,
        category: &str,
        payloads: Vec<String>,
        format: &str,
        added_at: i64,
    ) -> StoreResult<usize> {
        let category = category.to_string();
        let format = format.to_string();
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO accounts (category, payload, format, added_at) \
                         VALUES (?1, ?2, ?3, ?4)",
                    )?;
                    for payload in &payloads {
                        stmt.execute(rusqlite::params![category, payload, format, added_at])?;
                    }
                }
                tx.commit()?;
                debug!(category = %category, count = payloads.len(), "batch inserted");
                Ok(payloads.len())
            })
            .await
    }

    /// All active accounts as `(category, payload)` pairs, in
    /// insertion order.
    #[instrument(skip(self))]
    pub async fn list_active_accounts(&self) -> StoreResult<Vec<(String, String)>> {
        self.db
            .execute(|conn| {
                let mut stmt =
                    conn.prepare("SELECT category, payload FROM accounts ORDER BY id ASC")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Total number of active accounts.
    pub async fn count_active(&self) -> StoreResult<i64> {
        self.db
            .execute(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
    }

    /// Delete every active account. Returns rows deleted.
    #[instrument(skip(self))]
    pub async fn delete_all_accounts(&self) -> StoreResult<usize> {
        self.db
            .execute(|conn| {
                let deleted = conn.execute("DELETE FROM accounts", [])?;
                Ok(deleted)
            })
            .await
    }

    // ── withdrawal ───────────────────────────────────────────────────

    /// Withdraw up to `count` of the oldest active accounts in
    /// `category`, moving each into history and logging the action.
    ///
    /// Selection order is `added_at ASC, id ASC` — insertion id breaks
    /// timestamp ties, so allocation is FIFO even when a whole batch
    /// shares one timestamp. The select, audit append, history insert,
    /// and delete all happen inside one transaction: either every
    /// selected account is archived, or none is.
    ///
    /// Returns the withdrawn payloads in selection order. Fewer rows
    /// than requested (including zero) is success, not an error.
    #[instrument(skip(self))]
    pub async fn withdraw_oldest(
        &self,
        category: &str,
        count: u32,
        retrieved_at: i64,
    ) -> StoreResult<Vec<String>> {
        let category = category.to_string();
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;

                let selected: Vec<(i64, String, String)> = {
                    let mut stmt = tx.prepare(
                        "SELECT id, payload, format FROM accounts WHERE category = ?1 \
                         ORDER BY added_at ASC, id ASC LIMIT ?2",
                    )?;
                    stmt.query_map(rusqlite::params![category, count], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?
                };

                for (id, payload, format) in &selected {
                    tx.execute(
                        "INSERT INTO audit_log (action, account_id, timestamp) \
                         VALUES ('retrieve', ?1, ?2)",
                        rusqlite::params![id, retrieved_at],
                    )?;
                    tx.execute(
                        "INSERT INTO history (category, payload, format, retrieved_at) \
                         VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![category, payload, format, retrieved_at],
                    )?;
                    tx.execute("DELETE FROM accounts WHERE id = ?1", rusqlite::params![id])?;
                }

                tx.commit()?;

                debug!(category = %category, withdrawn = selected.len(), "accounts withdrawn");
                Ok(selected.into_iter().map(|(_, payload, _)| payload).collect())
            })
            .await
    }

    // ── history ──────────────────────────────────────────────────────

    /// One page of withdrawn payloads for a category, newest first.
    /// `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn list_history(
        &self,
        category: &str,
        page: u32,
        page_size: u32,
    ) -> StoreResult<Vec<String>> {
        let category = category.to_string();
        let offset = page.saturating_sub(1) * page_size;
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT payload FROM history WHERE category = ?1 \
                     ORDER BY retrieved_at DESC, id DESC LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![category, page_size, offset], |row| {
                        row.get(0)
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Total number of history entries.
    pub async fn count_history(&self) -> StoreResult<i64> {
        self.db
            .execute(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
    }

    /// Delete history entries retrieved before `cutoff`. Returns rows
    /// deleted.
    #[instrument(skip(self))]
    pub async fn purge_history_before(&self, cutoff: i64) -> StoreResult<usize> {
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM history WHERE retrieved_at < ?1",
                    rusqlite::params![cutoff],
                )?;
                Ok(deleted)
            })
            .await
    }

    // ── formats ──────────────────────────────────────────────────────

    /// Register a format name. Returns `true` if a row was inserted.
    #[instrument(skip(self))]
    pub async fn create_format(&self, name: &str) -> StoreResult<bool> {
        let name = name.to_string();
        self.db
            .execute(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO formats (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                    rusqlite::params![name],
                )?;
                Ok(inserted > 0)
            })
            .await
    }

    /// Delete a format by name. Returns `true` if it existed.
    ///
    /// Accounts already tagged with the format keep their tag.
    #[instrument(skip(self))]
    pub async fn delete_format(&self, name: &str) -> StoreResult<bool> {
        let name = name.to_string();
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM formats WHERE name = ?1",
                    rusqlite::params![name],
                )?;
                Ok(deleted > 0)
            })
            .await
    }

    /// All registered format names, in insertion order.
    pub async fn list_formats(&self) -> StoreResult<Vec<String>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare("SELECT name FROM formats ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
    }

    /// Whether a format with this name is registered.
    pub async fn format_exists(&self, name: &str) -> StoreResult<bool> {
        let name = name.to_string();
        self.db
            .execute(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM formats WHERE name = ?1",
                    rusqlite::params![name],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
    }

    // ── statistics ───────────────────────────────────────────────────

    /// Count accounts added and accounts withdrawn since each of the
    /// three window-start timestamps.
    #[instrument(skip(self))]
    pub async fn window_counts(
        &self,
        day_start: i64,
        week_start: i64,
        month_start: i64,
    ) -> StoreResult<(WindowCounts, WindowCounts)> {
        self.db
            .execute(move |conn| {
                let count_since = |table: &str, column: &str, since: i64| -> StoreResult<i64> {
                    let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} >= ?1");
                    let count: i64 =
                        conn.query_row(&sql, rusqlite::params![since], |row| row.get(0))?;
                    Ok(count)
                };

                let added = WindowCounts {
                    day: count_since("accounts", "added_at", day_start)?,
                    week: count_since("accounts", "added_at", week_start)?,
                    month: count_since("accounts", "added_at", month_start)?,
                };
                let retrieved = WindowCounts {
                    day: count_since("history", "retrieved_at", day_start)?,
                    week: count_since("history", "retrieved_at", week_start)?,
                    month: count_since("history", "retrieved_at", month_start)?,
                };
                Ok((added, retrieved))
            })
            .await
    }

    /// Earliest and latest `added_at` among a category's active
    /// accounts, or `None` when the category has none.
    #[instrument(skip(self))]
    pub async fn category_date_range(&self, category: &str) -> StoreResult<Option<(i64, i64)>> {
        let category = category.to_string();
        self.db
            .execute(move |conn| {
                let range: (Option<i64>, Option<i64>) = conn.query_row(
                    "SELECT MIN(added_at), MAX(added_at) FROM accounts WHERE category = ?1",
                    rusqlite::params![category],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                match range {
                    (Some(first), Some(last)) => Ok(Some((first, last))),
                    _ => Ok(None),
                }
            })
            .await
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_store() -> InventoryStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        InventoryStore::new(db)
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn create_category_is_idempotent() {
        let store = setup_store().await;

        assert!(store.create_category("US", 100).await.unwrap());
        assert!(!store.create_category("US", 200).await.unwrap());
        assert_eq!(store.list_categories().await.unwrap(), vec!["US"]);
    }

    #[tokio::test]
    async fn categories_list_in_insertion_order() {
        let store = setup_store().await;

        store.create_category("DE", 1).await.unwrap();
        store.create_category("AT", 2).await.unwrap();
        store.create_category("CH", 3).await.unwrap();

        assert_eq!(
            store.list_categories().await.unwrap(),
            vec!["DE", "AT", "CH"]
        );
    }

    #[tokio::test]
    async fn withdraw_selects_oldest_first() {
        let store = setup_store().await;
        store.create_category("US", 0).await.unwrap();

        store
            .insert_batch("US", lines(&["a1"]), "fmt", 100)
            .await
            .unwrap();
        store
            .insert_batch("US", lines(&["a2"]), "fmt", 200)
            .await
            .unwrap();
        store
            .insert_batch("US", lines(&["a3"]), "fmt", 300)
            .await
            .unwrap();

        let got = store.withdraw_oldest("US", 2, 400).await.unwrap();
        assert_eq!(got, vec!["a1", "a2"]);

        let remaining = store.list_active_accounts().await.unwrap();
        assert_eq!(remaining, vec![("US".to_string(), "a3".to_string())]);
    }

    #[tokio::test]
    async fn withdraw_breaks_timestamp_ties_by_id() {
        let store = setup_store().await;
        store.create_category("US", 0).await.unwrap();

        // One batch: every account shares added_at = 100.
        store
            .insert_batch("US", lines(&["a1", "a2", "a3", "a4"]), "fmt", 100)
            .await
            .unwrap();

        let got = store.withdraw_oldest("US", 3, 200).await.unwrap();
        assert_eq!(got, vec!["a1", "a2", "a3"]);
    }

    #[tokio::test]
    async fn withdraw_moves_rows_to_history_and_audit_log() {
        let store = setup_store().await;
        store.create_category("US", 0).await.unwrap();
        store
            .insert_batch("US", lines(&["a1", "a2"]), "fmt", 100)
            .await
            .unwrap();

        let got = store.withdraw_oldest("US", 2, 500).await.unwrap();
        assert_eq!(got.len(), 2);

        assert_eq!(store.count_active().await.unwrap(), 0);
        assert_eq!(store.count_history().await.unwrap(), 2);

        let page = store.list_history("US", 1, 10).await.unwrap();
        assert_eq!(page.len(), 2);

        let audit_rows: i64 = store
            .db
            .execute(|conn| {
                let c: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM audit_log WHERE action = 'retrieve'",
                    [],
                    |row| row.get(0),
                )?;
                Ok(c)
            })
            .await
            .unwrap();
        assert_eq!(audit_rows, 2);
    }

    #[tokio::test]
    async fn withdraw_underfulfills_without_error() {
        let store = setup_store().await;
        store.create_category("US", 0).await.unwrap();
        store
            .insert_batch("US", lines(&["only"]), "fmt", 100)
            .await
            .unwrap();

        let got = store.withdraw_oldest("US", 10, 200).await.unwrap();
        assert_eq!(got, vec!["only"]);
        assert_eq!(store.count_active().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn withdraw_from_empty_category_returns_empty() {
        let store = setup_store().await;
        store.create_category("US", 0).await.unwrap();

        let got = store.withdraw_oldest("US", 5, 100).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn withdraw_only_touches_requested_category() {
        let store = setup_store().await;
        store.create_category("US", 0).await.unwrap();
        store.create_category("DE", 0).await.unwrap();
        store
            .insert_batch("US", lines(&["us1"]), "fmt", 100)
            .await
            .unwrap();
        store
            .insert_batch("DE", lines(&["de1"]), "fmt", 50)
            .await
            .unwrap();

        let got = store.withdraw_oldest("US", 5, 200).await.unwrap();
        assert_eq!(got, vec!["us1"]);
        assert_eq!(store.count_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_category_removes_active_but_keeps_history() {
        let store = setup_store().await;
        store.create_category("US", 0).await.unwrap();
        store
            .insert_batch("US", lines(&["a1", "a2"]), "fmt", 100)
            .await
            .unwrap();
        store.withdraw_oldest("US", 1, 150).await.unwrap();

        assert!(store.delete_category("US").await.unwrap());
        assert_eq!(store.count_active().await.unwrap(), 0);
        assert_eq!(store.count_history().await.unwrap(), 1);
        assert!(!store.delete_category("US").await.unwrap());
    }

    #[tokio::test]
    async fn history_pages_newest_first() {
        let store = setup_store().await;
        store.create_category("US", 0).await.unwrap();

        for i in 0..5 {
            store
                .insert_batch("US", lines(&[&format!("a{i}")]), "fmt", 100 + i)
                .await
                .unwrap();
            store.withdraw_oldest("US", 1, 200 + i).await.unwrap();
        }

        let page1 = store.list_history("US", 1, 2).await.unwrap();
        assert_eq!(page1, vec!["a4", "a3"]);
        let page2 = store.list_history("US", 2, 2).await.unwrap();
        assert_eq!(page2, vec!["a2", "a1"]);
        let page3 = store.list_history("US", 3, 2).await.unwrap();
        assert_eq!(page3, vec!["a0"]);
    }

    #[tokio::test]
    async fn purge_history_before_cutoff() {
        let store = setup_store().await;
        store.create_category("US", 0).await.unwrap();
        store
            .insert_batch("US", lines(&["old", "new"]), "fmt", 10)
            .await
            .unwrap();
        store.withdraw_oldest("US", 1, 100).await.unwrap();
        store.withdraw_oldest("US", 1, 900).await.unwrap();

        let purged = store.purge_history_before(500).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.count_history().await.unwrap(), 1);

        // Second run with the same cutoff removes nothing.
        let purged = store.purge_history_before(500).await.unwrap();
        assert_eq!(purged, 0);
    }

    #[tokio::test]
    async fn formats_roundtrip() {
        let store = setup_store().await;

        assert!(store.create_format("email|pass").await.unwrap());
        assert!(!store.create_format("email|pass").await.unwrap());
        assert!(store.format_exists("email|pass").await.unwrap());
        assert_eq!(store.list_formats().await.unwrap(), vec!["email|pass"]);

        assert!(store.delete_format("email|pass").await.unwrap());
        assert!(!store.delete_format("email|pass").await.unwrap());
        assert!(!store.format_exists("email|pass").await.unwrap());
    }

    #[tokio::test]
    async fn window_counts_respect_cutoffs() {
        let store = setup_store().await;
        store.create_category("US", 0).await.unwrap();
        store
            .insert_batch("US", lines(&["recent"]), "fmt", 1_000)
            .await
            .unwrap();
        store
            .insert_batch("US", lines(&["ancient"]), "fmt", 10)
            .await
            .unwrap();

        let (added, retrieved) = store.window_counts(500, 100, 5).await.unwrap();
        assert_eq!(added, WindowCounts { day: 1, week: 1, month: 2 });
        assert_eq!(retrieved, WindowCounts { day: 0, week: 0, month: 0 });
    }

    #[tokio::test]
    async fn category_date_range_present_and_absent() {
        let store = setup_store().await;
        store.create_category("US", 0).await.unwrap();

        assert!(store.category_date_range("US").await.unwrap().is_none());

        store
            .insert_batch("US", lines(&["a"]), "fmt", 100)
            .await
            .unwrap();
        store
            .insert_batch("US", lines(&["b"]), "fmt", 300)
            .await
            .unwrap();

        assert_eq!(
            store.category_date_range("US").await.unwrap(),
            Some((100, 300))
        );
    }

    #[tokio::test]
    async fn delete_all_accounts_clears_active_only() {
        let store = setup_store().await;
        store.create_category("US", 0).await.unwrap();
        store
            .insert_batch("US", lines(&["a1", "a2", "a3"]), "fmt", 100)
            .await
            .unwrap();
        store.withdraw_oldest("US", 1, 150).await.unwrap();

        let deleted = store.delete_all_accounts().await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count_active().await.unwrap(), 0);
        assert_eq!(store.count_history().await.unwrap(), 1);
        // Categories survive a bulk account wipe.
        assert_eq!(store.list_categories().await.unwrap(), vec!["US"]);
    }
}
