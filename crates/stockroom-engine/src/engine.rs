//! The inventory engine.
//!
//! [`InventoryEngine`] is the only caller of [`InventoryStore`] above
//! the persistence layer. It owns the allocation policy (FIFO, best
//! effort), input validation, the fixed statistic windows, and the
//! history retention threshold.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};

use stockroom_store::{InventoryStore, WindowCounts};

use crate::error::{EngineError, EngineResult};

/// Field labels every registered format name must contain.
pub const REQUIRED_FORMAT_FIELDS: [&str; 6] =
    ["email", "emailpass", "login", "pass", "reftoken", "clientid"];

/// History entries older than this are removed by the retention sweep.
const HISTORY_RETENTION_DAYS: i64 = 3;

/// Payloads per page when browsing withdrawal history.
pub const HISTORY_PAGE_SIZE: u32 = 10;

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// Accounts added and withdrawn in the fixed 1/7/30-day windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    pub added: WindowCounts,
    pub retrieved: WindowCounts,
}

/// How long ago a category last saw new stock.
///
/// `hours_since_*` is the residual after whole days, matching a
/// "N days, M hours ago" display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryActivity {
    pub first_added: DateTime<Utc>,
    pub last_added: DateTime<Utc>,
    pub days_since_first: i64,
    pub hours_since_first: i64,
    pub days_since_last: i64,
    pub hours_since_last: i64,
}

// ═══════════════════════════════════════════════════════════════════════
//  InventoryEngine
// ═══════════════════════════════════════════════════════════════════════

/// Allocation and lifecycle logic over the record store.
#[derive(Clone)]
pub struct InventoryEngine {
    store: InventoryStore,
}

impl InventoryEngine {
    /// Create a new engine over `store`.
    pub fn new(store: InventoryStore) -> Self {
        Self { store }
    }

    // ── categories ───────────────────────────────────────────────────

    /// Create a category. Creating an existing name is a no-op.
    #[instrument(skip(self))]
    pub async fn create_category(&self, name: &str, now: DateTime<Utc>) -> EngineResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation(
                "category name must not be empty".into(),
            ));
        }
        self.store.create_category(name, now.timestamp()).await?;
        Ok(())
    }

    /// Category names in insertion order.
    pub async fn list_categories(&self) -> EngineResult<Vec<String>> {
        Ok(self.store.list_categories().await?)
    }

    /// Delete a category and its active accounts. History is retained.
    #[instrument(skip(self))]
    pub async fn remove_category(&self, name: &str) -> EngineResult<()> {
        if !self.store.delete_category(name).await? {
            return Err(EngineError::NotFound {
                entity: "category",
                name: name.to_string(),
            });
        }
        info!(category = %name, "category removed");
        Ok(())
    }

    // ── adding stock ─────────────────────────────────────────────────

    /// Add a batch of account payloads to a category.
    ///
    /// Blank lines are dropped before insertion; a batch that is all
    /// blank is a validation error. The category and the format must
    /// both exist. Returns the number of accounts inserted.
    #[instrument(skip(self, lines))]
    pub async fn add_batch(
        &self,
        category: &str,
        lines: Vec<String>,
        format: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<usize> {
        let payloads: Vec<String> = lines
            .into_iter()
            .map(|line| line.trim_end_matches('\r').to_string())
            .filter(|line| !line.trim().is_empty())
            .collect();

        if payloads.is_empty() {
            return Err(EngineError::Validation(
                "the batch contains no accounts".into(),
            ));
        }

        if !self.store.category_exists(category).await? {
            return Err(EngineError::NotFound {
                entity: "category",
                name: category.to_string(),
            });
        }
        if !self.store.format_exists(format).await? {
            return Err(EngineError::NotFound {
                entity: "format",
                name: format.to_string(),
            });
        }

        let inserted = self
            .store
            .insert_batch(category, payloads, format, now.timestamp())
            .await?;
        info!(category = %category, inserted, "batch added");
        Ok(inserted)
    }

    // ── withdrawal ───────────────────────────────────────────────────

    /// Withdraw up to `count` accounts from a category, oldest first.
    ///
    /// Best effort: a category holding fewer than `count` yields all it
    /// has, an empty or unknown category yields an empty list. The
    /// archival of every selected account is all-or-nothing (one store
    /// transaction).
    #[instrument(skip(self))]
    pub async fn withdraw(
        &self,
        category: &str,
        count: u32,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<String>> {
        let payloads = self
            .store
            .withdraw_oldest(category, count, now.timestamp())
            .await?;
        info!(category = %category, requested = count, issued = payloads.len(), "withdrawal");
        Ok(payloads)
    }

    // ── inventory views ──────────────────────────────────────────────

    /// Active account counts per category, in first-seen order.
    pub async fn inventory_summary(&self) -> EngineResult<Vec<(String, usize)>> {
        let accounts = self.store.list_active_accounts().await?;
        let mut summary: Vec<(String, usize)> = Vec::new();
        for (category, _) in accounts {
            match summary.iter_mut().find(|(name, _)| *name == category) {
                Some((_, count)) => *count += 1,
                None => summary.push((category, 1)),
            }
        }
        Ok(summary)
    }

    /// Total number of active accounts.
    pub async fn total_active(&self) -> EngineResult<i64> {
        Ok(self.store.count_active().await?)
    }

    /// Delete every active account. Returns rows deleted.
    #[instrument(skip(self))]
    pub async fn wipe_accounts(&self) -> EngineResult<usize> {
        let deleted = self.store.delete_all_accounts().await?;
        info!(deleted, "all active accounts wiped");
        Ok(deleted)
    }

    /// One page of a category's withdrawal history, newest first.
    pub async fn history_page(&self, category: &str, page: u32) -> EngineResult<Vec<String>> {
        Ok(self
            .store
            .list_history(category, page.max(1), HISTORY_PAGE_SIZE)
            .await?)
    }

    // ── formats ──────────────────────────────────────────────────────

    /// Register a payload format.
    ///
    /// The name must contain every label in [`REQUIRED_FORMAT_FIELDS`]
    /// as a case-sensitive substring, in any order.
    #[instrument(skip(self))]
    pub async fn register_format(&self, name: &str) -> EngineResult<()> {
        let name = name.trim();
        let missing: Vec<&str> = REQUIRED_FORMAT_FIELDS
            .iter()
            .filter(|field| !name.contains(**field))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::Validation(format!(
                "format is missing required fields: {}",
                missing.join(", ")
            )));
        }
        self.store.create_format(name).await?;
        Ok(())
    }

    /// Remove a registered format. Accounts already tagged keep their
    /// tag.
    #[instrument(skip(self))]
    pub async fn remove_format(&self, name: &str) -> EngineResult<()> {
        if !self.store.delete_format(name).await? {
            return Err(EngineError::NotFound {
                entity: "format",
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// All registered format names.
    pub async fn list_formats(&self) -> EngineResult<Vec<String>> {
        Ok(self.store.list_formats().await?)
    }

    // ── statistics & retention ───────────────────────────────────────

    /// Accounts added and withdrawn in the last day, week, and month.
    #[instrument(skip(self))]
    pub async fn statistics(&self, now: DateTime<Utc>) -> EngineResult<Statistics> {
        let day_start = (now - Duration::days(1)).timestamp();
        let week_start = (now - Duration::weeks(1)).timestamp();
        let month_start = (now - Duration::days(30)).timestamp();

        let (added, retrieved) = self
            .store
            .window_counts(day_start, week_start, month_start)
            .await?;
        Ok(Statistics { added, retrieved })
    }

    /// Delete history entries older than the retention threshold.
    ///
    /// The cutoff is computed once from `now`, so entries archived
    /// while the sweep runs are never candidates. Idempotent. Returns
    /// rows removed.
    #[instrument(skip(self))]
    pub async fn retention_sweep(&self, now: DateTime<Utc>) -> EngineResult<usize> {
        let cutoff = (now - Duration::days(HISTORY_RETENTION_DAYS)).timestamp();
        let removed = self.store.purge_history_before(cutoff).await?;
        if removed > 0 {
            info!(removed, "retention sweep purged history");
        }
        Ok(removed)
    }

    /// When a category first and last received stock, as elapsed
    /// days + residual hours. `None` when the category holds no active
    /// accounts — withdrawal history is deliberately not consulted.
    #[instrument(skip(self))]
    pub async fn category_activity(
        &self,
        category: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<CategoryActivity>> {
        let Some((first, last)) = self.store.category_date_range(category).await? else {
            return Ok(None);
        };

        let first_added = DateTime::<Utc>::from_timestamp(first, 0).unwrap_or(now);
        let last_added = DateTime::<Utc>::from_timestamp(last, 0).unwrap_or(now);

        let split = |since: DateTime<Utc>| {
            let elapsed = now - since;
            let days = elapsed.num_days();
            let hours = (elapsed - Duration::days(days)).num_hours();
            (days, hours)
        };
        let (days_since_first, hours_since_first) = split(first_added);
        let (days_since_last, hours_since_last) = split(last_added);

        Ok(Some(CategoryActivity {
            first_added,
            last_added,
            days_since_first,
            hours_since_first,
            days_since_last,
            hours_since_last,
        }))
    }
}

// ── tests ────────────────────────────────────────────────────────────
