//! # stockroom-store
//!
//! Record store for Stockroom.
//!
//! SQLite-backed persistence for the account inventory: active accounts
//! grouped by category, the withdrawal history, the append-only audit
//! log, and registered payload formats. The store is the sole owner of
//! the schema; everything above it goes through [`InventoryStore`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  InventoryStore  (typed table operations) │
//! │  GatewayStateStore (key-value, offsets)   │
//! ├──────────────────────────────────────────┤
//! │  Database (rusqlite WAL, blocking pool)   │
//! │  Migrations (versioned, transactional)    │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use stockroom_store::{Database, InventoryStore};
//!
//! let db = Database::open_and_migrate("data/stockroom.db").await?;
//! let store = InventoryStore::new(db);
//! let payloads = store.withdraw_oldest("US", 5, now).await?;
//! ```

pub mod db;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod migration;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use gateway::GatewayStateStore;
pub use inventory::{InventoryStore, WindowCounts};
