//! # stockroom-engine
//!
//! Inventory engine for Stockroom.
//!
//! Wraps the record store with the allocation semantics: batch adds
//! with blank-line filtering, oldest-first withdrawal into history,
//! format-field validation, windowed statistics, the retention sweep,
//! and the per-category activity report.
//!
//! Every clock-dependent operation takes `now` as a parameter; the
//! engine never reads the wall clock itself.

pub mod engine;
pub mod error;

// ── re-exports ───────────────────────────────────────────────────────

pub use engine::{
    CategoryActivity, InventoryEngine, Statistics, HISTORY_PAGE_SIZE, REQUIRED_FORMAT_FIELDS,
};
pub use error::{EngineError, EngineResult};
