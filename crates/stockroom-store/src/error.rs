//! Error types for the stockroom-store crate.
//!
//! Every storage operation returns [`StoreError`] via [`StoreResult`].
//! Callers treat any variant as "the store is unavailable for this
//! turn": the conversation layer reports it and lets the operator
//! retry, it never retries inside a single turn itself.

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying SQLite call failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A schema migration could not be applied.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The blocking-pool task running the query was cancelled or
    /// panicked.
    #[error("storage task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
