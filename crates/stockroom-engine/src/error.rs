//! Error types for the stockroom-engine crate.

use thiserror::Error;

use stockroom_store::StoreError;

/// Alias for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by inventory operations.
///
/// Under-fulfilled withdrawals are deliberately NOT an error: asking
/// for more accounts than a category holds returns whatever is there.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operator input failed validation; the caller should re-prompt.
    #[error("{0}")]
    Validation(String),

    /// A referenced category or format no longer exists — usually a
    /// stale selection racing a delete.
    #[error("{entity} not found: {name}")]
    NotFound { entity: &'static str, name: String },

    /// The record store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] StoreError),
}
