//! Seam to the external credential-lookup collaborator.
//!
//! The get-code flow needs one capability: exchange a refresh token +
//! client id for a mailbox's latest 6-digit verification code. The
//! concrete implementation (OAuth + mail API) lives outside the core;
//! tests plug in a stub.

use async_trait::async_trait;
use thiserror::Error;

/// The lookup itself failed (transport, rejected token, ...).
///
/// Distinct from `Ok(None)`, which means the lookup worked but no code
/// was waiting in the mailbox.
#[derive(Debug, Error)]
#[error("code lookup failed: {0}")]
pub struct ResolveError(pub String);

/// Resolves the most recent verification code for a mailbox.
#[async_trait]
pub trait CodeResolver: Send + Sync {
    async fn resolve_code(
        &self,
        refresh_token: &str,
        client_id: &str,
        mailbox: &str,
    ) -> Result<Option<String>, ResolveError>;
}
