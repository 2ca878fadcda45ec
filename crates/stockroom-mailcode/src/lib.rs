//! # stockroom-mailcode
//!
//! Credential-lookup collaborator for Stockroom.
//!
//! Given an account's OAuth refresh token and client id, exchanges them
//! for an access token at the Microsoft identity endpoint, then queries
//! the mailbox via the Graph API for the most recent message from the
//! verification sender and extracts the 6-digit code from its body.
//!
//! Implements [`CodeResolver`], the seam the conversation layer calls.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use stockroom_dialog::{CodeResolver, ResolveError};

/// Common-tenant token endpoint for the refresh-token grant.
const TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Graph endpoint listing the signed-in mailbox's messages.
const MESSAGES_URL: &str = "https://graph.microsoft.com/v1.0/me/messages";

/// Scope requested with the refreshed token.
const TOKEN_SCOPE: &str = "https://graph.microsoft.com/.default offline_access";

/// Default sender whose messages carry the verification code.
const DEFAULT_CODE_SENDER: &str = "no-reply@tiktok.com";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the token exchange or the mail query.
#[derive(Debug, Error)]
pub enum MailCodeError {
    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The identity endpoint rejected the refresh token / client id.
    #[error("token refresh rejected (status {status}): {detail}")]
    TokenRejected { status: u16, detail: String },

    /// A response did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// Raw token response from the identity endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Raw error response from the identity endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    value: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    body: Option<MessageBody>,
    #[serde(rename = "bodyPreview")]
    body_preview: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Verification-code lookup client.
pub struct MailCodeClient {
    http: reqwest::Client,
    token_url: String,
    messages_url: String,
    sender: String,
}

impl Default for MailCodeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MailCodeClient {
    /// Create a client against the production endpoints.
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: TOKEN_URL.to_string(),
            messages_url: MESSAGES_URL.to_string(),
            sender: DEFAULT_CODE_SENDER.to_string(),
        }
    }

    /// Override the sender address the mailbox is searched for.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    /// Resolve the latest verification code for an account.
    ///
    /// `Ok(None)` means the lookup worked but no matching message (or
    /// no code in it) was found.
    pub async fn resolve(
        &self,
        refresh_token: &str,
        client_id: &str,
        mailbox: &str,
    ) -> Result<Option<String>, MailCodeError> {
        debug!(mailbox = %mailbox, "resolving verification code");
        let access_token = self.refresh_access_token(refresh_token, client_id).await?;
        self.latest_code(&access_token).await
    }

    /// Exchange a refresh token + client id for an access token.
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
        client_id: &str,
    ) -> Result<String, MailCodeError> {
        let params = [
            ("client_id", client_id),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("scope", TOKEN_SCOPE),
        ];

        let response = self.http.post(&self.token_url).form(&params).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| e.error_description.unwrap_or(e.error))
                .unwrap_or(body);
            warn!(status = status.as_u16(), "token refresh rejected");
            return Err(MailCodeError::TokenRejected {
                status: status.as_u16(),
                detail,
            });
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| MailCodeError::Malformed(format!("token response: {e}")))?;
        Ok(tokens.access_token)
    }

    /// Fetch the newest message from the verification sender and pull
    /// the code out of its body.
    async fn latest_code(&self, access_token: &str) -> Result<Option<String>, MailCodeError> {
        let mut url = Url::parse(&self.messages_url)
            .map_err(|e| MailCodeError::Malformed(format!("messages url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("$search", &format!("\"from:{}\"", self.sender))
            .append_pair("$top", "1");

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?;

        let messages: MessageList = response
            .json()
            .await
            .map_err(|e| MailCodeError::Malformed(format!("message list: {e}")))?;

        let Some(message) = messages.value.first() else {
            debug!("no messages from the verification sender");
            return Ok(None);
        };

        let body = message
            .body
            .as_ref()
            .and_then(|b| b.content.as_deref())
            .or(message.body_preview.as_deref())
            .unwrap_or_default();

        Ok(extract_code(body).map(str::to_string))
    }
}

/// First standalone 6-digit group in `body`, if any.
fn extract_code(body: &str) -> Option<&str> {
    static CODE_RE: OnceLock<Regex> = OnceLock::new();
    let re = CODE_RE.get_or_init(|| Regex::new(r"\b(\d{6})\b").expect("valid code regex"));
    re.captures(body).map(|caps| caps.get(1).unwrap().as_str())
}

// ---------------------------------------------------------------------------
// CodeResolver seam
// ---------------------------------------------------------------------------

#[async_trait]
impl CodeResolver for MailCodeClient {
    async fn resolve_code(
        &self,
        refresh_token: &str,
        client_id: &str,
        mailbox: &str,
    ) -> Result<Option<String>, ResolveError> {
        self.resolve(refresh_token, client_id, mailbox)
            .await
            .map_err(|e| ResolveError(e.to_string()))
    }
}

// ── tests ────────────────────────────────────────────────────────────
