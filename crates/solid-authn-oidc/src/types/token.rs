use super::response::TokenType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use url::Url;

/// Token material held by an authenticated session.
///
/// This is what gets persisted (inside the session's storage record) and
/// what the authenticated fetch path reads on every request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// Issuer the tokens were obtained from.
    pub issuer: SmolStr,
    /// The WebID derived from the ID token at exchange time.
    pub web_id: Url,
    pub access_token: SmolStr,
    pub token_type: TokenType,
    pub refresh_token: Option<SmolStr>,
    /// Kept for RP-initiated logout (`id_token_hint`).
    pub id_token: Option<SmolStr>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Whether the access token's lifetime has elapsed. Tokens without an
    /// expiry are assumed live.
    pub fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}
