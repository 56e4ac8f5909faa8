//! Shared substrate for the solid-authn crates: the HTTP transport seam,
//! pluggable key-value storage, and the common error taxonomy.

#![warn(missing_docs)]

pub use smol_str;

pub mod error;
/// HTTP client abstraction used by the solid-authn crates.
pub mod http_client;
/// Pluggable asynchronous key-value storage.
pub mod storage;

use smol_str::SmolStr;

/// Authorization token types attached to outgoing requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationToken {
    /// Plain bearer token.
    Bearer(SmolStr),
    /// DPoP-bound access token; requests carrying it must also carry a
    /// `DPoP` proof header.
    Dpop(SmolStr),
}

impl AuthorizationToken {
    /// Render the `Authorization` header value for this token.
    pub fn header_value(&self) -> String {
        match self {
            AuthorizationToken::Bearer(token) => format!("Bearer {token}"),
            AuthorizationToken::Dpop(token) => format!("DPoP {token}"),
        }
    }

    /// The bare token string.
    pub fn token(&self) -> &str {
        match self {
            AuthorizationToken::Bearer(token) | AuthorizationToken::Dpop(token) => token,
        }
    }
}
