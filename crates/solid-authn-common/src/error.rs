//! Transport- and token-level error types shared across the workspace.

use miette::Diagnostic;

/// Transport-level errors that occur during HTTP communication.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum TransportError {
    /// Failed to establish connection to server
    #[error("connection error: {0}")]
    #[diagnostic(code(solid_authn::transport::connect))]
    Connect(String),

    /// Request timed out
    #[error("request timeout")]
    #[diagnostic(code(solid_authn::transport::timeout))]
    Timeout,

    /// Request construction failed (malformed URI, headers, etc.)
    #[error("invalid request: {0}")]
    #[diagnostic(code(solid_authn::transport::invalid_request))]
    InvalidRequest(String),

    /// Other transport error
    #[error("transport error: {0}")]
    #[diagnostic(code(solid_authn::transport::other))]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "reqwest-client")]
impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_builder() || e.is_request() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Other(Box::new(e))
        }
    }
}

/// Authentication and authorization errors surfaced by the fetch path.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum AuthError {
    /// Access token has expired (use refresh token to get a new one)
    #[error("access token expired")]
    #[diagnostic(code(solid_authn::auth::token_expired))]
    TokenExpired,

    /// Access token is invalid or malformed
    #[error("invalid access token")]
    #[diagnostic(code(solid_authn::auth::invalid_token))]
    InvalidToken,

    /// Token refresh request failed
    #[error("token refresh failed")]
    #[diagnostic(
        code(solid_authn::auth::refresh_failed),
        help("the session may need a full re-login")
    )]
    RefreshFailed,

    /// Request requires authentication but none was provided
    #[error("no authentication provided, but endpoint requires auth")]
    #[diagnostic(code(solid_authn::auth::not_authenticated))]
    NotAuthenticated,
}
