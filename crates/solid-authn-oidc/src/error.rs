use http::StatusCode;
use miette::Diagnostic;
use serde_json::Value;
use smol_str::SmolStr;
use thiserror::Error;

use solid_authn_common::error::TransportError;

/// Errors emitted by the OIDC protocol helpers.
#[derive(Debug, Error, Diagnostic)]
pub enum OidcError {
    /// Issuer discovery document could not be retrieved or is invalid
    #[error("issuer discovery failed: {0}")]
    #[diagnostic(
        code(solid_authn_oidc::discovery),
        help("check that the issuer serves /.well-known/openid-configuration")
    )]
    Discovery(String),

    /// Discovery document names a different issuer than the one queried
    #[error("issuer mismatch: expected {expected}, got {got}")]
    #[diagnostic(code(solid_authn_oidc::issuer_mismatch))]
    IssuerMismatch {
        /// Issuer the discovery document was fetched from.
        expected: SmolStr,
        /// Issuer the document claims.
        got: SmolStr,
    },

    /// Server does not advertise an endpoint required by the operation
    #[error("no {0} endpoint available")]
    #[diagnostic(
        code(solid_authn_oidc::no_endpoint),
        help("server does not advertise this endpoint")
    )]
    NoEndpoint(SmolStr),

    /// Server rejected or cannot satisfy a grant the client requires
    #[error("issuer is not usable for this client: {0}")]
    #[diagnostic(code(solid_authn_oidc::unsupported_issuer))]
    UnsupportedIssuer(String),

    /// No refresh token available for a refresh grant
    #[error("no refresh token available")]
    #[diagnostic(code(solid_authn_oidc::no_refresh_token))]
    NoRefreshToken,

    /// An ID or access token is structurally invalid
    #[error("malformed token: {0}")]
    #[diagnostic(code(solid_authn_oidc::malformed_token))]
    MalformedToken(String),

    /// Token response carried no usable identity
    #[error("token response verification failed: {0}")]
    #[diagnostic(
        code(solid_authn_oidc::token_verification),
        help("the ID token must carry a `webid` claim or a URL-shaped `sub`")
    )]
    TokenVerification(String),

    /// Invalid or unsupported JWK
    #[error("invalid JWK: {0}")]
    #[diagnostic(
        code(solid_authn_oidc::jwk),
        help("ensure EC P-256 JWK with base64url x,y,d values")
    )]
    Jwk(String),

    /// DPoP proof construction or nonce negotiation failed
    #[error(transparent)]
    #[diagnostic(code(solid_authn_oidc::dpop))]
    Dpop(#[from] crate::dpop::DpopError),

    /// Unexpected HTTP status from the server
    #[error("http status: {0}")]
    #[diagnostic(
        code(solid_authn_oidc::http_status),
        help("check well-known paths and server configuration")
    )]
    HttpStatus(StatusCode),

    /// Error HTTP status carrying a JSON error body
    #[error("http status: {status}, body: {body:?}")]
    #[diagnostic(
        code(solid_authn_oidc::http_status_body),
        help("server returned error JSON; inspect fields like `error`, `error_description`")
    )]
    HttpStatusWithBody {
        /// Status code of the response.
        status: StatusCode,
        /// Decoded JSON error body.
        body: Value,
    },

    /// Transport failure
    #[error(transparent)]
    #[diagnostic(code(solid_authn_oidc::transport))]
    Transport(#[from] TransportError),

    /// Request construction failure
    #[error(transparent)]
    #[diagnostic(code(solid_authn_oidc::http_build))]
    HttpBuild(#[from] http::Error),

    /// JSON (de)serialization failure
    #[error(transparent)]
    #[diagnostic(code(solid_authn_oidc::serde_json))]
    SerdeJson(#[from] serde_json::Error),

    /// Form serialization failure
    #[error(transparent)]
    #[diagnostic(code(solid_authn_oidc::serde_form))]
    SerdeHtmlForm(#[from] serde_html_form::ser::Error),

    /// URL parse failure
    #[error(transparent)]
    #[diagnostic(code(solid_authn_oidc::url))]
    Url(#[from] url::ParseError),
}

pub type Result<T> = core::result::Result<T, OidcError>;
