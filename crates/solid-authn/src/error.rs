use miette::Diagnostic;
use thiserror::Error;

use solid_authn_common::{
    error::{AuthError, TransportError},
    storage::StorageError,
};
use solid_authn_oidc::{dpop::DpopError, error::OidcError};

/// Errors emitted by the session layer.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// A required option is missing or unusable
    #[error("configuration error: {0}")]
    #[diagnostic(code(solid_authn::configuration))]
    Configuration(String),

    /// No handler in the chain claimed the input
    #[error("[{aggregate}] cannot find a suitable handler for: {params}")]
    #[diagnostic(
        code(solid_authn::handler_not_found),
        help("handler chains are ordered; check the options against each handler's requirements")
    )]
    HandlerNotFound {
        /// Name of the aggregate that ran out of handlers.
        aggregate: &'static str,
        /// Debug rendering of the rejected input.
        params: String,
    },

    /// A reserved extension point was invoked
    #[error("not implemented: {0}")]
    #[diagnostic(code(solid_authn::not_implemented))]
    NotImplemented(&'static str),

    /// Input that must be an absolute URL is not one
    #[error("[{input}] is not a valid URL, and cannot be used as a redirect URL")]
    #[diagnostic(code(solid_authn::invalid_url))]
    InvalidUrl {
        /// The rejected input.
        input: String,
        #[source]
        source: url::ParseError,
    },

    /// An incoming redirect could not be processed
    #[error("cannot process incoming redirect: {0}")]
    #[diagnostic(code(solid_authn::redirect))]
    Redirect(String),

    /// A persisted session record is not valid JSON
    #[error("stored data for session [{session_id}] is corrupted: {details}")]
    #[diagnostic(
        code(solid_authn::corrupted_session),
        help("clear the session's storage record and log in again")
    )]
    CorruptedSessionData {
        /// Session whose record failed to parse.
        session_id: String,
        details: String,
    },

    /// Storage backend failure
    #[error(transparent)]
    #[diagnostic(code(solid_authn::storage))]
    Storage(#[from] StorageError),

    /// OIDC protocol failure
    #[error(transparent)]
    #[diagnostic(code(solid_authn::oidc))]
    Oidc(#[from] OidcError),

    /// DPoP proof failure on the resource path
    #[error(transparent)]
    #[diagnostic(code(solid_authn::dpop))]
    Dpop(#[from] DpopError),

    /// Transport failure
    #[error(transparent)]
    #[diagnostic(code(solid_authn::transport))]
    Transport(#[from] TransportError),

    /// Authentication failure on the fetch path
    #[error(transparent)]
    #[diagnostic(code(solid_authn::auth))]
    Auth(#[from] AuthError),

    /// JSON (de)serialization failure
    #[error(transparent)]
    #[diagnostic(code(solid_authn::serde_json))]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
