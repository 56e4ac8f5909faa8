//! OIDC/OAuth2 protocol plumbing for solid-authn: issuer discovery, token
//! grants, PKCE, compact JWS signing, and DPoP proof construction.
//! Session orchestration and handler dispatch live in `solid-authn`.

pub mod dpop;
pub mod error;
pub mod issuer;
pub mod jose;
pub mod keys;
pub mod request;
pub mod types;

/// Signing algorithm assumed when a server does not advertise
/// `dpop_signing_alg_values_supported`.
pub const FALLBACK_ALG: &str = "ES256";
