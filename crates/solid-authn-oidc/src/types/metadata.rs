use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// OpenID Provider configuration, as served from
/// `/.well-known/openid-configuration`.
///
/// Only the fields this library acts on are modeled; unknown fields are
/// ignored on deserialization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct IssuerConfig {
    // https://openid.net/specs/openid-connect-discovery-1_0.html#ProviderMetadata
    pub issuer: SmolStr,
    pub authorization_endpoint: SmolStr,
    pub token_endpoint: SmolStr,
    pub jwks_uri: Option<SmolStr>,
    pub registration_endpoint: Option<SmolStr>,
    pub scopes_supported: Option<Vec<SmolStr>>,
    pub response_types_supported: Option<Vec<SmolStr>>,
    pub grant_types_supported: Option<Vec<SmolStr>>,
    pub subject_types_supported: Option<Vec<SmolStr>>,
    pub id_token_signing_alg_values_supported: Option<Vec<SmolStr>>,
    pub claims_supported: Option<Vec<SmolStr>>,
    pub token_endpoint_auth_methods_supported: Option<Vec<SmolStr>>,

    // https://openid.net/specs/openid-connect-rpinitiated-1_0.html
    pub end_session_endpoint: Option<SmolStr>,

    // https://datatracker.ietf.org/doc/html/rfc7009
    pub revocation_endpoint: Option<SmolStr>,
    pub introspection_endpoint: Option<SmolStr>,

    // https://datatracker.ietf.org/doc/html/rfc7636#section-4.3
    pub code_challenge_methods_supported: Option<Vec<SmolStr>>,

    // https://datatracker.ietf.org/doc/html/rfc9207#section-3
    pub authorization_response_iss_parameter_supported: Option<bool>,

    // https://datatracker.ietf.org/doc/html/rfc9449#section-5.1
    pub dpop_signing_alg_values_supported: Option<Vec<SmolStr>>,

    // https://solidproject.org/TR/oidc#discovery
    pub solid_oidc_supported: Option<SmolStr>,
}

impl IssuerConfig {
    /// Whether the provider advertises the given grant type.
    ///
    /// A provider that omits `grant_types_supported` defaults to
    /// `authorization_code` and `implicit` per OIDC discovery.
    pub fn supports_grant(&self, grant: &str) -> bool {
        match &self.grant_types_supported {
            Some(grants) => grants.iter().any(|g| g == grant),
            None => grant == "authorization_code" || grant == "implicit",
        }
    }

    /// Whether the provider accepts S256 PKCE challenges.
    pub fn supports_s256_pkce(&self) -> bool {
        self.code_challenge_methods_supported
            .as_ref()
            .is_some_and(|methods| methods.iter().any(|m| m == "S256"))
    }

    /// Whether the provider binds access tokens with DPoP.
    pub fn supports_dpop(&self) -> bool {
        self.dpop_signing_alg_values_supported
            .as_ref()
            .is_some_and(|algs| !algs.is_empty())
    }
}
