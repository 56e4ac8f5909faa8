use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use url::Url;

/// How a client identifies itself to the identity provider.
///
/// Solid OIDC clients usually identify with a public client identifier
/// document (the client id is a dereferenceable URL); statically registered
/// clients carry an opaque id and, for confidential clients, a secret.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientMetadata {
    pub client_id: SmolStr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<SmolStr>,
    pub redirect_uris: Vec<Url>,
}

impl ClientMetadata {
    /// A public client identified by a client identifier document URL.
    pub fn public(client_id: Url, redirect_uris: Vec<Url>) -> Self {
        Self {
            client_id: client_id.as_str().into(),
            client_secret: None,
            client_name: None,
            redirect_uris,
        }
    }

    /// A statically registered client.
    pub fn registered(
        client_id: impl Into<SmolStr>,
        client_secret: Option<SmolStr>,
        redirect_uris: Vec<Url>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            client_name: None,
            redirect_uris,
        }
    }

    /// Whether the client id is a Solid client identifier document URL.
    pub fn is_public_identifier(&self) -> bool {
        Url::parse(&self.client_id)
            .is_ok_and(|u| u.scheme() == "https" || u.scheme() == "http")
    }

    /// Whether this client authenticates at the token endpoint with a secret.
    pub fn is_confidential(&self) -> bool {
        self.client_secret.is_some()
    }
}
