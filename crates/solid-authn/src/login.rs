//! Login dispatch: negotiating which login strategy applies to a set of
//! options, and the pending-authorization bookkeeping that survives the
//! round-trip to the identity provider.

pub mod implicit;
pub mod oidc;
pub mod webid;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use url::Url;

use solid_authn_common::http_client::HttpClient;
use solid_authn_oidc::dpop::DpopKeyMaterial;
use solid_authn_oidc::issuer::IssuerConfigFetcher;
use solid_authn_oidc::types::{ClientMetadata, Prompt, TokenType};

use crate::error::Result;
use crate::handler::AggregateHandler;
use crate::redirector::{RedirectCallback, Redirector};
use crate::storage_utility::{Scope, StorageUtility};

pub use self::implicit::LegacyImplicitFlowHandler;
pub use self::oidc::OidcLoginHandler;
pub use self::webid::WebIdLoginHandler;

/// Options supplied to [`crate::Session::login`].
#[derive(Clone)]
pub struct LoginOptions {
    /// Filled in by the session; any value set here is overwritten.
    pub session_id: SmolStr,
    /// The user's identity provider.
    pub oidc_issuer: Option<Url>,
    /// Where the provider should send the user back to.
    pub redirect_url: Option<Url>,
    /// Client identifier: a Solid client identifier document URL, or a
    /// statically registered id.
    pub client_id: Option<SmolStr>,
    /// Secret for statically registered confidential clients.
    pub client_secret: Option<SmolStr>,
    pub client_name: Option<SmolStr>,
    /// Token binding to request; DPoP unless the host opts out.
    pub token_type: TokenType,
    pub prompt: Option<Prompt>,
    /// Host-supplied navigation callback, handed to the [`Redirector`].
    pub handle_redirect: Option<Arc<RedirectCallback>>,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            session_id: SmolStr::default(),
            oidc_issuer: None,
            redirect_url: None,
            client_id: None,
            client_secret: None,
            client_name: None,
            token_type: TokenType::DPoP,
            prompt: None,
            handle_redirect: None,
        }
    }
}

// Hand-rolled so that a HandlerNotFound rendering never leaks the client
// secret into logs.
impl fmt::Debug for LoginOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginOptions")
            .field("session_id", &self.session_id)
            .field("oidc_issuer", &self.oidc_issuer.as_ref().map(Url::as_str))
            .field("redirect_url", &self.redirect_url.as_ref().map(Url::as_str))
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("client_name", &self.client_name)
            .field("token_type", &self.token_type)
            .field("prompt", &self.prompt)
            .field("handle_redirect", &self.handle_redirect.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl LoginOptions {
    /// The client registration these options describe, if a client id is
    /// present.
    pub(crate) fn client_metadata(&self) -> Option<ClientMetadata> {
        let client_id = self.client_id.clone()?;
        Some(ClientMetadata {
            client_id,
            client_secret: self.client_secret.clone(),
            client_name: self.client_name.clone(),
            redirect_uris: self.redirect_url.clone().into_iter().collect(),
        })
    }
}

/// State parked while the user is away at the identity provider, keyed by
/// the `state` parameter carried through the round-trip.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthRequestData {
    pub session_id: SmolStr,
    pub state: SmolStr,
    pub issuer: Url,
    pub redirect_url: Url,
    pub code_verifier: SmolStr,
    pub client: ClientMetadata,
    pub token_type: TokenType,
    pub dpop: Option<DpopKeyMaterial>,
}

const AUTH_REQUEST_PREFIX: &str = "solidClientAuthenticationRequest:";

fn auth_request_key(state: &str) -> String {
    format!("{AUTH_REQUEST_PREFIX}{state}")
}

pub(crate) async fn save_auth_request(
    storage: &StorageUtility,
    data: &AuthRequestData,
) -> Result<()> {
    storage
        .set(
            &auth_request_key(&data.state),
            serde_json::to_string(data)?,
            Scope::Secure,
        )
        .await
}

pub(crate) async fn load_auth_request(
    storage: &StorageUtility,
    state: &str,
) -> Result<Option<AuthRequestData>> {
    match storage.get(&auth_request_key(state), Scope::Secure).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub(crate) async fn delete_auth_request(storage: &StorageUtility, state: &str) -> Result<()> {
    storage.delete(&auth_request_key(state), Scope::Secure).await
}

/// The login chain, in priority order: WebID (reserved), OIDC
/// authorization code, legacy implicit flow (placeholder).
pub fn login_handler_chain<T>(
    client: Arc<T>,
    storage: Arc<StorageUtility>,
    issuer_fetcher: Arc<IssuerConfigFetcher>,
    redirector: Arc<Redirector>,
) -> AggregateHandler<LoginOptions, ()>
where
    T: HttpClient + Send + Sync + 'static,
{
    AggregateHandler::new(
        "login",
        vec![
            Box::new(WebIdLoginHandler),
            Box::new(OidcLoginHandler::new(
                client,
                storage,
                issuer_fetcher,
                redirector,
            )),
            Box::new(LegacyImplicitFlowHandler),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use solid_authn_common::storage::MemoryStorage;
    use solid_authn_oidc::keys::{generate_key, generate_pkce};

    #[test]
    fn debug_redacts_the_client_secret() {
        let rendered = format!(
            "{:?}",
            LoginOptions {
                client_secret: Some("hunter2".into()),
                ..Default::default()
            }
        );
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn auth_request_round_trip() {
        let storage = StorageUtility::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
        );
        let (_, verifier) = generate_pkce();
        let data = AuthRequestData {
            session_id: "s1".into(),
            state: "state-1".into(),
            issuer: Url::parse("https://idp.example").unwrap(),
            redirect_url: Url::parse("https://app.example/cb").unwrap(),
            code_verifier: verifier,
            client: ClientMetadata::public(
                Url::parse("https://app.example/id").unwrap(),
                vec![Url::parse("https://app.example/cb").unwrap()],
            ),
            token_type: TokenType::DPoP,
            dpop: Some(DpopKeyMaterial::new(
                generate_key(&["ES256".into()]).unwrap(),
            )),
        };
        save_auth_request(&storage, &data).await.unwrap();
        let loaded = load_auth_request(&storage, "state-1").await.unwrap().unwrap();
        assert_eq!(loaded, data);
        delete_auth_request(&storage, "state-1").await.unwrap();
        assert!(load_auth_request(&storage, "state-1").await.unwrap().is_none());
    }
}
