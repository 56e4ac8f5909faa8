//! OIDC authorization-code login with PKCE.

use std::sync::Arc;

use async_trait::async_trait;

use solid_authn_common::http_client::HttpClient;
use solid_authn_oidc::dpop::DpopKeyMaterial;
use solid_authn_oidc::error::OidcError;
use solid_authn_oidc::issuer::IssuerConfigFetcher;
use solid_authn_oidc::keys::{generate_dpop_key, generate_nonce, generate_pkce};
use solid_authn_oidc::types::{
    AuthorizationRequestParameters, AuthorizationResponseType, CodeChallengeMethod, TokenType,
};

use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::login::{AuthRequestData, LoginOptions, save_auth_request};
use crate::redirector::{RedirectOptions, Redirector};
use crate::storage_utility::StorageUtility;

/// Scopes every Solid OIDC login asks for.
pub const DEFAULT_SCOPES: &str = "openid offline_access webid";

/// Builds the authorization request and sends the user to their identity
/// provider. Produces no session: login completes when the provider
/// redirects back and the incoming-redirect chain runs.
pub struct OidcLoginHandler<T> {
    client: Arc<T>,
    storage: Arc<StorageUtility>,
    issuer_fetcher: Arc<IssuerConfigFetcher>,
    redirector: Arc<Redirector>,
}

impl<T> OidcLoginHandler<T> {
    pub fn new(
        client: Arc<T>,
        storage: Arc<StorageUtility>,
        issuer_fetcher: Arc<IssuerConfigFetcher>,
        redirector: Arc<Redirector>,
    ) -> Self {
        Self {
            client,
            storage,
            issuer_fetcher,
            redirector,
        }
    }
}

#[async_trait]
impl<T> Handler<LoginOptions, ()> for OidcLoginHandler<T>
where
    T: HttpClient + Send + Sync + 'static,
{
    async fn can_handle(&self, options: &LoginOptions) -> Result<bool> {
        // Probes must stay side-effect-free: issuer discovery happens in
        // `handle`, never here.
        Ok(options.oidc_issuer.is_some()
            && options.redirect_url.is_some()
            && options.client_id.is_some())
    }

    async fn handle(&self, options: LoginOptions) -> Result<()> {
        let issuer = options
            .oidc_issuer
            .clone()
            .ok_or_else(|| Error::Configuration("login requires an `oidc_issuer`".into()))?;
        let redirect_url = options
            .redirect_url
            .clone()
            .ok_or_else(|| Error::Configuration("login requires a `redirect_url`".into()))?;
        let client_metadata = options
            .client_metadata()
            .ok_or_else(|| Error::Configuration("login requires a `client_id`".into()))?;

        #[cfg(feature = "tracing")]
        let _span =
            tracing::info_span!("oidc_login", issuer = %issuer, session_id = %options.session_id)
                .entered();

        let config = self
            .issuer_fetcher
            .fetch_config(self.client.as_ref(), &issuer)
            .await?;
        if !config.supports_grant("authorization_code") {
            return Err(OidcError::UnsupportedIssuer(format!(
                "{issuer} does not support the authorization_code grant"
            ))
            .into());
        }
        // Providers that advertise PKCE methods must offer S256; silence is
        // tolerated for providers that predate the metadata field.
        if config.code_challenge_methods_supported.is_some() && !config.supports_s256_pkce() {
            return Err(OidcError::UnsupportedIssuer(format!(
                "{issuer} does not support S256 PKCE challenges"
            ))
            .into());
        }

        let state = generate_nonce();
        let (code_challenge, code_verifier) = generate_pkce();
        let dpop = match options.token_type {
            TokenType::DPoP => {
                let key = generate_dpop_key(&config).ok_or_else(|| {
                    Error::Configuration(format!(
                        "{issuer} offers no DPoP algorithm this client can sign"
                    ))
                })?;
                Some(DpopKeyMaterial::new(key))
            }
            TokenType::Bearer => None,
        };

        save_auth_request(
            &self.storage,
            &AuthRequestData {
                session_id: options.session_id.clone(),
                state: state.clone(),
                issuer: issuer.clone(),
                redirect_url: redirect_url.clone(),
                code_verifier,
                client: client_metadata.clone(),
                token_type: options.token_type,
                dpop,
            },
        )
        .await?;

        let query = serde_html_form::to_string(AuthorizationRequestParameters {
            client_id: client_metadata.client_id.clone(),
            response_type: AuthorizationResponseType::Code,
            redirect_uri: redirect_url.as_str().into(),
            state,
            scope: Some(DEFAULT_SCOPES.into()),
            code_challenge,
            code_challenge_method: CodeChallengeMethod::S256,
            prompt: options.prompt,
            login_hint: None,
        })
        .map_err(OidcError::from)?;
        let target = url::Url::parse(&format!("{}?{query}", config.authorization_endpoint))
            .map_err(OidcError::from)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %config.authorization_endpoint, "redirecting to authorization endpoint");

        self.redirector.redirect(
            &target,
            &RedirectOptions {
                handle_redirect: options.handle_redirect.clone(),
            },
        )
    }
}
