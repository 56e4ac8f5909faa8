//! Completing a login from an authorization-code response.

use std::sync::Arc;

use async_trait::async_trait;
use smol_str::SmolStr;

use solid_authn_common::http_client::HttpClient;
use solid_authn_oidc::issuer::{IssuerConfigFetcher, issuer_equivalent};
use solid_authn_oidc::request::exchange_code;

use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::login::{delete_auth_request, load_auth_request};
use crate::redirect::{RedirectInfo, parse_redirect_url};
use crate::session_info::{SessionCredentials, SessionInfo, SessionInfoManager};
use crate::storage_utility::StorageUtility;

/// Claims redirect URLs carrying `code` and `state`: the provider approved
/// the authorization. Exchanges the code, derives the WebID, and persists
/// the now-authenticated session.
pub struct AuthCodeRedirectHandler<T> {
    client: Arc<T>,
    storage: Arc<StorageUtility>,
    issuer_fetcher: Arc<IssuerConfigFetcher>,
    manager: Arc<SessionInfoManager>,
}

impl<T> AuthCodeRedirectHandler<T> {
    pub fn new(
        client: Arc<T>,
        storage: Arc<StorageUtility>,
        issuer_fetcher: Arc<IssuerConfigFetcher>,
        manager: Arc<SessionInfoManager>,
    ) -> Self {
        Self {
            client,
            storage,
            issuer_fetcher,
            manager,
        }
    }
}

#[async_trait]
impl<T> Handler<String, RedirectInfo> for AuthCodeRedirectHandler<T>
where
    T: HttpClient + Send + Sync + 'static,
{
    async fn can_handle(&self, redirect_url: &String) -> Result<bool> {
        let url = parse_redirect_url(redirect_url)?;
        let mut has_code = false;
        let mut has_state = false;
        for (name, _) in url.query_pairs() {
            match name.as_ref() {
                "code" => has_code = true,
                "state" => has_state = true,
                _ => {}
            }
        }
        Ok(has_code && has_state)
    }

    async fn handle(&self, redirect_url: String) -> Result<RedirectInfo> {
        let url = parse_redirect_url(&redirect_url)?;
        let mut code = None;
        let mut state: Option<SmolStr> = None;
        let mut iss: Option<String> = None;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.as_ref().into()),
                "iss" => iss = Some(value.into_owned()),
                _ => {}
            }
        }
        let (Some(code), Some(state)) = (code, state) else {
            return Err(Error::Redirect(
                "redirect URL lost its `code` or `state` parameter".into(),
            ));
        };

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("auth_code_redirect", state = %state).entered();

        let Some(auth_request) = load_auth_request(&self.storage, &state).await? else {
            return Err(Error::Redirect(format!(
                "unknown authorization state: {state}"
            )));
        };
        // One-shot: a replayed redirect must not trigger a second exchange.
        delete_auth_request(&self.storage, &state).await?;

        let config = self
            .issuer_fetcher
            .fetch_config(self.client.as_ref(), &auth_request.issuer)
            .await?;
        // https://datatracker.ietf.org/doc/html/rfc9207
        if let Some(iss) = iss {
            if !issuer_equivalent(&iss, &config.issuer) {
                return Err(Error::Redirect(format!(
                    "issuer mismatch: expected {}, got {iss}",
                    config.issuer
                )));
            }
        } else if config.authorization_response_iss_parameter_supported == Some(true) {
            return Err(Error::Redirect("missing `iss` parameter".into()));
        }

        let mut dpop = auth_request.dpop;
        let token_set = exchange_code(
            self.client.as_ref(),
            dpop.as_mut(),
            &config,
            &auth_request.client,
            &code,
            &auth_request.code_verifier,
            &auth_request.redirect_url,
        )
        .await?;

        let session_info = SessionInfo {
            session_id: auth_request.session_id,
            web_id: Some(token_set.web_id.clone()),
            is_logged_in: true,
            expiration_date: token_set.expires_at,
        };
        let credentials = SessionCredentials {
            issuer: auth_request.issuer,
            client: auth_request.client,
            token_set,
            dpop,
            redirect_url: Some(auth_request.redirect_url),
        };
        self.manager.register(&session_info, &credentials).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(web_id = %credentials.token_set.web_id, "login completed");

        Ok(RedirectInfo {
            session_info,
            credentials: Some(credentials),
        })
    }
}
