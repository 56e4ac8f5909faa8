//! The authenticated fetch path: header attachment, DPoP proofs, and the
//! refresh-and-replay dance on auth failures.

use std::sync::Arc;

use chrono::Utc;
use http::{Request, Response, StatusCode};
use smol_str::SmolStr;
use tokio::sync::RwLock;

use solid_authn_common::AuthorizationToken;
use solid_authn_common::error::TransportError;
use solid_authn_common::http_client::HttpClient;
use solid_authn_oidc::dpop::{DpopTarget, wrap_request_with_dpop};
use solid_authn_oidc::types::TokenType;

use crate::error::{Error, Result};
use crate::events::{EventChannel, SessionEvent};
use crate::refresh::TokenRefresher;
use crate::session_info::SessionCredentials;

// Whether a resource server turned the request away for auth reasons.
// A 403 can be a plain authorization failure, but expired DPoP-bound
// tokens surface as either status depending on the server.
fn is_expected_auth_error(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// A fetch function bound to one session's token material.
///
/// Attaches `Authorization` (and, for DPoP sessions, a per-request proof),
/// and on a 401/403 refreshes the tokens once and replays the request. A
/// failed refresh is reported as [`SessionEvent::SessionExpired`] and the
/// original response is returned rather than an error, so resource-level
/// denials stay visible to the caller.
pub struct AuthenticatedFetch<T> {
    client: Arc<T>,
    session_id: SmolStr,
    credentials: RwLock<SessionCredentials>,
    refresher: Arc<TokenRefresher<T>>,
    events: EventChannel,
}

impl<T> AuthenticatedFetch<T>
where
    T: HttpClient + Send + Sync,
{
    pub fn new(
        client: Arc<T>,
        session_id: SmolStr,
        credentials: SessionCredentials,
        refresher: Arc<TokenRefresher<T>>,
        events: EventChannel,
    ) -> Self {
        Self {
            client,
            session_id,
            credentials: RwLock::new(credentials),
            refresher,
            events,
        }
    }

    /// The WebID this fetch acts as.
    pub async fn web_id(&self) -> url::Url {
        self.credentials.read().await.token_set.web_id.clone()
    }

    /// Send `request` with this session's credentials attached.
    pub async fn fetch(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let (parts, body) = request.into_parts();
        let response = self.send_once(&parts, &body).await?;
        if !is_expected_auth_error(response.status()) {
            return Ok(response);
        }

        let credentials = self.credentials.read().await.clone();
        if credentials.token_set.refresh_token.is_none() {
            self.events.emit(SessionEvent::SessionExpired);
            return Ok(response);
        }
        match self.refresher.refresh(&self.session_id, &credentials).await {
            Ok(refreshed) => {
                let expires_in = refreshed
                    .token_set
                    .expires_at
                    .map(|at| (at - Utc::now()).num_seconds());
                *self.credentials.write().await = refreshed;
                self.events.emit(SessionEvent::SessionExtended { expires_in });
                self.send_once(&parts, &body).await
            }
            Err(_refresh_failure) => {
                // The session is over, but the response the server already
                // gave is still the most useful thing to hand back.
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_refresh_failure, "token refresh failed");
                self.events.emit(SessionEvent::SessionExpired);
                Ok(response)
            }
        }
    }

    async fn send_once(
        &self,
        parts: &http::request::Parts,
        body: &[u8],
    ) -> Result<Response<Vec<u8>>> {
        // Write lock for the whole send: DPoP nonce rotation mutates the
        // key material, and proofs must not interleave per session.
        let mut credentials = self.credentials.write().await;

        let mut builder = Request::builder()
            .method(parts.method.clone())
            .uri(parts.uri.clone());
        for (name, value) in parts.headers.iter() {
            builder = builder.header(name, value);
        }
        let token_type = credentials.token_set.token_type;
        let token = match token_type {
            TokenType::DPoP => AuthorizationToken::Dpop(credentials.token_set.access_token.clone()),
            TokenType::Bearer => {
                AuthorizationToken::Bearer(credentials.token_set.access_token.clone())
            }
        };
        builder = builder.header("Authorization", token.header_value());
        let request = builder
            .body(body.to_vec())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))
            .map_err(Error::from)?;

        match (token_type, &mut credentials.dpop) {
            (TokenType::DPoP, Some(material)) => {
                Ok(wrap_request_with_dpop(
                    self.client.as_ref(),
                    material,
                    DpopTarget::Resource,
                    request,
                )
                .await?)
            }
            _ => self
                .client
                .send_http(request)
                .await
                .map_err(|e| TransportError::Other(Box::new(e)).into()),
        }
    }
}
