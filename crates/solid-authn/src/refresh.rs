//! Refreshing a session's tokens and persisting the rotated material.

use std::sync::Arc;

use solid_authn_common::http_client::HttpClient;
use solid_authn_oidc::issuer::IssuerConfigFetcher;
use solid_authn_oidc::request::refresh_token;

use crate::error::Result;
use crate::session_info::{SessionCredentials, SessionInfo, SessionInfoManager};

/// Runs the refresh grant for a session and writes the outcome back to
/// storage, so that a restart after a refresh picks up the rotated tokens.
pub struct TokenRefresher<T> {
    client: Arc<T>,
    issuer_fetcher: Arc<IssuerConfigFetcher>,
    manager: Arc<SessionInfoManager>,
}

impl<T> TokenRefresher<T>
where
    T: HttpClient + Send + Sync,
{
    pub fn new(
        client: Arc<T>,
        issuer_fetcher: Arc<IssuerConfigFetcher>,
        manager: Arc<SessionInfoManager>,
    ) -> Self {
        Self {
            client,
            issuer_fetcher,
            manager,
        }
    }

    /// Refresh `credentials` and persist the result under `session_id`.
    pub async fn refresh(
        &self,
        session_id: &str,
        credentials: &SessionCredentials,
    ) -> Result<SessionCredentials> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("token_refresh", session_id = %session_id).entered();

        let config = self
            .issuer_fetcher
            .fetch_config(self.client.as_ref(), &credentials.issuer)
            .await?;
        let mut refreshed = credentials.clone();
        refreshed.token_set = refresh_token(
            self.client.as_ref(),
            refreshed.dpop.as_mut(),
            &config,
            &refreshed.client,
            &credentials.token_set,
        )
        .await?;

        let info = SessionInfo {
            session_id: session_id.into(),
            web_id: Some(refreshed.token_set.web_id.clone()),
            is_logged_in: true,
            expiration_date: refreshed.token_set.expires_at,
        };
        self.manager.register(&info, &refreshed).await?;
        Ok(refreshed)
    }
}
