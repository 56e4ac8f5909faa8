//! The session lifecycle: anonymous, login pending, authenticated,
//! expired or logged out again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use http::{Request, Response};
use smol_str::SmolStr;
use tokio::sync::RwLock;

use solid_authn_common::error::TransportError;
use solid_authn_common::http_client::HttpClient;
use solid_authn_common::storage::{MemoryStorage, Storage};
use solid_authn_oidc::issuer::IssuerConfigFetcher;
use solid_authn_oidc::keys::generate_nonce;
use solid_authn_oidc::request::revoke_token;

use crate::error::{Error, Result};
use crate::events::{EventChannel, SessionEvent};
use crate::fetch::AuthenticatedFetch;
use crate::login::{LoginOptions, login_handler_chain};
use crate::logout::{IdpLogoutOptions, end_session_url};
use crate::redirect::incoming_redirect_chain;
use crate::redirector::{RedirectOptions, Redirector};
use crate::refresh::TokenRefresher;
use crate::session_info::{SessionCredentials, SessionInfo, SessionInfoManager};
use crate::storage_utility::StorageUtility;
use crate::handler::Handler as _;

/// Dependencies a session is built from.
///
/// Both storages default to in-memory stores, which is right for tests and
/// single-run tools; anything that should survive a restart needs real
/// backends.
pub struct SessionConfig<T> {
    pub http_client: Arc<T>,
    /// Storage unreachable to other code on the host; holds tokens and keys.
    pub secure_storage: Arc<dyn Storage>,
    /// Storage for non-sensitive, potentially longer-lived values.
    pub insecure_storage: Arc<dyn Storage>,
    /// Fixed session id; a random one is generated when absent.
    pub session_id: Option<SmolStr>,
}

impl<T> SessionConfig<T> {
    /// A config over in-memory storage.
    pub fn with_client(http_client: T) -> Self {
        Self {
            http_client: Arc::new(http_client),
            secure_storage: Arc::new(MemoryStorage::new()),
            insecure_storage: Arc::new(MemoryStorage::new()),
            session_id: None,
        }
    }

    /// Use the given storage backends.
    pub fn with_storage(
        mut self,
        secure: Arc<dyn Storage>,
        insecure: Arc<dyn Storage>,
    ) -> Self {
        self.secure_storage = secure;
        self.insecure_storage = insecure;
        self
    }

    /// Pin the session id (required for [`Session::restore`]).
    pub fn with_session_id(mut self, session_id: impl Into<SmolStr>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// A user's session with their Solid identity.
///
/// Starts anonymous. [`Session::login`] sends the user away to their
/// identity provider; [`Session::handle_incoming_redirect`] completes the
/// round-trip and flips the session to authenticated;
/// [`Session::logout`] returns it to anonymous. Lifecycle changes are
/// reported on the event channel ([`Session::subscribe`]).
pub struct Session<T> {
    client: Arc<T>,
    storage: Arc<StorageUtility>,
    manager: Arc<SessionInfoManager>,
    issuer_fetcher: Arc<IssuerConfigFetcher>,
    redirector: Arc<Redirector>,
    events: EventChannel,
    info: RwLock<SessionInfo>,
    auth_fetch: RwLock<Option<Arc<AuthenticatedFetch<T>>>>,
    redirect_in_progress: AtomicBool,
}

impl<T> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl<T> Session<T>
where
    T: HttpClient + Send + Sync + 'static,
{
    /// A fresh anonymous session.
    pub fn new(config: SessionConfig<T>) -> Self {
        let storage = Arc::new(StorageUtility::new(
            config.secure_storage,
            config.insecure_storage,
        ));
        Self {
            client: config.http_client,
            manager: Arc::new(SessionInfoManager::new(storage.clone())),
            storage,
            issuer_fetcher: Arc::new(IssuerConfigFetcher::new()),
            redirector: Arc::new(Redirector::new()),
            events: EventChannel::new(),
            info: RwLock::new(SessionInfo::anonymous(
                config.session_id.unwrap_or_else(generate_nonce),
            )),
            auth_fetch: RwLock::new(None),
            redirect_in_progress: AtomicBool::new(false),
        }
    }

    /// Pick up a previously persisted session.
    ///
    /// Requires `config.session_id`. When a live record exists the session
    /// comes back authenticated and `SessionRestored` is emitted; a record
    /// whose tokens are expired beyond refresh is discarded and the
    /// session starts anonymous.
    pub async fn restore(config: SessionConfig<T>) -> Result<Self> {
        let Some(session_id) = config.session_id.clone() else {
            return Err(Error::Configuration(
                "restoring a session requires a `session_id`".into(),
            ));
        };
        let session = Self::new(config);
        let Some((info, credentials)) = session.manager.get(&session_id).await? else {
            return Ok(session);
        };
        if !info.is_logged_in {
            return Ok(session);
        }
        if credentials.token_set.expired() && credentials.token_set.refresh_token.is_none() {
            // Beyond saving; drop the stale record rather than restoring a
            // session that can only fail.
            session.manager.clear(&session_id).await?;
            return Ok(session);
        }

        *session.info.write().await = info.clone();
        session.install_fetch(info.session_id.clone(), credentials).await;
        session.events.emit(SessionEvent::SessionRestored);
        Ok(session)
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// A snapshot of the current session information.
    pub async fn info(&self) -> SessionInfo {
        self.info.read().await.clone()
    }

    /// Start the login flow. This navigates the user away (through the
    /// redirect callback); the session stays anonymous until the incoming
    /// redirect is handled.
    pub async fn login(&self, mut options: LoginOptions) -> Result<()> {
        options.session_id = self.info.read().await.session_id.clone();
        let chain = login_handler_chain(
            self.client.clone(),
            self.storage.clone(),
            self.issuer_fetcher.clone(),
            self.redirector.clone(),
        );
        chain.handle(options).await
    }

    /// Complete a login round-trip from the URL the user came back on.
    ///
    /// Returns the resulting session information, the current information
    /// unchanged when already logged in, or `None` when another call is
    /// mid-flight (concurrent invocations collapse into one exchange).
    pub async fn handle_incoming_redirect(&self, url: &str) -> Result<Option<SessionInfo>> {
        if self.info.read().await.is_logged_in {
            return Ok(Some(self.info.read().await.clone()));
        }
        if self.redirect_in_progress.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        let outcome = self.process_redirect(url).await;
        self.redirect_in_progress.store(false, Ordering::SeqCst);
        outcome.map(Some)
    }

    async fn process_redirect(&self, url: &str) -> Result<SessionInfo> {
        let chain = incoming_redirect_chain(
            self.client.clone(),
            self.storage.clone(),
            self.issuer_fetcher.clone(),
            self.manager.clone(),
            self.events.clone(),
        );
        let outcome = chain.handle(url.to_owned()).await?;

        debug_assert!(
            !outcome.session_info.is_logged_in || outcome.session_info.web_id.is_some(),
            "a logged-in session must carry a WebID"
        );

        *self.info.write().await = outcome.session_info.clone();
        match outcome.credentials {
            Some(credentials) if outcome.session_info.is_logged_in => {
                let web_id = credentials.token_set.web_id.clone();
                self.install_fetch(outcome.session_info.session_id.clone(), credentials)
                    .await;
                self.events.emit(SessionEvent::Login { web_id });
            }
            _ => {
                *self.auth_fetch.write().await = None;
            }
        }
        Ok(outcome.session_info)
    }

    async fn install_fetch(&self, session_id: SmolStr, credentials: SessionCredentials) {
        let refresher = Arc::new(TokenRefresher::new(
            self.client.clone(),
            self.issuer_fetcher.clone(),
            self.manager.clone(),
        ));
        *self.auth_fetch.write().await = Some(Arc::new(AuthenticatedFetch::new(
            self.client.clone(),
            session_id,
            credentials,
            refresher,
            self.events.clone(),
        )));
    }

    /// Fetch a resource. Authenticated when logged in, a plain passthrough
    /// otherwise.
    pub async fn fetch(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let auth = self.auth_fetch.read().await.clone();
        match auth {
            Some(auth) => auth.fetch(request).await,
            None => self
                .client
                .send_http(request)
                .await
                .map_err(|e| TransportError::Other(Box::new(e)).into()),
        }
    }

    /// Log out of the application: forget the persisted record and drop
    /// the token material. Does not end the session at the identity
    /// provider, but does revoke the tokens there when it offers a
    /// revocation endpoint (best effort; local logout never fails on it).
    pub async fn logout(&self) -> Result<()> {
        let session_id = self.info.read().await.session_id.clone();
        if let Some((_, credentials)) = self.manager.get(&session_id).await.ok().flatten() {
            self.revoke_tokens(&credentials).await;
        }
        self.manager.clear(&session_id).await?;
        *self.auth_fetch.write().await = None;
        {
            let mut info = self.info.write().await;
            info.is_logged_in = false;
            info.web_id = None;
            info.expiration_date = None;
        }
        self.events.emit(SessionEvent::Logout);
        Ok(())
    }

    async fn revoke_tokens(&self, credentials: &SessionCredentials) {
        let Ok(config) = self
            .issuer_fetcher
            .fetch_config(self.client.as_ref(), &credentials.issuer)
            .await
        else {
            return;
        };
        if config.revocation_endpoint.is_none() {
            return;
        }
        // Revoking the refresh token invalidates the whole grant; fall back
        // to the access token for refresh-less sessions.
        let token = credentials
            .token_set
            .refresh_token
            .clone()
            .unwrap_or_else(|| credentials.token_set.access_token.clone());
        let mut dpop = credentials.dpop.clone();
        if let Err(_e) = revoke_token(
            self.client.as_ref(),
            dpop.as_mut(),
            &config,
            &credentials.client,
            &token,
        )
        .await
        {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %_e, "token revocation failed");
        }
    }

    /// Log out locally and then end the session at the identity provider
    /// through its `end_session_endpoint`.
    pub async fn logout_at_idp(&self, options: IdpLogoutOptions) -> Result<()> {
        let session_id = self.info.read().await.session_id.clone();
        let Some((_, credentials)) = self.manager.get(&session_id).await? else {
            return Err(Error::Configuration(
                "cannot log out at the identity provider: not logged in".into(),
            ));
        };
        let config = self
            .issuer_fetcher
            .fetch_config(self.client.as_ref(), &credentials.issuer)
            .await?;
        let Some(endpoint) = &config.end_session_endpoint else {
            return Err(Error::Oidc(solid_authn_oidc::error::OidcError::NoEndpoint(
                "end_session".into(),
            )));
        };
        let target = end_session_url(
            endpoint,
            credentials.token_set.id_token.as_deref(),
            options.post_logout_redirect_uri.as_ref(),
            options.state.as_deref(),
        )?;

        self.logout().await?;
        self.redirector.redirect(
            &target,
            &RedirectOptions {
                handle_redirect: options.handle_redirect.clone(),
            },
        )
    }
}
