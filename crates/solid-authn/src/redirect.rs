//! Incoming-redirect dispatch: interpreting the URL the user comes back on
//! after visiting their identity provider.

pub mod auth_code;
pub mod error;
pub mod fallback;

use std::sync::Arc;

use url::Url;

use solid_authn_common::http_client::HttpClient;
use solid_authn_oidc::issuer::IssuerConfigFetcher;

use crate::error::{Error, Result};
use crate::events::EventChannel;
use crate::handler::AggregateHandler;
use crate::session_info::{SessionCredentials, SessionInfo, SessionInfoManager};
use crate::storage_utility::StorageUtility;

pub use self::auth_code::AuthCodeRedirectHandler;
pub use self::error::ErrorRedirectHandler;
pub use self::fallback::FallbackRedirectHandler;

/// Outcome of handling an incoming redirect.
#[derive(Debug)]
pub struct RedirectInfo {
    pub session_info: SessionInfo,
    /// Token material when the redirect completed a login.
    pub credentials: Option<SessionCredentials>,
}

impl RedirectInfo {
    pub(crate) fn unauthenticated() -> Self {
        Self {
            session_info: SessionInfo::fresh(),
            credentials: None,
        }
    }
}

/// Every handler's precondition: the input must be an absolute URL. A parse
/// failure is an error, not a declined probe, so the aggregate surfaces it
/// instead of falling through.
pub(crate) fn parse_redirect_url(input: &str) -> Result<Url> {
    Url::parse(input).map_err(|source| Error::InvalidUrl {
        input: input.to_owned(),
        source,
    })
}

/// The incoming-redirect chain, in priority order: provider errors, the
/// authorization-code response, then a catch-all for URLs carrying nothing
/// of interest.
pub fn incoming_redirect_chain<T>(
    client: Arc<T>,
    storage: Arc<StorageUtility>,
    issuer_fetcher: Arc<IssuerConfigFetcher>,
    manager: Arc<SessionInfoManager>,
    events: EventChannel,
) -> AggregateHandler<String, RedirectInfo>
where
    T: HttpClient + Send + Sync + 'static,
{
    AggregateHandler::new(
        "incoming-redirect",
        vec![
            Box::new(ErrorRedirectHandler::new(events)),
            Box::new(AuthCodeRedirectHandler::new(
                client,
                storage,
                issuer_fetcher,
                manager,
            )),
            Box::new(FallbackRedirectHandler),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use core::future::Future;
    use http::{Request, Response};
    use solid_authn_common::storage::MemoryStorage;
    use std::convert::Infallible;

    #[derive(Default, Clone)]
    struct MockHttp;

    impl HttpClient for MockHttp {
        type Error = Infallible;
        fn send_http(
            &self,
            _request: Request<Vec<u8>>,
        ) -> impl Future<Output = core::result::Result<Response<Vec<u8>>, Self::Error>> + Send
        {
            async move { Ok(Response::builder().status(404).body(Vec::new()).unwrap()) }
        }
    }

    fn chain() -> AggregateHandler<String, RedirectInfo> {
        let storage = Arc::new(StorageUtility::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
        ));
        incoming_redirect_chain(
            Arc::new(MockHttp),
            storage.clone(),
            Arc::new(IssuerConfigFetcher::new()),
            Arc::new(SessionInfoManager::new(storage)),
            EventChannel::new(),
        )
    }

    #[tokio::test]
    async fn invalid_url_surfaces_instead_of_falling_through() {
        let err = chain().handle("beep boop".to_owned()).await.unwrap_err();
        match err {
            Error::InvalidUrl { input, .. } => assert_eq!(input, "beep boop"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn plain_url_falls_back_to_unauthenticated() {
        let info = chain()
            .handle("https://app.example/cb".to_owned())
            .await
            .unwrap();
        assert!(!info.session_info.is_logged_in);
        assert!(info.session_info.web_id.is_none());
        assert!(info.credentials.is_none());
    }

    #[tokio::test]
    async fn error_parameter_outranks_code_and_state() {
        // A URL carrying all three must go to the error handler.
        let info = chain()
            .handle("https://app.example/cb?error=denied&code=c&state=s".to_owned())
            .await
            .unwrap();
        assert!(!info.session_info.is_logged_in);
    }
}
