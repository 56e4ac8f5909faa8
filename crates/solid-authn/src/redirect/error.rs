//! Handling redirects that carry a provider error.

use async_trait::async_trait;
use smol_str::SmolStr;

use crate::error::Result;
use crate::events::{EventChannel, SessionEvent};
use crate::handler::Handler;
use crate::redirect::{RedirectInfo, parse_redirect_url};

/// Claims redirect URLs with an `error` query parameter: the provider
/// declined the authorization. Reports the error on the session's event
/// channel and leaves the session unauthenticated.
pub struct ErrorRedirectHandler {
    events: EventChannel,
}

impl ErrorRedirectHandler {
    pub fn new(events: EventChannel) -> Self {
        Self { events }
    }
}

#[async_trait]
impl Handler<String, RedirectInfo> for ErrorRedirectHandler {
    async fn can_handle(&self, redirect_url: &String) -> Result<bool> {
        let url = parse_redirect_url(redirect_url)?;
        Ok(url.query_pairs().any(|(name, _)| name == "error"))
    }

    async fn handle(&self, redirect_url: String) -> Result<RedirectInfo> {
        let url = parse_redirect_url(&redirect_url)?;
        let mut code: SmolStr = "".into();
        let mut description: Option<SmolStr> = None;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "error" => code = value.as_ref().into(),
                "error_description" => description = Some(value.as_ref().into()),
                _ => {}
            }
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(error = %code, "identity provider returned an error");

        self.events.emit(SessionEvent::Error { code, description });
        Ok(RedirectInfo::unauthenticated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn claims_only_error_urls() {
        let handler = ErrorRedirectHandler::new(EventChannel::new());
        assert!(
            handler
                .can_handle(&"https://app.example/cb?error=denied".to_owned())
                .await
                .unwrap()
        );
        assert!(
            !handler
                .can_handle(&"https://app.example/cb?code=c&state=s".to_owned())
                .await
                .unwrap()
        );
        assert!(matches!(
            handler.can_handle(&"beep boop".to_owned()).await.unwrap_err(),
            Error::InvalidUrl { .. }
        ));
    }

    #[tokio::test]
    async fn emits_the_error_and_stays_logged_out() {
        let events = EventChannel::new();
        let mut rx = events.subscribe();
        let handler = ErrorRedirectHandler::new(events);
        let info = handler
            .handle("https://app.example/cb?error=foo".to_owned())
            .await
            .unwrap();
        assert!(!info.session_info.is_logged_in);
        assert_eq!(info.session_info.web_id, None);
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Error {
                code: "foo".into(),
                description: None,
            }
        );
    }

    #[tokio::test]
    async fn carries_the_description_when_present() {
        let events = EventChannel::new();
        let mut rx = events.subscribe();
        let handler = ErrorRedirectHandler::new(events);
        handler
            .handle(
                "https://app.example/cb?error=access_denied&error_description=user%20said%20no"
                    .to_owned(),
            )
            .await
            .unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Error {
                code: "access_denied".into(),
                description: Some("user said no".into()),
            }
        );
    }
}
