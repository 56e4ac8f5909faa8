//! Performing the navigation once a target URL has been computed.

use std::sync::Arc;

use url::Url;

use crate::error::{Error, Result};

/// Host-supplied navigation hook. Called with the URL the user must visit.
pub type RedirectCallback = dyn Fn(&Url) + Send + Sync;

/// Per-redirect configuration, usually derived from the login options.
#[derive(Clone, Default)]
pub struct RedirectOptions {
    /// When set, invoked with the URL instead of any built-in navigation.
    pub handle_redirect: Option<Arc<RedirectCallback>>,
}

/// Sends the user somewhere else.
///
/// Outside a browser there is no ambient navigation, so a redirect needs
/// either a host callback or, with the `browser-open` feature, the system
/// browser. With neither available, redirecting is a configuration error.
#[derive(Default)]
pub struct Redirector;

impl Redirector {
    pub fn new() -> Self {
        Self
    }

    /// Navigate to `target` using the configured mechanism.
    pub fn redirect(&self, target: &Url, options: &RedirectOptions) -> Result<()> {
        if let Some(callback) = &options.handle_redirect {
            callback(target);
            return Ok(());
        }
        #[cfg(feature = "browser-open")]
        {
            if webbrowser::open(target.as_str()).is_ok() {
                return Ok(());
            }
        }
        Err(Error::Configuration(
            "no redirect mechanism available: supply a `handle_redirect` callback".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn calls_the_provided_callback() {
        let seen: Arc<Mutex<Option<Url>>> = Arc::default();
        let captured = seen.clone();
        let options = RedirectOptions {
            handle_redirect: Some(Arc::new(move |url: &Url| {
                *captured.lock().unwrap() = Some(url.clone());
            })),
        };
        let target = Url::parse("https://idp.example/authorize?state=x").unwrap();
        Redirector::new().redirect(&target, &options).unwrap();
        assert_eq!(seen.lock().unwrap().as_ref(), Some(&target));
    }

    #[cfg(not(feature = "browser-open"))]
    #[test]
    fn errors_without_a_callback() {
        let target = Url::parse("https://idp.example/authorize").unwrap();
        let err = Redirector::new()
            .redirect(&target, &RedirectOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
