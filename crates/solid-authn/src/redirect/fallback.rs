//! Catch-all for redirects carrying nothing this library recognizes.

use async_trait::async_trait;

use crate::error::Result;
use crate::handler::Handler;
use crate::redirect::{RedirectInfo, parse_redirect_url};

/// Claims any well-formed URL, so that hosts can route every page load
/// through `handle_incoming_redirect` without checking for query
/// parameters themselves. Returns an unauthenticated session and has no
/// side effects.
pub struct FallbackRedirectHandler;

#[async_trait]
impl Handler<String, RedirectInfo> for FallbackRedirectHandler {
    async fn can_handle(&self, redirect_url: &String) -> Result<bool> {
        parse_redirect_url(redirect_url)?;
        Ok(true)
    }

    async fn handle(&self, _redirect_url: String) -> Result<RedirectInfo> {
        Ok(RedirectInfo::unauthenticated())
    }
}
