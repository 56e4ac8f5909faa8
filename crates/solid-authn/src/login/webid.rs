//! Reserved extension point for WebID-profile-based login.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::login::LoginOptions;

/// Login by dereferencing a WebID profile to find the user's issuer.
///
/// Not implemented yet: the probe always declines, so the chain falls
/// through to OIDC login. Kept in the chain (ahead of OIDC) so that adding
/// the implementation is a change to this file only.
pub struct WebIdLoginHandler;

#[async_trait]
impl Handler<LoginOptions, ()> for WebIdLoginHandler {
    async fn can_handle(&self, _options: &LoginOptions) -> Result<bool> {
        Ok(false)
    }

    async fn handle(&self, _options: LoginOptions) -> Result<()> {
        Err(Error::NotImplemented("WebID-based login"))
    }
}
