//! Placeholder for the legacy OIDC implicit flow.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::login::LoginOptions;

/// The pre-OAuth-2.1 implicit flow. Deliberately unimplemented: both the
/// probe and the handler fail, so an option set that only the implicit
/// flow could serve surfaces a hard error instead of silently degrading.
pub struct LegacyImplicitFlowHandler;

#[async_trait]
impl Handler<LoginOptions, ()> for LegacyImplicitFlowHandler {
    async fn can_handle(&self, _options: &LoginOptions) -> Result<bool> {
        Err(Error::NotImplemented("legacy implicit-flow login"))
    }

    async fn handle(&self, _options: LoginOptions) -> Result<()> {
        Err(Error::NotImplemented("legacy implicit-flow login"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_and_handle_both_fail() {
        let handler = LegacyImplicitFlowHandler;
        assert!(matches!(
            handler
                .can_handle(&LoginOptions::default())
                .await
                .unwrap_err(),
            Error::NotImplemented(_)
        ));
        assert!(matches!(
            handler.handle(LoginOptions::default()).await.unwrap_err(),
            Error::NotImplemented(_)
        ));
    }
}
