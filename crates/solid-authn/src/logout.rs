//! RP-initiated logout support.

use std::sync::Arc;

use serde::Serialize;
use smol_str::SmolStr;
use url::Url;

use solid_authn_oidc::error::OidcError;

use crate::error::Result;
use crate::redirector::RedirectCallback;

/// Options for logging out at the identity provider as well as locally.
#[derive(Clone, Default)]
pub struct IdpLogoutOptions {
    /// Where the provider should send the user after ending its session.
    pub post_logout_redirect_uri: Option<Url>,
    /// Opaque value echoed back on the post-logout redirect.
    pub state: Option<SmolStr>,
    /// Host-supplied navigation callback, as for login.
    pub handle_redirect: Option<Arc<RedirectCallback>>,
}

// https://openid.net/specs/openid-connect-rpinitiated-1_0.html#RPLogout
#[derive(Serialize)]
struct EndSessionParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id_token_hint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_logout_redirect_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
}

/// Build the URL that ends the user's session at the identity provider.
pub fn end_session_url(
    end_session_endpoint: &str,
    id_token_hint: Option<&str>,
    post_logout_redirect_uri: Option<&Url>,
    state: Option<&str>,
) -> Result<Url> {
    let query = serde_html_form::to_string(EndSessionParams {
        id_token_hint,
        post_logout_redirect_uri: post_logout_redirect_uri.map(Url::as_str),
        state,
    })
    .map_err(OidcError::from)?;
    let target = if query.is_empty() {
        end_session_endpoint.to_owned()
    } else {
        format!("{end_session_endpoint}?{query}")
    };
    Ok(Url::parse(&target).map_err(OidcError::from)?)
}
