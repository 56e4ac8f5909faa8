//! URL helpers shared with host applications.

use url::Url;

pub use solid_authn_oidc::issuer::{UrlAppendError, append_to_url_pathname};

/// Strip the OpenID protocol parameters from a redirect URL, leaving the
/// application's own query intact. Useful for restoring a clean address
/// bar (or route) after `handle_incoming_redirect`.
pub fn remove_openid_params(url: &Url) -> Url {
    const OPENID_PARAMS: [&str; 5] = ["code", "state", "iss", "error", "error_description"];
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !OPENID_PARAMS.contains(&name.as_ref()))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    let mut cleaned = url.clone();
    cleaned.set_query(None);
    if !retained.is_empty() {
        cleaned.query_pairs_mut().extend_pairs(retained);
    }
    cleaned
}
