//! OpenID Provider discovery and the per-issuer configuration cache.

use dashmap::DashMap;
use http::{Request, StatusCode};
use smol_str::SmolStr;
use url::Url;

use solid_authn_common::{error::TransportError, http_client::HttpClient};

use crate::error::{OidcError, Result};
use crate::types::IssuerConfig;

pub const WELL_KNOWN_OPENID_CONFIG: &str = ".well-known/openid-configuration";

/// Failure to extend a URL's path, carrying both inputs for diagnostics.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("failed to append [{segment}] to the URL path of [{url}]")]
#[diagnostic(code(solid_authn_oidc::url_append))]
pub struct UrlAppendError {
    pub url: String,
    pub segment: String,
    #[source]
    pub source: url::ParseError,
}

/// Append `segment` to the path of `url` with exactly one separating slash,
/// preserving any existing path (unlike `Url::join`, which restarts at the
/// root for absolute segments).
pub fn append_to_url_pathname(url: &str, segment: &str) -> core::result::Result<Url, UrlAppendError> {
    let mut parsed = Url::parse(url).map_err(|source| UrlAppendError {
        url: url.to_owned(),
        segment: segment.to_owned(),
        source,
    })?;
    let path = parsed.path();
    let joined = format!(
        "{path}{}{}",
        if path.ends_with('/') { "" } else { "/" },
        segment.strip_prefix('/').unwrap_or(segment)
    );
    parsed.set_path(&joined);
    Ok(parsed)
}

impl From<UrlAppendError> for OidcError {
    fn from(e: UrlAppendError) -> Self {
        OidcError::Discovery(e.to_string())
    }
}

/// Compare two issuer strings strictly but without spuriously failing on trivial differences.
///
/// Rules:
/// - Schemes must match exactly.
/// - Hostnames and effective ports must match (treat missing port the same as default port).
/// - Path must match, except that an empty path and `/` are equivalent.
/// - Query/fragment are not considered; if present on either side, the comparison fails.
pub fn issuer_equivalent(a: &str, b: &str) -> bool {
    fn normalize(url: &Url) -> Option<(String, String, u16, String)> {
        if url.query().is_some() || url.fragment().is_some() {
            return None;
        }
        let scheme = url.scheme().to_string();
        let host = url.host_str()?.to_string();
        let port = url.port_or_known_default()?;
        let path = match url.path() {
            "" | "/" => "/".to_string(),
            other => other.to_string(),
        };
        Some((scheme, host, port, path))
    }

    match (Url::parse(a), Url::parse(b)) {
        (Ok(ua), Ok(ub)) => match (normalize(&ua), normalize(&ub)) {
            (Some((sa, ha, pa, path_a)), Some((sb, hb, pb, path_b))) => {
                sa == sb && ha == hb && pa == pb && path_a == path_b
            }
            _ => false,
        },
        _ => a == b,
    }
}

/// Fetch the provider configuration for `issuer`, validating that the
/// document names an equivalent issuer.
pub async fn fetch_issuer_config<T>(client: &T, issuer: &Url) -> Result<IssuerConfig>
where
    T: HttpClient,
{
    let url = append_to_url_pathname(issuer.as_str(), WELL_KNOWN_OPENID_CONFIG)?;

    let req = Request::builder()
        .uri(url.to_string())
        .header("Accept", "application/json")
        .body(Vec::new())?;
    let res = client
        .send_http(req)
        .await
        .map_err(|e| OidcError::Transport(TransportError::Other(Box::new(e))))?;
    if res.status() != StatusCode::OK {
        return Err(OidcError::HttpStatus(res.status()));
    }
    let mut config = serde_json::from_slice::<IssuerConfig>(res.body())?;
    // https://datatracker.ietf.org/doc/html/rfc8414#section-3.3
    // Accept semantically equivalent issuer (normalize to the requested URL form)
    if issuer_equivalent(&config.issuer, issuer.as_str()) {
        config.issuer = issuer.as_str().into();
        Ok(config)
    } else {
        Err(OidcError::IssuerMismatch {
            expected: issuer.as_str().into(),
            got: config.issuer,
        })
    }
}

/// Caching wrapper around [`fetch_issuer_config`].
///
/// Provider configurations change rarely; one fetch per issuer per process
/// is enough.
#[derive(Default)]
pub struct IssuerConfigFetcher {
    cache: DashMap<SmolStr, IssuerConfig>,
}

impl IssuerConfigFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the configuration for `issuer`, from cache when possible.
    pub async fn fetch_config<T>(&self, client: &T, issuer: &Url) -> Result<IssuerConfig>
    where
        T: HttpClient,
    {
        let key: SmolStr = issuer.as_str().into();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(issuer = %issuer, "fetching issuer configuration");
        let config = fetch_issuer_config(client, issuer).await?;
        self.cache.insert(key, config.clone());
        Ok(config)
    }
}
