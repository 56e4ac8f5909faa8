//! Token endpoint grants: authorization-code exchange, refresh, revocation.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{TimeDelta, Utc};
use http::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use smol_str::SmolStr;
use url::Url;

use solid_authn_common::{error::TransportError, http_client::HttpClient};

use crate::dpop::{DpopKeyMaterial, DpopTarget, wrap_request_with_dpop};
use crate::error::{OidcError, Result};
use crate::jose::jwt::{IdTokenClaims, decode_id_token};
use crate::types::{
    ClientMetadata, IssuerConfig, RefreshRequestParameters, RevocationRequestParameters,
    TokenGrantType, TokenRequestParameters, TokenResponse, TokenSet,
};

enum TokenEndpointRequest {
    Token(TokenRequestParameters),
    Refresh(RefreshRequestParameters),
    Revocation(RevocationRequestParameters),
}

impl TokenEndpointRequest {
    fn name(&self) -> SmolStr {
        match self {
            Self::Token(_) => "token".into(),
            Self::Refresh(_) => "refresh".into(),
            Self::Revocation(_) => "revocation".into(),
        }
    }

    fn endpoint<'c>(&self, config: &'c IssuerConfig) -> Option<&'c SmolStr> {
        match self {
            Self::Token(_) | Self::Refresh(_) => Some(&config.token_endpoint),
            Self::Revocation(_) => config.revocation_endpoint.as_ref(),
        }
    }

    fn accepts(&self, status: StatusCode) -> bool {
        match self {
            Self::Token(_) | Self::Refresh(_) => status == StatusCode::OK,
            // https://datatracker.ietf.org/doc/html/rfc7009#section-2.2 says
            // 200; some providers return 204.
            Self::Revocation(_) => status == StatusCode::OK || status == StatusCode::NO_CONTENT,
        }
    }
}

#[derive(Debug, Serialize)]
struct RequestPayload<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<SmolStr>,
    #[serde(flatten)]
    parameters: T,
}

/// Derive the session WebID from ID-token claims: the Solid `webid` claim
/// when present, otherwise a URL-shaped `sub`.
pub fn derive_web_id(claims: &IdTokenClaims) -> Result<Url> {
    if let Some(webid) = &claims.webid {
        return Url::parse(webid).map_err(|e| {
            OidcError::TokenVerification(format!("`webid` claim is not a valid URL: {e}"))
        });
    }
    match Url::parse(&claims.sub) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        _ => Err(OidcError::TokenVerification(
            "no `webid` claim and `sub` is not an HTTP(S) URL".into(),
        )),
    }
}

/// Exchange an authorization code for tokens and derive the WebID.
///
/// `material` carries the DPoP key bound to the pending authorization
/// request; pass `None` for plain bearer sessions.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
pub async fn exchange_code<T>(
    client: &T,
    material: Option<&mut DpopKeyMaterial>,
    config: &IssuerConfig,
    client_metadata: &ClientMetadata,
    code: &str,
    verifier: &str,
    redirect_uri: &Url,
) -> Result<TokenSet>
where
    T: HttpClient,
{
    let response = token_endpoint_request(
        client,
        material,
        config,
        client_metadata,
        TokenEndpointRequest::Token(TokenRequestParameters {
            grant_type: TokenGrantType::AuthorizationCode,
            code: code.into(),
            redirect_uri: redirect_uri.as_str().into(),
            code_verifier: verifier.into(),
        }),
    )
    .await?;
    let response: TokenResponse = serde_json::from_slice(&response)?;

    let Some(id_token) = response.id_token.clone() else {
        return Err(OidcError::TokenVerification(
            "token response carried no ID token".into(),
        ));
    };
    let claims = decode_id_token(&id_token)?;
    let web_id = derive_web_id(&claims)?;

    Ok(TokenSet {
        issuer: config.issuer.clone(),
        web_id,
        access_token: response.access_token,
        token_type: response.token_type,
        refresh_token: response.refresh_token,
        id_token: Some(id_token),
        expires_at: expiry(response.expires_in),
    })
}

/// Refresh an existing token set, rotating the refresh token when the
/// provider does.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
pub async fn refresh_token<T>(
    client: &T,
    material: Option<&mut DpopKeyMaterial>,
    config: &IssuerConfig,
    client_metadata: &ClientMetadata,
    token_set: &TokenSet,
) -> Result<TokenSet>
where
    T: HttpClient,
{
    let Some(refresh_token) = token_set.refresh_token.clone() else {
        return Err(OidcError::NoRefreshToken);
    };

    let response = token_endpoint_request(
        client,
        material,
        config,
        client_metadata,
        TokenEndpointRequest::Refresh(RefreshRequestParameters {
            grant_type: TokenGrantType::RefreshToken,
            refresh_token: refresh_token.clone(),
            scope: None,
        }),
    )
    .await?;
    let response: TokenResponse = serde_json::from_slice(&response)?;

    // A refresh response may carry a fresh ID token; re-derive the WebID
    // from it when it does, otherwise the identity is unchanged.
    let (web_id, id_token) = match &response.id_token {
        Some(id_token) => (
            derive_web_id(&decode_id_token(id_token)?)?,
            Some(id_token.clone()),
        ),
        None => (token_set.web_id.clone(), token_set.id_token.clone()),
    };

    Ok(TokenSet {
        issuer: token_set.issuer.clone(),
        web_id,
        access_token: response.access_token,
        token_type: response.token_type,
        refresh_token: response.refresh_token.or(Some(refresh_token)),
        id_token,
        expires_at: expiry(response.expires_in),
    })
}

/// Revoke a token at the provider's revocation endpoint.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
pub async fn revoke_token<T>(
    client: &T,
    material: Option<&mut DpopKeyMaterial>,
    config: &IssuerConfig,
    client_metadata: &ClientMetadata,
    token: &str,
) -> Result<()>
where
    T: HttpClient,
{
    token_endpoint_request(
        client,
        material,
        config,
        client_metadata,
        TokenEndpointRequest::Revocation(RevocationRequestParameters {
            token: token.into(),
        }),
    )
    .await?;
    Ok(())
}

fn expiry(expires_in: Option<i64>) -> Option<chrono::DateTime<Utc>> {
    expires_in.and_then(|secs| Utc::now().checked_add_signed(TimeDelta::seconds(secs)))
}

async fn token_endpoint_request<T>(
    client: &T,
    material: Option<&mut DpopKeyMaterial>,
    config: &IssuerConfig,
    client_metadata: &ClientMetadata,
    request: TokenEndpointRequest,
) -> Result<Vec<u8>>
where
    T: HttpClient,
{
    let Some(endpoint) = request.endpoint(config) else {
        return Err(OidcError::NoEndpoint(request.name()));
    };

    // Confidential clients authenticate with `client_secret_basic`; public
    // clients carry their id in the body.
    let client_id =
        (!client_metadata.is_confidential()).then(|| client_metadata.client_id.clone());
    let body = match &request {
        TokenEndpointRequest::Token(params) => build_body(client_id, params),
        TokenEndpointRequest::Refresh(params) => build_body(client_id, params),
        TokenEndpointRequest::Revocation(params) => build_body(client_id, params),
    }?;

    let mut builder = Request::builder()
        .uri(endpoint.as_str())
        .method(Method::POST)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .header("Accept", "application/json");
    if let Some(secret) = &client_metadata.client_secret {
        let credentials = STANDARD.encode(format!("{}:{secret}", client_metadata.client_id));
        builder = builder.header("Authorization", format!("Basic {credentials}"));
    }
    let req = builder.body(body.into_bytes())?;

    let res = match material {
        Some(material) => {
            wrap_request_with_dpop(client, material, DpopTarget::AuthServer, req).await?
        }
        None => client
            .send_http(req)
            .await
            .map_err(|e| OidcError::Transport(TransportError::Other(Box::new(e))))?,
    };

    if request.accepts(res.status()) {
        Ok(res.into_body())
    } else {
        Err(status_error(res))
    }
}

#[inline]
fn build_body<S: Serialize>(client_id: Option<SmolStr>, parameters: &S) -> Result<String> {
    Ok(serde_html_form::to_string(RequestPayload {
        client_id,
        parameters,
    })?)
}

fn status_error(res: Response<Vec<u8>>) -> OidcError {
    let status = res.status();
    if status.is_client_error() {
        if let Ok(body) = serde_json::from_slice::<Value>(res.body()) {
            return OidcError::HttpStatusWithBody { status, body };
        }
    }
    OidcError::HttpStatus(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use core::future::Future;
    use std::convert::Infallible;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Default, Clone)]
    struct MockHttp {
        responses: Arc<Mutex<Vec<Response<Vec<u8>>>>>,
        seen: Arc<Mutex<Vec<Request<Vec<u8>>>>>,
    }

    impl HttpClient for MockHttp {
        type Error = Infallible;
        fn send_http(
            &self,
            request: Request<Vec<u8>>,
        ) -> impl Future<Output = core::result::Result<Response<Vec<u8>>, Self::Error>> + Send
        {
            let responses = self.responses.clone();
            let seen = self.seen.clone();
            async move {
                seen.lock().await.push(request);
                Ok(responses.lock().await.remove(0))
            }
        }
    }

    fn issuer_config() -> IssuerConfig {
        serde_json::from_value(serde_json::json!({
            "issuer": "https://idp.example",
            "authorization_endpoint": "https://idp.example/authorize",
            "token_endpoint": "https://idp.example/token",
            "revocation_endpoint": "https://idp.example/revoke",
        }))
        .unwrap()
    }

    fn public_client() -> ClientMetadata {
        ClientMetadata::public(
            Url::parse("https://app.example/id").unwrap(),
            vec![Url::parse("https://app.example/cb").unwrap()],
        )
    }

    fn id_token(payload: serde_json::Value) -> String {
        let segment = |v: String| URL_SAFE_NO_PAD.encode(v);
        format!(
            "{}.{}.{}",
            segment(serde_json::json!({"alg": "ES256"}).to_string()),
            segment(payload.to_string()),
            segment("sig".into())
        )
    }

    fn token_response(id_token: Option<String>) -> Vec<u8> {
        let mut body = serde_json::json!({
            "access_token": "access-1",
            "token_type": "DPoP",
            "expires_in": 600,
            "refresh_token": "refresh-1",
        });
        if let Some(token) = id_token {
            body["id_token"] = serde_json::Value::String(token);
        }
        body.to_string().into_bytes()
    }

    #[tokio::test]
    async fn exchange_derives_webid_from_claim() {
        let client = MockHttp::default();
        client.responses.lock().await.push(
            Response::builder()
                .status(200)
                .body(token_response(Some(id_token(serde_json::json!({
                    "iss": "https://idp.example",
                    "sub": "user123",
                    "aud": "solid",
                    "exp": 4_102_444_800i64,
                    "webid": "https://me.example/profile#me",
                })))))
                .unwrap(),
        );
        let mut material = DpopKeyMaterial::new(generate_key(&["ES256".into()]).unwrap());
        let token_set = exchange_code(
            &client,
            Some(&mut material),
            &issuer_config(),
            &public_client(),
            "code-abc",
            "verifier-xyz",
            &Url::parse("https://app.example/cb").unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(token_set.web_id.as_str(), "https://me.example/profile#me");
        assert_eq!(token_set.access_token, "access-1");
        assert!(token_set.expires_at.is_some());

        let seen = client.seen.lock().await;
        let body = String::from_utf8(seen[0].body().clone()).unwrap();
        assert!(body.contains("grant_type=authorization_code"));
        assert!(body.contains("code=code-abc"));
        assert!(body.contains("code_verifier=verifier-xyz"));
        assert!(body.contains("client_id="));
        assert!(seen[0].headers().contains_key("DPoP"));
    }

    #[tokio::test]
    async fn exchange_accepts_url_shaped_sub() {
        let client = MockHttp::default();
        client.responses.lock().await.push(
            Response::builder()
                .status(200)
                .body(token_response(Some(id_token(serde_json::json!({
                    "iss": "https://idp.example",
                    "sub": "https://me.example/profile#me",
                    "aud": "solid",
                    "exp": 4_102_444_800i64,
                })))))
                .unwrap(),
        );
        let token_set = exchange_code(
            &client,
            None,
            &issuer_config(),
            &public_client(),
            "code",
            "verifier",
            &Url::parse("https://app.example/cb").unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(token_set.web_id.as_str(), "https://me.example/profile#me");
    }

    #[tokio::test]
    async fn exchange_rejects_opaque_sub_without_webid() {
        let client = MockHttp::default();
        client.responses.lock().await.push(
            Response::builder()
                .status(200)
                .body(token_response(Some(id_token(serde_json::json!({
                    "iss": "https://idp.example",
                    "sub": "user123",
                    "aud": "solid",
                    "exp": 4_102_444_800i64,
                })))))
                .unwrap(),
        );
        let err = exchange_code(
            &client,
            None,
            &issuer_config(),
            &public_client(),
            "code",
            "verifier",
            &Url::parse("https://app.example/cb").unwrap(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OidcError::TokenVerification(_)));
    }

    #[tokio::test]
    async fn exchange_surfaces_error_body() {
        let client = MockHttp::default();
        client.responses.lock().await.push(
            Response::builder()
                .status(400)
                .body(br#"{"error":"invalid_grant"}"#.to_vec())
                .unwrap(),
        );
        let err = exchange_code(
            &client,
            None,
            &issuer_config(),
            &public_client(),
            "code",
            "verifier",
            &Url::parse("https://app.example/cb").unwrap(),
        )
        .await
        .unwrap_err();
        match err {
            OidcError::HttpStatusWithBody { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body["error"], "invalid_grant");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    fn existing_token_set() -> TokenSet {
        TokenSet {
            issuer: "https://idp.example".into(),
            web_id: Url::parse("https://me.example/profile#me").unwrap(),
            access_token: "old-access".into(),
            token_type: crate::types::TokenType::DPoP,
            refresh_token: Some("refresh-0".into()),
            id_token: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn refresh_requires_refresh_token() {
        let client = MockHttp::default();
        let mut token_set = existing_token_set();
        token_set.refresh_token = None;
        let err = refresh_token(
            &client,
            None,
            &issuer_config(),
            &public_client(),
            &token_set,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OidcError::NoRefreshToken));
    }

    #[tokio::test]
    async fn refresh_rotates_tokens_and_keeps_identity() {
        let client = MockHttp::default();
        client.responses.lock().await.push(
            Response::builder()
                .status(200)
                .body(token_response(None))
                .unwrap(),
        );
        let refreshed = refresh_token(
            &client,
            None,
            &issuer_config(),
            &public_client(),
            &existing_token_set(),
        )
        .await
        .unwrap();
        assert_eq!(refreshed.access_token, "access-1");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(refreshed.web_id.as_str(), "https://me.example/profile#me");

        let seen = client.seen.lock().await;
        let body = String::from_utf8(seen[0].body().clone()).unwrap();
        assert!(body.contains("grant_type=refresh_token"));
        assert!(body.contains("refresh_token=refresh-0"));
    }

    #[tokio::test]
    async fn confidential_client_uses_basic_auth() {
        let client = MockHttp::default();
        client.responses.lock().await.push(
            Response::builder()
                .status(200)
                .body(token_response(None))
                .unwrap(),
        );
        let metadata = ClientMetadata::registered("my-client", Some("hunter2".into()), vec![]);
        refresh_token(
            &client,
            None,
            &issuer_config(),
            &metadata,
            &existing_token_set(),
        )
        .await
        .unwrap();
        let seen = client.seen.lock().await;
        let auth = seen[0].headers()["Authorization"].to_str().unwrap();
        assert_eq!(
            auth,
            format!("Basic {}", STANDARD.encode("my-client:hunter2"))
        );
        let body = String::from_utf8(seen[0].body().clone()).unwrap();
        assert!(!body.contains("client_id="));
    }

    #[tokio::test]
    async fn revocation_accepts_no_content() {
        let client = MockHttp::default();
        client
            .responses
            .lock()
            .await
            .push(Response::builder().status(204).body(Vec::new()).unwrap());
        revoke_token(
            &client,
            None,
            &issuer_config(),
            &public_client(),
            "access-1",
        )
        .await
        .unwrap();
        let seen = client.seen.lock().await;
        let body = String::from_utf8(seen[0].body().clone()).unwrap();
        assert!(body.contains("token=access-1"));
    }
}
