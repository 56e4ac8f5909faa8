//! DPoP proof construction and the RFC 9449 server-nonce negotiation.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use http::{Request, Response, header::InvalidHeaderValue};
use jose_jwa::{Algorithm, Signing};
use jose_jwk::{Jwk, Key, crypto};
use p256::ecdsa::SigningKey;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use smol_str::SmolStr;

use solid_authn_common::http_client::HttpClient;

use crate::jose::{
    create_signed_jwt,
    jws::Header,
    jwt::{Claims, ProofClaims, RegisteredClaims},
};

pub const JWT_HEADER_TYP_DPOP: &str = "dpop+jwt";

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(thiserror::Error, Debug, miette::Diagnostic)]
pub enum DpopError {
    #[error(transparent)]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
    #[error("crypto error: {0:?}")]
    JwkCrypto(crypto::Error),
    #[error("key does not match any alg supported by the server")]
    UnsupportedKey,
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    HttpBuild(#[from] http::Error),
    #[error("transport: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

type Result<T> = core::result::Result<T, DpopError>;

/// The DPoP key plus the latest nonce each server class handed back.
///
/// Nonces are tracked separately for the authorization server and the
/// resource server: each rotates its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpopKeyMaterial {
    pub key: Key,
    pub authserver_nonce: Option<SmolStr>,
    pub resource_nonce: Option<SmolStr>,
}

impl DpopKeyMaterial {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            authserver_nonce: None,
            resource_nonce: None,
        }
    }

    fn nonce(&self, target: DpopTarget) -> Option<SmolStr> {
        match target {
            DpopTarget::AuthServer => self.authserver_nonce.clone(),
            DpopTarget::Resource => self.resource_nonce.clone(),
        }
    }

    fn set_nonce(&mut self, target: DpopTarget, nonce: SmolStr) {
        match target {
            DpopTarget::AuthServer => self.authserver_nonce = Some(nonce),
            DpopTarget::Resource => self.resource_nonce = Some(nonce),
        }
    }
}

/// Which server class a proof is addressed to; controls nonce bookkeeping
/// and how `use_dpop_nonce` is signalled back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DpopTarget {
    AuthServer,
    Resource,
}

/// Send `request` with a DPoP proof attached, retrying once if the server
/// demands a fresh nonce.
pub async fn wrap_request_with_dpop<T>(
    client: &T,
    material: &mut DpopKeyMaterial,
    target: DpopTarget,
    request: Request<Vec<u8>>,
) -> Result<Response<Vec<u8>>>
where
    T: HttpClient,
{
    let (parts, body) = request.into_parts();
    let method = parts.method.as_str().to_owned();
    let uri = parts.uri.to_string();
    // https://datatracker.ietf.org/doc/html/rfc9449#section-4.2
    let ath = parts
        .headers
        .get("Authorization")
        .filter(|v| v.to_str().is_ok_and(|s| s.starts_with("DPoP ")))
        .map(|auth| {
            SmolStr::from(URL_SAFE_NO_PAD.encode(sha2::Sha256::digest(&auth.as_bytes()[5..])))
        });

    let init_nonce = material.nonce(target);
    let init_proof = build_dpop_proof(
        &material.key,
        &method,
        &uri,
        init_nonce.as_deref(),
        ath.as_deref(),
    )?;
    let mut request = rebuild_request(&parts, &body)?;
    request.headers_mut().insert("DPoP", init_proof.parse()?);
    let response = client
        .send_http(request)
        .await
        .map_err(|e| DpopError::Transport(e.into()))?;

    let next_nonce = response
        .headers()
        .get("DPoP-Nonce")
        .and_then(|v| v.to_str().ok())
        .map(SmolStr::from);
    match &next_nonce {
        Some(nonce) if next_nonce != init_nonce => {
            // Store the fresh nonce for future requests
            material.set_nonce(target, nonce.clone());
        }
        _ => {
            // No nonce was returned or it is the same as the one we sent. No
            // need to update the nonce store, or retry the request.
            return Ok(response);
        }
    }

    if !is_use_dpop_nonce_error(target, &response) {
        return Ok(response);
    }
    let next_proof = build_dpop_proof(
        &material.key,
        &method,
        &uri,
        next_nonce.as_deref(),
        ath.as_deref(),
    )?;
    let mut request = rebuild_request(&parts, &body)?;
    request.headers_mut().insert("DPoP", next_proof.parse()?);
    let response = client
        .send_http(request)
        .await
        .map_err(|e| DpopError::Transport(e.into()))?;
    Ok(response)
}

// `http::Request` is not `Clone`; rebuild the retry attempt from parts.
fn rebuild_request(
    parts: &http::request::Parts,
    body: &[u8],
) -> core::result::Result<Request<Vec<u8>>, http::Error> {
    let mut builder = Request::builder()
        .method(parts.method.clone())
        .uri(parts.uri.clone());
    for (name, value) in parts.headers.iter() {
        builder = builder.header(name, value);
    }
    builder.body(body.to_vec())
}

#[inline]
fn is_use_dpop_nonce_error(target: DpopTarget, response: &Response<Vec<u8>>) -> bool {
    match target {
        // https://datatracker.ietf.org/doc/html/rfc9449#name-authorization-server-provid
        DpopTarget::AuthServer => {
            if response.status() == 400 {
                if let Ok(res) = serde_json::from_slice::<ErrorResponse>(response.body()) {
                    return res.error == "use_dpop_nonce";
                };
            }
            false
        }
        // https://datatracker.ietf.org/doc/html/rfc6750#section-3
        // https://datatracker.ietf.org/doc/html/rfc9449#name-resource-server-provided-no
        DpopTarget::Resource => {
            if response.status() == 401 {
                if let Some(www_auth) = response
                    .headers()
                    .get("WWW-Authenticate")
                    .and_then(|v| v.to_str().ok())
                {
                    return www_auth.starts_with("DPoP")
                        && www_auth.contains(r#"error="use_dpop_nonce""#);
                }
            }
            false
        }
    }
}

#[inline]
fn generate_jti() -> SmolStr {
    let mut rng = rand::rngs::SmallRng::from_entropy();
    let mut bytes = [0u8; 12];
    rng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes).into()
}

/// Build a compact JWS (ES256) for DPoP with embedded public JWK.
pub fn build_dpop_proof(
    key: &Key,
    method: &str,
    url: &str,
    nonce: Option<&str>,
    ath: Option<&str>,
) -> Result<String> {
    let secret = match crypto::Key::try_from(key).map_err(DpopError::JwkCrypto)? {
        crypto::Key::P256(crypto::Kind::Secret(sk)) => sk,
        _ => return Err(DpopError::UnsupportedKey),
    };
    let mut header = Header::from(Algorithm::Signing(Signing::Es256));
    header.typ = Some(JWT_HEADER_TYP_DPOP.into());
    header.jwk = Some(Jwk {
        key: Key::from(&crypto::Key::from(secret.public_key())),
        prm: Default::default(),
    });

    let claims = Claims {
        registered: RegisteredClaims {
            jti: Some(generate_jti()),
            iat: Some(Utc::now().timestamp()),
            ..Default::default()
        },
        proof: ProofClaims {
            htm: Some(method.into()),
            htu: Some(url.into()),
            ath: ath.map(SmolStr::from),
            nonce: nonce.map(SmolStr::from),
        },
    };
    Ok(create_signed_jwt(
        &SigningKey::from(secret.clone()),
        &header,
        &claims,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;
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

    fn material() -> DpopKeyMaterial {
        DpopKeyMaterial::new(generate_key(&["ES256".into()]).unwrap())
    }

    fn request() -> Request<Vec<u8>> {
        Request::builder()
            .method("POST")
            .uri("https://idp.example/token")
            .body(Vec::new())
            .unwrap()
    }

    #[test]
    fn proof_is_a_three_segment_jws() {
        let proof = build_dpop_proof(
            &material().key,
            "GET",
            "https://pod.example/resource",
            None,
            None,
        )
        .unwrap();
        assert_eq!(proof.split('.').count(), 3);
    }

    #[tokio::test]
    async fn retries_once_on_use_dpop_nonce() {
        let client = MockHttp::default();
        client.responses.lock().await.extend([
            Response::builder()
                .status(400)
                .header("DPoP-Nonce", "server-nonce")
                .body(br#"{"error":"use_dpop_nonce"}"#.to_vec())
                .unwrap(),
            Response::builder().status(200).body(Vec::new()).unwrap(),
        ]);
        let mut material = material();
        let response =
            wrap_request_with_dpop(&client, &mut material, DpopTarget::AuthServer, request())
                .await
                .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(material.authserver_nonce.as_deref(), Some("server-nonce"));
        let seen = client.seen.lock().await;
        assert_eq!(seen.len(), 2);
        assert!(seen[1].headers().contains_key("DPoP"));
    }

    #[tokio::test]
    async fn stores_nonce_without_retry_on_success() {
        let client = MockHttp::default();
        client.responses.lock().await.push(
            Response::builder()
                .status(200)
                .header("DPoP-Nonce", "fresh")
                .body(Vec::new())
                .unwrap(),
        );
        let mut material = material();
        wrap_request_with_dpop(&client, &mut material, DpopTarget::Resource, request())
            .await
            .unwrap();
        assert_eq!(material.resource_nonce.as_deref(), Some("fresh"));
        assert_eq!(client.seen.lock().await.len(), 1);
    }
}
