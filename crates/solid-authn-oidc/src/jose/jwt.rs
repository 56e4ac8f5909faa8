use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::OidcError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Claims {
    #[serde(flatten)]
    pub registered: RegisteredClaims,
    #[serde(flatten)]
    pub proof: ProofClaims,
}

// https://datatracker.ietf.org/doc/html/rfc7519#section-4.1
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RegisteredClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Aud>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<SmolStr>,
}

/// DPoP proof claims (https://datatracker.ietf.org/doc/html/rfc9449#section-4.2).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProofClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub htm: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub htu: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ath: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<SmolStr>,
}

impl From<RegisteredClaims> for Claims {
    fn from(registered: RegisteredClaims) -> Self {
        Self {
            registered,
            proof: ProofClaims::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Aud {
    Single(SmolStr),
    Multiple(Vec<SmolStr>),
}

/// Claims of a Solid OIDC ID token, as read by this client.
///
/// The token signature is NOT verified here; signature checking is the
/// issuer-facing JOSE library's concern and out of scope for this crate.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    pub iss: SmolStr,
    pub sub: SmolStr,
    pub aud: Aud,
    pub exp: i64,
    pub iat: Option<i64>,
    // https://solidproject.org/TR/oidc#webid
    pub webid: Option<SmolStr>,
    pub azp: Option<SmolStr>,
}

/// Decode the payload segment of a compact JWT without verifying it.
///
/// Fails on anything that is not three dot-separated base64url segments
/// carrying a JSON object payload.
pub fn decode_id_token(token: &str) -> Result<IdTokenClaims, OidcError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(OidcError::MalformedToken(
            "ID token is not a three-segment compact JWT".into(),
        ));
    };
    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| OidcError::MalformedToken(format!("payload is not base64url: {e}")))?;
    Ok(serde_json::from_slice(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_token(payload: &serde_json::Value) -> String {
        let segment = |v: &serde_json::Value| URL_SAFE_NO_PAD.encode(v.to_string());
        format!(
            "{}.{}.{}",
            segment(&serde_json::json!({"alg": "ES256"})),
            segment(payload),
            URL_SAFE_NO_PAD.encode("sig")
        )
    }

    #[test]
    fn decodes_webid_claim() {
        let token = encode_token(&serde_json::json!({
            "iss": "https://idp.example",
            "sub": "user123",
            "aud": "solid",
            "exp": 1_700_000_000,
            "webid": "https://me.example/profile#me",
        }));
        let claims = decode_id_token(&token).unwrap();
        assert_eq!(
            claims.webid.as_deref(),
            Some("https://me.example/profile#me")
        );
        assert_eq!(claims.aud, Aud::Single("solid".into()));
    }

    #[test]
    fn rejects_wrong_segment_count() {
        let err = decode_id_token("onlyonepart").unwrap_err();
        assert!(matches!(err, OidcError::MalformedToken(_)));
        let err = decode_id_token("a.b.c.d").unwrap_err();
        assert!(matches!(err, OidcError::MalformedToken(_)));
    }

    #[test]
    fn rejects_garbage_payload() {
        let err = decode_id_token("aGVhZGVy.bm90LWpzb24.c2ln").unwrap_err();
        assert!(matches!(
            err,
            OidcError::MalformedToken(_) | OidcError::SerdeJson(_)
        ));
    }
}
