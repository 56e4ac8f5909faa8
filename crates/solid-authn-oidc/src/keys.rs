//! Key, nonce, and PKCE material generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use elliptic_curve::SecretKey;
use jose_jwk::{Key, crypto};
use rand::{CryptoRng, RngCore, rngs::ThreadRng};
use sha2::{Digest, Sha256};
use smol_str::SmolStr;
use std::cmp::Ordering;

use crate::{FALLBACK_ALG, types::IssuerConfig};

/// Generate a fresh signing key for the first algorithm we can satisfy.
pub fn generate_key(allowed_algos: &[SmolStr]) -> Option<Key> {
    for alg in allowed_algos {
        #[allow(clippy::single_match)]
        match alg.as_str() {
            "ES256" => {
                return Some(Key::from(&crypto::Key::from(
                    SecretKey::<p256::NistP256>::random(&mut ThreadRng::default()),
                )));
            }
            _ => {
                // TODO: Implement other algorithms?
            }
        }
    }
    None
}

/// Random base64url string usable as `state` or a session identifier.
pub fn generate_nonce() -> SmolStr {
    URL_SAFE_NO_PAD
        .encode(get_random_values::<_, 16>(&mut ThreadRng::default()))
        .into()
}

fn generate_verifier() -> SmolStr {
    URL_SAFE_NO_PAD
        .encode(get_random_values::<_, 43>(&mut ThreadRng::default()))
        .into()
}

pub fn get_random_values<R, const LEN: usize>(rng: &mut R) -> [u8; LEN]
where
    R: RngCore + CryptoRng,
{
    let mut bytes = [0u8; LEN];
    rng.fill_bytes(&mut bytes);
    bytes
}

// 256K > ES (256 > 384 > 512) > PS (256 > 384 > 512) > RS (256 > 384 > 512) > other (in original order)
pub fn compare_algos(a: &str, b: &str) -> Ordering {
    if a == "ES256K" {
        return Ordering::Less;
    }
    if b == "ES256K" {
        return Ordering::Greater;
    }
    for prefix in ["ES", "PS", "RS"] {
        if let Some(stripped_a) = a.strip_prefix(prefix) {
            if let Some(stripped_b) = b.strip_prefix(prefix) {
                if let (Ok(len_a), Ok(len_b)) =
                    (stripped_a.parse::<u32>(), stripped_b.parse::<u32>())
                {
                    return len_a.cmp(&len_b);
                }
            } else {
                return Ordering::Less;
            }
        } else if b.starts_with(prefix) {
            return Ordering::Greater;
        }
    }
    Ordering::Equal
}

/// Generate a PKCE pair, returned as `(challenge, verifier)`.
pub fn generate_pkce() -> (SmolStr, SmolStr) {
    // https://datatracker.ietf.org/doc/html/rfc7636#section-4.1
    let verifier = generate_verifier();
    (
        URL_SAFE_NO_PAD
            .encode(Sha256::digest(verifier.as_bytes()))
            .into(),
        verifier,
    )
}

/// Pick a DPoP key honoring the issuer's advertised algorithm preferences.
pub fn generate_dpop_key(config: &IssuerConfig) -> Option<Key> {
    let mut algs = config
        .dpop_signing_alg_values_supported
        .clone()
        .unwrap_or(vec![FALLBACK_ALG.into()]);
    algs.sort_by(|a, b| compare_algos(a, b));
    generate_key(&algs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algo_ordering() {
        let mut algs: Vec<SmolStr> = vec!["RS256".into(), "ES384".into(), "ES256".into()];
        algs.sort_by(|a, b| compare_algos(a, b));
        assert_eq!(algs, ["ES256", "ES384", "RS256"]);
    }

    #[test]
    fn pkce_challenge_matches_verifier() {
        let (challenge, verifier) = generate_pkce();
        let expected: SmolStr = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(sha2::Sha256::digest(verifier.as_bytes()))
            .into();
        assert_eq!(challenge, expected);
    }

    #[test]
    fn nonce_is_unique_per_call() {
        assert_ne!(generate_nonce(), generate_nonce());
    }

    #[test]
    fn dpop_key_generation_respects_supported_algs() {
        let mut config = IssuerConfig::default();
        assert!(generate_dpop_key(&config).is_some(), "fallback is ES256");
        config.dpop_signing_alg_values_supported = Some(vec!["RS256".into()]);
        assert!(generate_dpop_key(&config).is_none());
    }
}
