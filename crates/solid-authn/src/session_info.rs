//! Public session information and its persisted representation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use url::Url;

use solid_authn_oidc::dpop::DpopKeyMaterial;
use solid_authn_oidc::keys::generate_nonce;
use solid_authn_oidc::types::{ClientMetadata, TokenSet, TokenType};

use crate::error::{Error, Result};
use crate::storage_utility::{Scope, StorageUtility};

/// What a session exposes about itself.
///
/// Invariant: `is_logged_in` implies `web_id` is set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    /// Unique identifier of the session.
    pub session_id: SmolStr,
    /// The WebID when logged in.
    pub web_id: Option<Url>,
    pub is_logged_in: bool,
    /// When the current access token stops being valid.
    pub expiration_date: Option<DateTime<Utc>>,
}

impl SessionInfo {
    /// A fresh anonymous session under the given id.
    pub fn anonymous(session_id: impl Into<SmolStr>) -> Self {
        Self {
            session_id: session_id.into(),
            web_id: None,
            is_logged_in: false,
            expiration_date: None,
        }
    }

    /// A fresh anonymous session under a random id.
    pub fn fresh() -> Self {
        Self::anonymous(generate_nonce())
    }
}

/// Everything a logged-in session needs beyond its public info: client
/// registration, token material, and the DPoP key. Never exposed; only
/// persisted and fed to the fetch/refresh paths.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionCredentials {
    pub issuer: Url,
    pub client: ClientMetadata,
    pub token_set: TokenSet,
    pub dpop: Option<DpopKeyMaterial>,
    pub redirect_url: Option<Url>,
}

mod fields {
    pub const WEB_ID: &str = "webId";
    pub const IS_LOGGED_IN: &str = "isLoggedIn";
    pub const ISSUER: &str = "issuer";
    pub const CLIENT_ID: &str = "clientId";
    pub const CLIENT_SECRET: &str = "clientSecret";
    pub const CLIENT_NAME: &str = "clientName";
    pub const REDIRECT_URL: &str = "redirectUrl";
    pub const ACCESS_TOKEN: &str = "accessToken";
    pub const TOKEN_TYPE: &str = "tokenType";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const ID_TOKEN: &str = "idToken";
    pub const EXPIRATION_DATE: &str = "expirationDate";
    pub const DPOP_KEY: &str = "dpopKey";
}

/// Reads and writes the persisted per-session record.
pub struct SessionInfoManager {
    storage: Arc<StorageUtility>,
}

impl SessionInfoManager {
    pub fn new(storage: Arc<StorageUtility>) -> Self {
        Self { storage }
    }

    /// Persist a logged-in session. All fields land in the secure store.
    pub async fn register(
        &self,
        info: &SessionInfo,
        credentials: &SessionCredentials,
    ) -> Result<()> {
        let mut values: Vec<(String, String)> = vec![
            (
                fields::IS_LOGGED_IN.into(),
                info.is_logged_in.to_string(),
            ),
            (fields::ISSUER.into(), credentials.issuer.to_string()),
            (
                fields::CLIENT_ID.into(),
                credentials.client.client_id.to_string(),
            ),
            (
                fields::ACCESS_TOKEN.into(),
                credentials.token_set.access_token.to_string(),
            ),
            (
                fields::TOKEN_TYPE.into(),
                credentials.token_set.token_type.as_str().to_owned(),
            ),
            (
                fields::WEB_ID.into(),
                credentials.token_set.web_id.to_string(),
            ),
        ];
        if let Some(secret) = &credentials.client.client_secret {
            values.push((fields::CLIENT_SECRET.into(), secret.to_string()));
        }
        if let Some(name) = &credentials.client.client_name {
            values.push((fields::CLIENT_NAME.into(), name.to_string()));
        }
        if let Some(redirect) = &credentials.redirect_url {
            values.push((fields::REDIRECT_URL.into(), redirect.to_string()));
        }
        if let Some(refresh) = &credentials.token_set.refresh_token {
            values.push((fields::REFRESH_TOKEN.into(), refresh.to_string()));
        }
        if let Some(id_token) = &credentials.token_set.id_token {
            values.push((fields::ID_TOKEN.into(), id_token.to_string()));
        }
        if let Some(expires_at) = &credentials.token_set.expires_at {
            values.push((fields::EXPIRATION_DATE.into(), expires_at.to_rfc3339()));
        }
        if let Some(dpop) = &credentials.dpop {
            values.push((fields::DPOP_KEY.into(), serde_json::to_string(dpop)?));
        }
        self.storage
            .set_for_user(&info.session_id, values, Scope::Secure)
            .await
    }

    /// Load a persisted session, if one exists under `session_id`.
    pub async fn get(
        &self,
        session_id: &str,
    ) -> Result<Option<(SessionInfo, SessionCredentials)>> {
        let field = |name: &'static str| {
            let storage = &self.storage;
            async move { storage.get_for_user(session_id, name, Scope::Secure).await }
        };

        let Some(web_id) = field(fields::WEB_ID).await? else {
            return Ok(None);
        };
        let (Some(issuer), Some(client_id), Some(access_token), Some(token_type)) = (
            field(fields::ISSUER).await?,
            field(fields::CLIENT_ID).await?,
            field(fields::ACCESS_TOKEN).await?,
            field(fields::TOKEN_TYPE).await?,
        ) else {
            return Err(Error::CorruptedSessionData {
                session_id: session_id.to_owned(),
                details: "record is missing issuer, client, or token fields".into(),
            });
        };

        let corrupted = |details: String| Error::CorruptedSessionData {
            session_id: session_id.to_owned(),
            details,
        };

        let web_id = Url::parse(&web_id).map_err(|e| corrupted(format!("webId: {e}")))?;
        let issuer = Url::parse(&issuer).map_err(|e| corrupted(format!("issuer: {e}")))?;
        let token_type = match token_type.as_str() {
            "DPoP" => TokenType::DPoP,
            "Bearer" => TokenType::Bearer,
            other => return Err(corrupted(format!("unknown token type [{other}]"))),
        };
        let expires_at = match field(fields::EXPIRATION_DATE).await? {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| corrupted(format!("expirationDate: {e}")))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };
        let dpop = match field(fields::DPOP_KEY).await? {
            Some(raw) => Some(
                serde_json::from_str::<DpopKeyMaterial>(&raw)
                    .map_err(|e| corrupted(format!("dpopKey: {e}")))?,
            ),
            None => None,
        };
        let redirect_url = match field(fields::REDIRECT_URL).await? {
            Some(raw) => {
                Some(Url::parse(&raw).map_err(|e| corrupted(format!("redirectUrl: {e}")))?)
            }
            None => None,
        };

        let is_logged_in = field(fields::IS_LOGGED_IN).await?.as_deref() == Some("true");
        let info = SessionInfo {
            session_id: session_id.into(),
            web_id: Some(web_id.clone()),
            is_logged_in,
            expiration_date: expires_at,
        };
        let credentials = SessionCredentials {
            issuer: issuer.clone(),
            client: ClientMetadata {
                client_id: client_id.into(),
                client_secret: field(fields::CLIENT_SECRET).await?.map(Into::into),
                client_name: field(fields::CLIENT_NAME).await?.map(Into::into),
                redirect_uris: redirect_url.clone().into_iter().collect(),
            },
            token_set: TokenSet {
                issuer: issuer.as_str().into(),
                web_id,
                access_token: access_token.into(),
                token_type,
                refresh_token: field(fields::REFRESH_TOKEN).await?.map(Into::into),
                id_token: field(fields::ID_TOKEN).await?.map(Into::into),
                expires_at,
            },
            dpop,
            redirect_url,
        };
        Ok(Some((info, credentials)))
    }

    /// Forget everything persisted about `session_id`, in both scopes.
    pub async fn clear(&self, session_id: &str) -> Result<()> {
        self.storage
            .delete_all_user_data(session_id, Scope::Secure)
            .await?;
        self.storage
            .delete_all_user_data(session_id, Scope::Insecure)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solid_authn_common::storage::MemoryStorage;
    use solid_authn_oidc::keys::generate_key;

    fn manager() -> SessionInfoManager {
        SessionInfoManager::new(Arc::new(StorageUtility::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
        )))
    }

    fn credentials() -> SessionCredentials {
        SessionCredentials {
            issuer: Url::parse("https://idp.example").unwrap(),
            client: ClientMetadata::registered(
                "client-1",
                Some("secret".into()),
                vec![Url::parse("https://app.example/cb").unwrap()],
            ),
            token_set: TokenSet {
                issuer: "https://idp.example".into(),
                web_id: Url::parse("https://me.example/profile#me").unwrap(),
                access_token: "access".into(),
                token_type: TokenType::DPoP,
                refresh_token: Some("refresh".into()),
                id_token: Some("id.token.sig".into()),
                expires_at: Some(Utc::now() + chrono::TimeDelta::minutes(10)),
            },
            dpop: Some(DpopKeyMaterial::new(
                generate_key(&["ES256".into()]).unwrap(),
            )),
            redirect_url: Some(Url::parse("https://app.example/cb").unwrap()),
        }
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let manager = manager();
        let info = SessionInfo {
            session_id: "s1".into(),
            web_id: Some(Url::parse("https://me.example/profile#me").unwrap()),
            is_logged_in: true,
            expiration_date: None,
        };
        let creds = credentials();
        manager.register(&info, &creds).await.unwrap();

        let (restored_info, restored_creds) = manager.get("s1").await.unwrap().unwrap();
        assert!(restored_info.is_logged_in);
        assert_eq!(restored_info.web_id, info.web_id);
        assert_eq!(restored_creds.token_set.access_token, "access");
        assert_eq!(restored_creds.token_set.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(restored_creds.client.client_secret.as_deref(), Some("secret"));
        assert_eq!(restored_creds.dpop, creds.dpop);
    }

    #[tokio::test]
    async fn get_absent_session_is_none() {
        assert!(manager().get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_forgets_the_session() {
        let manager = manager();
        let info = SessionInfo {
            session_id: "s1".into(),
            web_id: Some(Url::parse("https://me.example/profile#me").unwrap()),
            is_logged_in: true,
            expiration_date: None,
        };
        manager.register(&info, &credentials()).await.unwrap();
        manager.clear("s1").await.unwrap();
        assert!(manager.get("s1").await.unwrap().is_none());
    }
}
