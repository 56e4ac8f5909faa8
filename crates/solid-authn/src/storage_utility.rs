//! Session-namespaced views over the raw [`Storage`] backends.
//!
//! Each session's state lives in one JSON object of string fields under
//! `solidClientAuthenticationUser:<sessionId>`, so that clearing a session
//! is a single delete and backends only ever see opaque strings.

use std::collections::HashMap;
use std::sync::Arc;

use solid_authn_common::storage::Storage;

use crate::error::{Error, Result};

const USER_KEY_PREFIX: &str = "solidClientAuthenticationUser:";

/// Which of the two backends a value belongs in.
///
/// Secrets (tokens, keys) go to the secure store; anything that may be
/// longer-lived or shared goes to the insecure one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Secure,
    Insecure,
}

/// A secure/insecure storage pair with per-session field records.
pub struct StorageUtility {
    secure: Arc<dyn Storage>,
    insecure: Arc<dyn Storage>,
}

impl StorageUtility {
    pub fn new(secure: Arc<dyn Storage>, insecure: Arc<dyn Storage>) -> Self {
        Self { secure, insecure }
    }

    fn store(&self, scope: Scope) -> &dyn Storage {
        match scope {
            Scope::Secure => self.secure.as_ref(),
            Scope::Insecure => self.insecure.as_ref(),
        }
    }

    fn user_key(session_id: &str) -> String {
        format!("{USER_KEY_PREFIX}{session_id}")
    }

    async fn user_record(
        &self,
        session_id: &str,
        scope: Scope,
    ) -> Result<HashMap<String, String>> {
        let Some(stored) = self.store(scope).get(&Self::user_key(session_id)).await? else {
            return Ok(HashMap::new());
        };
        serde_json::from_str(&stored).map_err(|e| Error::CorruptedSessionData {
            session_id: session_id.to_owned(),
            details: format!("expected valid JSON, but got: {stored} ({e})"),
        })
    }

    async fn write_user_record(
        &self,
        session_id: &str,
        record: &HashMap<String, String>,
        scope: Scope,
    ) -> Result<()> {
        self.store(scope)
            .set(&Self::user_key(session_id), serde_json::to_string(record)?)
            .await?;
        Ok(())
    }

    /// Raw passthrough get, un-namespaced.
    pub async fn get(&self, key: &str, scope: Scope) -> Result<Option<String>> {
        Ok(self.store(scope).get(key).await?)
    }

    /// Raw passthrough set, un-namespaced.
    pub async fn set(&self, key: &str, value: String, scope: Scope) -> Result<()> {
        Ok(self.store(scope).set(key, value).await?)
    }

    /// Raw passthrough delete, un-namespaced.
    pub async fn delete(&self, key: &str, scope: Scope) -> Result<()> {
        Ok(self.store(scope).delete(key).await?)
    }

    /// Get one field of a session's record.
    pub async fn get_for_user(
        &self,
        session_id: &str,
        field: &str,
        scope: Scope,
    ) -> Result<Option<String>> {
        Ok(self.user_record(session_id, scope).await?.remove(field))
    }

    /// Merge fields into a session's record, creating it if absent.
    pub async fn set_for_user(
        &self,
        session_id: &str,
        values: impl IntoIterator<Item = (String, String)> + Send,
        scope: Scope,
    ) -> Result<()> {
        let mut record = self.user_record(session_id, scope).await?;
        record.extend(values);
        self.write_user_record(session_id, &record, scope).await
    }

    /// Remove one field of a session's record.
    pub async fn delete_for_user(&self, session_id: &str, field: &str, scope: Scope) -> Result<()> {
        let mut record = self.user_record(session_id, scope).await?;
        record.remove(field);
        self.write_user_record(session_id, &record, scope).await
    }

    /// Drop a session's whole record.
    pub async fn delete_all_user_data(&self, session_id: &str, scope: Scope) -> Result<()> {
        self.store(scope).delete(&Self::user_key(session_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solid_authn_common::storage::MemoryStorage;

    fn utility() -> StorageUtility {
        StorageUtility::new(Arc::new(MemoryStorage::new()), Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn user_fields_round_trip() {
        let storage = utility();
        storage
            .set_for_user(
                "session-1",
                [("webId".to_owned(), "https://me.example/#me".to_owned())],
                Scope::Secure,
            )
            .await
            .unwrap();
        assert_eq!(
            storage
                .get_for_user("session-1", "webId", Scope::Secure)
                .await
                .unwrap()
                .as_deref(),
            Some("https://me.example/#me")
        );
        // Fields merge rather than replace.
        storage
            .set_for_user(
                "session-1",
                [("isLoggedIn".to_owned(), "true".to_owned())],
                Scope::Secure,
            )
            .await
            .unwrap();
        assert!(
            storage
                .get_for_user("session-1", "webId", Scope::Secure)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn scopes_are_disjoint() {
        let storage = utility();
        storage
            .set_for_user(
                "session-1",
                [("k".to_owned(), "v".to_owned())],
                Scope::Secure,
            )
            .await
            .unwrap();
        assert_eq!(
            storage
                .get_for_user("session-1", "k", Scope::Insecure)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn delete_all_clears_the_record() {
        let storage = utility();
        storage
            .set_for_user(
                "session-1",
                [("k".to_owned(), "v".to_owned())],
                Scope::Secure,
            )
            .await
            .unwrap();
        storage
            .delete_all_user_data("session-1", Scope::Secure)
            .await
            .unwrap();
        assert_eq!(
            storage
                .get_for_user("session-1", "k", Scope::Secure)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn corrupted_record_names_the_session() {
        let storage = utility();
        storage
            .set(
                &StorageUtility::user_key("session-1"),
                "not json".to_owned(),
                Scope::Secure,
            )
            .await
            .unwrap();
        let err = storage
            .get_for_user("session-1", "k", Scope::Secure)
            .await
            .unwrap_err();
        match err {
            Error::CorruptedSessionData { session_id, .. } => assert_eq!(session_id, "session-1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
