use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::StorageError;
use crate::model::{Role, Session, User};
use crate::store::KeyValueStore;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const ROLE_KEY: &str = "role";

const SESSION_KEYS: [&str; 3] = [TOKEN_KEY, USER_KEY, ROLE_KEY];

/// Owner of the persisted authentication state.
///
/// The token, serialized user and role are kept as three independent entries
/// so the role can be read without deserializing the user. The handle is
/// cheap to clone and is passed explicitly to whoever needs it.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Persists all three entries. If any write fails, whatever was written is
    /// rolled back (best effort) so a half-written session is never loadable.
    #[instrument(
        skip(self, session),
        target = "session",
        fields(user_id = %session.user.id, role = %session.role)
    )]
    pub async fn save(&self, session: &Session) -> Result<(), StorageError> {
        let user_json =
            serde_json::to_string(&session.user).map_err(|source| StorageError::Serialize {
                key: USER_KEY,
                source,
            })?;

        let entries = [
            (TOKEN_KEY, session.token.as_str()),
            (USER_KEY, user_json.as_str()),
            (ROLE_KEY, session.role.as_str()),
        ];

        for (key, value) in entries {
            if let Err(e) = self.storage.set(key, value).await {
                warn!(key, error = %e, "session write failed; rolling back");
                self.rollback().await;
                return Err(StorageError::write(key, e));
            }
        }

        info!("session saved");
        Ok(())
    }

    /// Returns the saved session, or `None` when absent, unreadable or corrupt.
    #[instrument(skip(self), target = "session")]
    pub async fn load(&self) -> Option<Session> {
        let token = self.read(TOKEN_KEY).await?;
        let user_json = self.read(USER_KEY).await?;
        let role_raw = self.read(ROLE_KEY).await?;

        if token.trim().is_empty() {
            warn!("stored token is empty; treating session as absent");
            return None;
        }

        let user: User = match serde_json::from_str(&user_json) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "stored user is not valid JSON; treating session as absent");
                return None;
            }
        };

        if !user.is_complete() {
            warn!("stored user is missing required fields; treating session as absent");
            return None;
        }

        let role: Role = match role_raw.parse() {
            Ok(role) => role,
            Err(e) => {
                warn!(error = %e, "stored role is unknown; treating session as absent");
                return None;
            }
        };

        debug!(user_id = %user.id, %role, "session loaded");
        Some(Session { token, user, role })
    }

    /// Bearer token only. Read failures count as "not logged in".
    pub async fn token(&self) -> Option<String> {
        self.read(TOKEN_KEY)
            .await
            .filter(|token| !token.trim().is_empty())
    }

    /// Cached role only, without touching the user entry.
    pub async fn role(&self) -> Option<Role> {
        let raw = self.read(ROLE_KEY).await?;
        match raw.parse() {
            Ok(role) => Some(role),
            Err(e) => {
                warn!(error = %e, "cached role is unknown");
                None
            }
        }
    }

    /// Deletes all three entries. Clearing an empty store is a no-op.
    ///
    /// Every key is attempted even after a failure; the first failure is
    /// returned so the caller never believes a failed logout succeeded.
    #[instrument(skip(self), target = "session")]
    pub async fn clear(&self) -> Result<(), StorageError> {
        let mut first_err = None;

        for key in SESSION_KEYS {
            if let Err(e) = self.storage.delete(key).await {
                warn!(key, error = %e, "failed to delete session entry");
                first_err.get_or_insert(StorageError::delete(key, e));
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => {
                info!("session cleared");
                Ok(())
            }
        }
    }

    async fn read(&self, key: &'static str) -> Option<String> {
        match self.storage.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "secure storage read failed; treating as absent");
                None
            }
        }
    }

    async fn rollback(&self) {
        for key in SESSION_KEYS {
            if let Err(e) = self.storage.delete(key).await {
                warn!(key, error = %e, "rollback delete failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tracing_test::traced_test;

    fn student() -> Session {
        Session::new(
            "abc",
            User {
                id: "u1".into(),
                full_name: "A".into(),
                email: None,
                enrollment_no: Some("ET20BTCS001".into()),
                role: Role::Student,
            },
        )
    }

    #[tokio::test]
    async fn save_then_load_round_trips() -> anyhow::Result<()> {
        let store = SessionStore::new(Arc::new(MemoryStore::new()));
        store.save(&student()).await?;

        let loaded = store.load().await.expect("session should load");
        assert_eq!(loaded.token, "abc");
        assert_eq!(loaded.user.id, "u1");
        assert_eq!(loaded.role, Role::Student);
        Ok(())
    }

    #[tokio::test]
    async fn entries_are_stored_separately() -> anyhow::Result<()> {
        let kv = Arc::new(MemoryStore::new());
        let store = SessionStore::new(kv.clone());
        store.save(&student()).await?;

        assert_eq!(kv.get(ROLE_KEY).await?.as_deref(), Some("student"));
        assert_eq!(kv.get(TOKEN_KEY).await?.as_deref(), Some("abc"));
        assert!(kv.get(USER_KEY).await?.unwrap().contains("\"_id\":\"u1\""));
        Ok(())
    }

    #[tokio::test]
    async fn clear_on_empty_store_is_noop() -> anyhow::Result<()> {
        let store = SessionStore::new(Arc::new(MemoryStore::new()));
        store.clear().await?;
        store.clear().await?;
        assert!(store.load().await.is_none());
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn corrupt_user_is_treated_as_absent() -> anyhow::Result<()> {
        let kv = Arc::new(MemoryStore::new());
        kv.set(TOKEN_KEY, "abc").await?;
        kv.set(USER_KEY, "{not json").await?;
        kv.set(ROLE_KEY, "student").await?;

        let store = SessionStore::new(kv);
        assert!(store.load().await.is_none());
        assert!(logs_contain("stored user is not valid JSON"));
        Ok(())
    }

    #[tokio::test]
    async fn user_missing_fields_is_treated_as_absent() -> anyhow::Result<()> {
        let kv = Arc::new(MemoryStore::new());
        kv.set(TOKEN_KEY, "abc").await?;
        kv.set(USER_KEY, r#"{"_id":"u1","role":"student"}"#).await?;
        kv.set(ROLE_KEY, "student").await?;

        let store = SessionStore::new(kv);
        assert!(store.load().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_role_is_treated_as_absent() -> anyhow::Result<()> {
        let kv = Arc::new(MemoryStore::new());
        let store = SessionStore::new(kv.clone());
        store.save(&student()).await?;
        kv.set(ROLE_KEY, "superuser").await?;

        assert!(store.load().await.is_none());
        assert!(store.role().await.is_none());
        // Token alone is still readable for request annotation.
        assert_eq!(store.token().await.as_deref(), Some("abc"));
        Ok(())
    }
}
