use std::future::Future;

use session::{Role, SessionStore};
use tracing::debug;

use crate::error::ClientError;

/// Client-side role check against the cached role.
///
/// Advisory only: it saves a round-trip and lets the UI fail fast. The
/// cached role is client-controlled and may be stale, so a passed check is
/// never proof of authorization; the backend enforces access on its own.
#[derive(Clone)]
pub struct RoleGuard {
    session: SessionStore,
}

impl RoleGuard {
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }

    /// `true` iff a role is cached and it is one of `required`.
    pub async fn authorize(&self, required: &[Role]) -> bool {
        match self.session.role().await {
            Some(role) => required.contains(&role),
            None => false,
        }
    }

    /// Inline form used by endpoint methods before they build a request.
    pub async fn check(&self, required: &[Role]) -> Result<(), ClientError> {
        let actual = self.session.role().await;
        if actual.is_some_and(|role| required.contains(&role)) {
            return Ok(());
        }

        debug!(target: "gateway", ?required, ?actual, "role guard rejected call");
        Err(ClientError::Unauthorized {
            required: required.to_vec(),
            actual,
        })
    }

    /// Runs `operation` only when authorized; otherwise it is never invoked.
    pub async fn guard<F, Fut, T>(&self, required: &[Role], operation: F) -> Result<T, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        self.check(required).await?;
        operation().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session::store::MemoryStore;
    use session::{Session, User};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn guard_for(role: Option<Role>) -> RoleGuard {
        let store = SessionStore::new(Arc::new(MemoryStore::new()));
        if let Some(role) = role {
            let user = User {
                id: "u1".into(),
                full_name: "A".into(),
                email: None,
                enrollment_no: None,
                role,
            };
            store.save(&Session::new("abc", user)).await.unwrap();
        }
        RoleGuard::new(store)
    }

    #[tokio::test]
    async fn authorize_checks_membership() {
        let guard = guard_for(Some(Role::Student)).await;
        assert!(guard.authorize(&[Role::Student]).await);
        assert!(!guard.authorize(&[Role::Teacher]).await);
        assert!(guard.authorize(&[Role::Teacher, Role::Student]).await);
        assert!(!guard.authorize(&[]).await);
    }

    #[tokio::test]
    async fn no_cached_role_is_never_authorized() {
        let guard = guard_for(None).await;
        assert!(!guard.authorize(&[Role::Student, Role::Teacher, Role::Admin]).await);
    }

    #[tokio::test]
    async fn guard_short_circuits_without_invoking_operation() {
        let guard = guard_for(Some(Role::Student)).await;
        let calls = AtomicUsize::new(0);

        let res = guard
            .guard(&[Role::Admin], || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(
            res,
            Err(ClientError::Unauthorized { actual: Some(Role::Student), .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn guard_forwards_result_unchanged() {
        let guard = guard_for(Some(Role::Teacher)).await;

        let res = guard.guard(&[Role::Teacher], || async { Ok(41 + 1) }).await;
        assert_eq!(res.unwrap(), 42);

        let err = guard
            .guard(&[Role::Teacher], || async {
                Err::<(), _>(ClientError::Timeout)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout));
    }
}
