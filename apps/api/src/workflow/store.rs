//! In-memory session store. Sessions live for the lifetime of the process
//! and are never persisted — "your data is never stored" is a product
//! guarantee, not an optimization.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::AppError;
use crate::workflow::session::Session;

/// Process-local store keyed by session id. The lock is held only for the
/// duration of one state transition, never across an await.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().await.insert(id, Session::new());
        id
    }

    /// Runs one state transition against the session under the lock.
    pub async fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> T,
    ) -> Result<T, AppError> {
        let mut sessions = self.inner.lock().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
        Ok(f(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::session::Phase;

    #[tokio::test]
    async fn test_create_then_access() {
        let store = SessionStore::new();
        let id = store.create().await;
        let phase = store.with_session(id, |s| s.phase()).await.unwrap();
        assert_eq!(phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let store = SessionStore::new();
        let err = store
            .with_session(Uuid::new_v4(), |s| s.phase())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = SessionStore::new();
        let a = store.create().await;
        let b = store.create().await;
        store
            .with_session(a, |s| s.set_job_description("Rust role".to_string()))
            .await
            .unwrap();
        let other = store
            .with_session(b, |s| s.job_description.clone())
            .await
            .unwrap();
        assert!(other.is_empty());
    }
}
