use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::{SessionContext, SessionSummary};

pub type SharedSession = Arc<Mutex<SessionContext>>;

/// In-process session registry. Sessions live until deleted or the process
/// exits.
///
/// Each session sits behind its own async mutex; holding it for the length
/// of an operation serializes writes within that session while other
/// sessions proceed.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn store_session(&self, session: SessionContext) -> SharedSession {
        let id = session.id;
        let shared = Arc::new(Mutex::new(session));
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, shared.clone());
        shared
    }

    pub async fn get_session(&self, id: Uuid) -> Option<SharedSession> {
        let sessions = self.sessions.read().await;
        sessions.get(&id).cloned()
    }

    pub async fn remove_session(&self, id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn get_summary(&self, id: Uuid) -> Option<SessionSummary> {
        let session = self.get_session(id).await?;
        let summary = session.lock().await.summary();
        Some(summary)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoleSigners;

    #[tokio::test]
    async fn test_session_lifecycle() {
        let storage = MemoryStorage::new();
        let session = SessionContext::new(RoleSigners::default());
        let id = session.id;

        storage.store_session(session).await;
        assert_eq!(storage.session_count().await, 1);
        assert_eq!(storage.get_summary(id).await.map(|s| s.id), Some(id));

        assert!(storage.remove_session(id).await);
        assert!(!storage.remove_session(id).await);
        assert!(storage.get_session(id).await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_sessions() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        let shared = storage.store_session(SessionContext::new(RoleSigners::default())).await;
        let id = shared.lock().await.id;

        tokio_test::assert_ok!(other.get_session(id).await.ok_or("missing"));
    }
}
