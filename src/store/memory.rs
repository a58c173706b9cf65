//! In-memory session store.
//!
//! Stores all sessions in memory with no persistence. Useful for testing
//! and ephemeral deployments. Uses `RwLock<HashMap>` for thread-safe
//! access; the single write lock makes insert an atomic check-and-create
//! on the dedup key.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use super::store::{InsertOutcome, NewSession, SessionStore};
use crate::models::{DedupKey, UploadSession};

#[derive(Debug, Default)]
struct Inner {
    /// Sessions by store-assigned id.
    sessions: HashMap<String, UploadSession>,
    /// Secondary index: dedup key -> session id.
    by_dedup: HashMap<DedupKey, String>,
}

pub struct MemorySessionStore {
    inner: RwLock<Inner>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Number of live sessions, for tests and diagnostics.
    pub fn len(&self) -> usize {
        self.inner.read().expect("rwlock poisoned").sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemorySessionStore {
    fn find(
        &self,
        key: &DedupKey,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<UploadSession>>> + Send + '_>> {
        let key = key.clone();
        Box::pin(async move {
            let inner = self.inner.read().expect("rwlock poisoned");
            Ok(inner
                .by_dedup
                .get(&key)
                .and_then(|id| inner.sessions.get(id))
                .cloned())
        })
    }

    fn find_by_id(
        &self,
        id: &str,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<UploadSession>>> + Send + '_>> {
        let id = id.to_string();
        let user_id = user_id.to_string();
        Box::pin(async move {
            let inner = self.inner.read().expect("rwlock poisoned");
            Ok(inner
                .sessions
                .get(&id)
                .filter(|s| s.user_id == user_id)
                .cloned())
        })
    }

    fn insert(
        &self,
        new: NewSession,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<InsertOutcome>> + Send + '_>> {
        Box::pin(async move {
            let key = new.dedup_key();
            let mut inner = self.inner.write().expect("rwlock poisoned");
            if inner.by_dedup.contains_key(&key) {
                return Ok(InsertOutcome::Conflict);
            }

            let session = UploadSession {
                id: Uuid::new_v4().to_string(),
                user_id: new.user_id,
                file_id: new.file_id,
                file_name: new.file_name,
                file_size: new.file_size,
                provider_name: new.provider_name,
                provider_location: new.provider_location,
                bucket_name: new.bucket_name,
                object_key: new.object_key,
                resumable: new.resumable,
                resumable_id: None,
                object_options: new.object_options,
                created_at: Utc::now().to_rfc3339(),
            };

            inner.by_dedup.insert(key, session.id.clone());
            inner.sessions.insert(session.id.clone(), session.clone());
            Ok(InsertOutcome::Created(session))
        })
    }

    fn set_resumable_id(
        &self,
        id: &str,
        resumable_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let id = id.to_string();
        let resumable_id = resumable_id.to_string();
        Box::pin(async move {
            let mut inner = self.inner.write().expect("rwlock poisoned");
            let session = inner
                .sessions
                .get_mut(&id)
                .ok_or_else(|| anyhow::anyhow!("no session with id {id}"))?;
            // Compare-and-set under the write lock; the first allocation
            // sticks and later callers get it back.
            Ok(session.resumable_id.get_or_insert(resumable_id).clone())
        })
    }

    fn delete(&self, id: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut inner = self.inner.write().expect("rwlock poisoned");
            if let Some(session) = inner.sessions.remove(&id) {
                inner.by_dedup.remove(&session.dedup_key());
            }
            Ok(())
        })
    }
}
