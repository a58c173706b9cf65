//! Abstract session store trait.
//!
//! Any persistence backend must implement [`SessionStore`].  The trait
//! uses `async_trait`-style methods (manual desugaring with pinned
//! futures) so it can back onto an embedded map, a SQL database, or a
//! remote store without changing the coordinator.

use std::future::Future;
use std::pin::Pin;

use crate::models::{DedupKey, ObjectOptions, UploadSession};

/// Fields for a session about to be created. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: String,
    pub file_id: Option<String>,
    pub file_name: String,
    pub file_size: u64,
    pub provider_name: String,
    pub provider_location: String,
    pub bucket_name: String,
    pub object_key: String,
    pub resumable: bool,
    pub object_options: ObjectOptions,
}

impl NewSession {
    /// The dedup key the created session will be addressed by.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            user_id: self.user_id.clone(),
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            file_id: self.file_id.clone(),
        }
    }
}

/// Outcome of an insert attempt.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// The record was created; the store assigned its id.
    Created(UploadSession),
    /// A session with the same dedup key already exists. Reported as an
    /// outcome rather than an error so losing a creation race stays
    /// distinguishable from a store failure.
    Conflict,
}

/// Async session store contract.
///
/// `insert` must be an atomic check-and-create on the dedup key: when two
/// concurrent calls race for the same logical file, exactly one wins and
/// the other observes [`InsertOutcome::Conflict`], re-reads, and takes
/// the resume path.
pub trait SessionStore: Send + Sync + 'static {
    /// Look up a session by dedup key.
    fn find(
        &self,
        key: &DedupKey,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<UploadSession>>> + Send + '_>>;

    /// Look up a session by id, scoped to its owner. Returns `None` both
    /// when the id is unknown and when it belongs to another resident.
    fn find_by_id(
        &self,
        id: &str,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<UploadSession>>> + Send + '_>>;

    /// Create a session record, assigning its id. Reports
    /// [`InsertOutcome::Conflict`] when a session with the same dedup key
    /// already exists.
    fn insert(
        &self,
        new: NewSession,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<InsertOutcome>> + Send + '_>>;

    /// Record the provider-allocated multipart upload identifier. The only
    /// permitted mutation of a stored session, and a compare-and-set: an
    /// id already on the record is kept. Returns the effective id, so
    /// racing callers converge on whichever allocation landed first.
    fn set_resumable_id(
        &self,
        id: &str,
        resumable_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>>;

    /// Delete a session record by id.
    fn delete(&self, id: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;
}
