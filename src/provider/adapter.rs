//! Abstract provider adapter trait.
//!
//! Every storage backend must implement [`Provider`].  Signing operations
//! are pure functions of their inputs plus the adapter's fixed
//! configuration; adapters hold no mutable state, so concurrent sessions
//! never contend on them.  `destroy` is the single networked call and
//! reports best-effort success as a boolean.

use std::future::Future;
use std::pin::Pin;

use crate::errors::UploadError;
use crate::models::{ObjectOptions, ProviderIdentity, SignedRequest, UploadSession};

/// Inputs for starting a new upload (direct or chunked; the adapter
/// decides the strategy from `file_size`).
#[derive(Debug, Clone)]
pub struct NewUploadRequest {
    pub bucket_name: String,
    pub object_key: String,
    pub object_options: ObjectOptions,
    pub file_size: u64,
    /// Idempotency token; dropped by adapters for chunked uploads.
    pub file_id: Option<String>,
}

/// Inputs for listing the parts of an in-progress resumable upload.
#[derive(Debug, Clone)]
pub struct PartsRequest {
    pub bucket_name: String,
    pub object_key: String,
    pub object_options: ObjectOptions,
    pub resumable_id: String,
}

/// Part token accepted by [`Provider::set_part`]: either a part number or
/// the literal completion sentinel `"finish"`.
pub const FINISH_PART: &str = "finish";

/// Inputs for signing a part upload or the final multipart commit.
#[derive(Debug, Clone)]
pub struct PartRequest {
    pub bucket_name: String,
    pub object_key: String,
    pub object_options: ObjectOptions,
    pub resumable_id: String,
    /// Part-number token, or [`FINISH_PART`] for the commit signature.
    pub part: String,
    pub file_id: Option<String>,
}

/// Contract for a storage provider adapter.
pub trait Provider: Send + Sync + 'static {
    /// Name and region of this adapter. Immutable after construction.
    fn identity(&self) -> &ProviderIdentity;

    /// Produce a signed request starting an upload. The returned kind is
    /// `DirectUpload` or `ChunkedUpload` depending on the strategy chosen.
    fn new_upload(&self, req: &NewUploadRequest) -> Result<SignedRequest, UploadError>;

    /// Produce a signed request of kind `Parts` listing the uploaded parts
    /// of a resumable upload.
    fn get_parts(&self, req: &PartsRequest) -> Result<SignedRequest, UploadError>;

    /// Produce a signed request of kind `PartUpload` for a numbered part,
    /// or `Finish` for the completion commit.
    fn set_part(&self, req: &PartRequest) -> Result<SignedRequest, UploadError>;

    /// Best-effort deletion of whatever the session left behind: the
    /// completed object, or an in-progress multipart upload. Network
    /// failures are absorbed into `false`; callers retry `destroy` itself.
    fn destroy(
        &self,
        session: &UploadSession,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}
