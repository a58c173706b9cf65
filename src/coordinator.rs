//! Session coordinator: the five upload lifecycle operations.
//!
//! Orchestrates the provider registry, the session store and the
//! application hooks. Every operation resolves the caller's resident
//! identity first; everything else branches on the session state machine
//! described on [`UploadSession`].

use std::sync::Arc;

use tracing::info;

use crate::errors::UploadError;
use crate::hooks::{Hooks, RequestContext, Validation};
use crate::models::{DedupKey, RequestKind, UploadRequest, UploadResponse, UploadSession};
use crate::provider::adapter::{NewUploadRequest, PartRequest, PartsRequest, Provider};
use crate::provider::registry::ProviderRegistry;
use crate::store::store::{InsertOutcome, NewSession, SessionStore};

/// Orchestrates upload sessions against the configured providers and the
/// session store. Holds no mutable state of its own; safe to share.
pub struct Coordinator {
    store: Arc<dyn SessionStore>,
    registry: ProviderRegistry,
    hooks: Hooks,
}

impl Coordinator {
    pub fn new(store: Arc<dyn SessionStore>, registry: ProviderRegistry, hooks: Hooks) -> Self {
        Self {
            store,
            registry,
            hooks,
        }
    }

    /// Resolve the caller identity or fail the operation outright.
    fn resident(&self, ctx: &RequestContext) -> Result<String, UploadError> {
        (self.hooks.resident_identity)(ctx).ok_or(UploadError::IdentityRequired)
    }

    /// Run the pre-validation hook, mapping rejection to the right error.
    fn validate(&self, request: &UploadRequest) -> Result<(), UploadError> {
        match (self.hooks.pre_validate)(request) {
            Validation::Ok => Ok(()),
            Validation::Fields(fields) => Err(UploadError::ValidationFailed { fields }),
            Validation::Rejected => Err(UploadError::ValidationRejected),
        }
    }

    /// Provider for a brand-new session: the dynamic hook when configured,
    /// the static default otherwise.
    fn select_provider(
        &self,
        resident: &str,
        request: &UploadRequest,
    ) -> Result<Arc<dyn Provider>, UploadError> {
        if let Some(dynamic) = &self.hooks.dynamic_provider {
            if let Some(name) = dynamic(resident, request) {
                return self.registry.resolve(&name, None);
            }
        }
        Ok(self.registry.default_provider())
    }

    /// Provider recorded on an existing session. Never re-selected.
    fn session_provider(&self, session: &UploadSession) -> Result<Arc<dyn Provider>, UploadError> {
        self.registry
            .resolve(&session.provider_name, Some(&session.provider_location))
    }

    /// Sanitize the caller-supplied filename in place.
    fn sanitized(&self, mut request: UploadRequest) -> UploadRequest {
        request.file_name = (self.hooks.sanitize_filename)(&request.file_name);
        request
    }

    fn owned_session(
        &self,
        upload_id: &str,
        resident: &str,
    ) -> impl std::future::Future<Output = Result<UploadSession, UploadError>> + '_ {
        let upload_id = upload_id.to_string();
        let resident = resident.to_string();
        async move {
            self.store
                .find_by_id(&upload_id, &resident)
                .await?
                .ok_or(UploadError::SessionNotFound)
        }
    }

    // ── Lifecycle operations ────────────────────────────────────────

    /// Report which provider would serve this upload. No session is
    /// created; the caller uses the name to pick its client-side driver.
    pub async fn initiate(
        &self,
        ctx: &RequestContext,
        request: UploadRequest,
    ) -> Result<String, UploadError> {
        let resident = self.resident(ctx)?;
        let request = self.sanitized(request);
        self.validate(&request)?;

        let provider = self.select_provider(&resident, &request)?;
        Ok(provider.identity().name.clone())
    }

    /// Create a new session or resume an existing one for the same
    /// logical file, returning a signed request either way.
    pub async fn create_or_resume(
        &self,
        ctx: &RequestContext,
        request: UploadRequest,
    ) -> Result<UploadResponse, UploadError> {
        let resident = self.resident(ctx)?;
        let request = self.sanitized(request);

        let key = DedupKey {
            user_id: resident.clone(),
            file_name: request.file_name.clone(),
            file_size: request.file_size,
            file_id: request.file_id.clone(),
        };

        if let Some(session) = self.store.find(&key).await? {
            return self.resume(&session, &request);
        }

        self.validate(&request)?;
        let provider = self.select_provider(&resident, &request)?;

        let bucket_name = (self.hooks.bucket_name)(&request);
        let object_key = (self.hooks.object_key)(&request);
        let mut object_options = (self.hooks.object_options)(&request);

        // Client-requested parameters merge underneath the application's.
        for (k, v) in request.parameters.iter() {
            object_options.parameters.set_if_absent(k, v);
        }

        let signed = provider.new_upload(&NewUploadRequest {
            bucket_name: bucket_name.clone(),
            object_key: object_key.clone(),
            object_options: object_options.clone(),
            file_size: request.file_size,
            file_id: request.file_id.clone(),
        })?;

        let identity = provider.identity();
        let session = match self
            .store
            .insert(NewSession {
                user_id: resident,
                file_id: request.file_id.clone(),
                file_name: request.file_name.clone(),
                file_size: request.file_size,
                provider_name: identity.name.clone(),
                provider_location: identity.location.clone(),
                bucket_name,
                object_key,
                resumable: signed.kind == RequestKind::ChunkedUpload,
                object_options,
            })
            .await?
        {
            InsertOutcome::Created(session) => session,
            InsertOutcome::Conflict => {
                // Lost the creation race; the winner's record is visible
                // now, so take the resume path against it.
                let existing = self.store.find(&key).await?.ok_or_else(|| {
                    UploadError::Provider(anyhow::anyhow!(
                        "concurrent session for {}/{} vanished before it could be resumed",
                        key.user_id,
                        key.file_name
                    ))
                })?;
                return self.resume(&existing, &request);
            }
        };

        info!(
            upload_id = %session.id,
            resident = %session.user_id,
            file = %session.file_name,
            resumable = session.resumable,
            "upload session created"
        );

        Ok(UploadResponse {
            upload_id: session.id,
            residence: identity.name.clone(),
            kind: signed.kind,
            signature: signed.signature,
        })
    }

    /// Resume path: sign against the state recorded on the session.
    fn resume(
        &self,
        session: &UploadSession,
        request: &UploadRequest,
    ) -> Result<UploadResponse, UploadError> {
        let provider = self.session_provider(session)?;

        // Stored options win over anything the client re-supplied.
        let mut object_options = session.object_options.clone();
        for (k, v) in request.parameters.iter() {
            object_options.parameters.set_if_absent(k, v);
        }

        let signed = match &session.resumable_id {
            Some(resumable_id) if session.resumable => provider.get_parts(&PartsRequest {
                bucket_name: session.bucket_name.clone(),
                object_key: session.object_key.clone(),
                object_options,
                resumable_id: resumable_id.clone(),
            })?,
            _ => provider.new_upload(&NewUploadRequest {
                bucket_name: session.bucket_name.clone(),
                object_key: session.object_key.clone(),
                object_options,
                file_size: session.file_size,
                file_id: session.file_id.clone(),
            })?,
        };

        Ok(UploadResponse {
            upload_id: session.id.clone(),
            residence: provider.identity().name.clone(),
            kind: signed.kind,
            signature: signed.signature,
        })
    }

    /// Sign one part upload, or the final commit when `part` is the
    /// `finish` sentinel. Only valid once the provider has allocated a
    /// multipart upload for this session.
    pub async fn request_part(
        &self,
        ctx: &RequestContext,
        upload_id: &str,
        part: &str,
        file_id: Option<String>,
    ) -> Result<UploadResponse, UploadError> {
        let resident = self.resident(ctx)?;
        let session = self.owned_session(upload_id, &resident).await?;
        self.sign_part(&session, part, file_id)
    }

    fn sign_part(
        &self,
        session: &UploadSession,
        part: &str,
        file_id: Option<String>,
    ) -> Result<UploadResponse, UploadError> {
        let resumable_id = match (&session.resumable_id, session.resumable) {
            (Some(id), true) => id.clone(),
            _ => {
                return Err(UploadError::invalid_state(
                    "part signatures require a resumable session with an allocated upload id",
                ))
            }
        };

        let provider = self.session_provider(session)?;
        let signed = provider.set_part(&PartRequest {
            bucket_name: session.bucket_name.clone(),
            object_key: session.object_key.clone(),
            object_options: session.object_options.clone(),
            resumable_id,
            part: part.to_string(),
            file_id,
        })?;

        Ok(UploadResponse {
            upload_id: session.id.clone(),
            residence: provider.identity().name.clone(),
            kind: signed.kind,
            signature: signed.signature,
        })
    }

    /// Record the provider-allocated multipart id (first allocation only)
    /// and sign the requested part against it.
    pub async fn advance_resumable(
        &self,
        ctx: &RequestContext,
        upload_id: &str,
        resumable_id: &str,
        part: &str,
        file_id: Option<String>,
    ) -> Result<UploadResponse, UploadError> {
        let resident = self.resident(ctx)?;
        let mut session = self.owned_session(upload_id, &resident).await?;

        if !session.resumable {
            return Err(UploadError::invalid_state(
                "cannot attach a resumable id to a direct upload session",
            ));
        }

        // The store keeps the first allocation; racing callers all sign
        // against whichever id it reports back.
        let effective = self.store.set_resumable_id(&session.id, resumable_id).await?;
        session.resumable_id = Some(effective);

        self.sign_part(&session, part, file_id)
    }

    /// Finish an upload: run the completion hook and, on success, forget
    /// the session. Repeat calls after success see `SessionNotFound`.
    pub async fn finalize(
        &self,
        ctx: &RequestContext,
        upload_id: &str,
    ) -> Result<(), UploadError> {
        let resident = self.resident(ctx)?;
        let session = self.owned_session(upload_id, &resident).await?;

        if !(self.hooks.upload_complete)(&session) {
            return Err(UploadError::ValidationRejected);
        }

        self.store.delete(&session.id).await?;
        info!(upload_id = %session.id, "upload session completed");
        Ok(())
    }

    /// Delete the uploaded data from the provider and, only if that
    /// succeeds, the session record — a failed provider call leaves the
    /// record in place so the caller can retry.
    pub async fn destroy(&self, ctx: &RequestContext, upload_id: &str) -> Result<(), UploadError> {
        let resident = self.resident(ctx)?;
        let session = self.owned_session(upload_id, &resident).await?;

        if !(self.hooks.destroy_upload)(&session) {
            return Err(UploadError::ValidationRejected);
        }

        let provider = self.session_provider(&session)?;
        if !provider.destroy(&session).await {
            return Err(UploadError::Provider(anyhow::anyhow!(
                "provider failed to destroy upload {}",
                session.id
            )));
        }

        self.store.delete(&session.id).await?;
        info!(upload_id = %session.id, "upload session destroyed");
        Ok(())
    }
}
