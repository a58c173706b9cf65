//! Application customization hooks.
//!
//! The host application injects these as plain closures when building the
//! coordinator; there is no global callback registry and nothing here is
//! mutated after construction. Every hook is a pure function over the
//! context it is handed.

use std::collections::BTreeMap;

use crate::errors::UploadError;
use crate::models::{ObjectOptions, UploadRequest, UploadSession};

/// Per-call context handed to the resident-identity hook. The transport
/// layer fills this from whatever authentication it performed.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Identity of the caller, when already resolved by the transport.
    pub resident_id: Option<String>,
    /// Opaque request parameters for application hooks.
    pub params: BTreeMap<String, String>,
}

impl RequestContext {
    /// Context for an already-authenticated resident.
    pub fn for_resident(resident_id: impl Into<String>) -> Self {
        Self {
            resident_id: Some(resident_id.into()),
            params: BTreeMap::new(),
        }
    }
}

/// Outcome of the pre-validation hook.
#[derive(Debug, Clone)]
pub enum Validation {
    /// The request may proceed.
    Ok,
    /// Rejected, with per-field error messages for the caller.
    Fields(BTreeMap<String, String>),
    /// Rejected without structured detail.
    Rejected,
}

type ResidentIdentityFn = dyn Fn(&RequestContext) -> Option<String> + Send + Sync;
type SanitizeFilenameFn = dyn Fn(&str) -> String + Send + Sync;
type PreValidateFn = dyn Fn(&UploadRequest) -> Validation + Send + Sync;
type NamingFn = dyn Fn(&UploadRequest) -> String + Send + Sync;
type ObjectOptionsFn = dyn Fn(&UploadRequest) -> ObjectOptions + Send + Sync;
type AuthorizeFn = dyn Fn(&UploadSession) -> bool + Send + Sync;
type DynamicProviderFn = dyn Fn(&str, &UploadRequest) -> Option<String> + Send + Sync;

/// The full hook set consumed by the coordinator.
///
/// Built once via [`Hooks::builder`]; a bucket-name hook is mandatory,
/// everything else has a sensible default.
pub struct Hooks {
    pub(crate) resident_identity: Box<ResidentIdentityFn>,
    pub(crate) sanitize_filename: Box<SanitizeFilenameFn>,
    pub(crate) pre_validate: Box<PreValidateFn>,
    pub(crate) bucket_name: Box<NamingFn>,
    pub(crate) object_key: Box<NamingFn>,
    pub(crate) object_options: Box<ObjectOptionsFn>,
    pub(crate) upload_complete: Box<AuthorizeFn>,
    pub(crate) destroy_upload: Box<AuthorizeFn>,
    pub(crate) dynamic_provider: Option<Box<DynamicProviderFn>>,
}

impl Hooks {
    pub fn builder() -> HooksBuilder {
        HooksBuilder::default()
    }
}

/// Default filename sanitizer: every character outside `[A-Za-z0-9._-]`
/// becomes an underscore.
pub fn sanitize_filename(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Builder for [`Hooks`].
#[derive(Default)]
pub struct HooksBuilder {
    resident_identity: Option<Box<ResidentIdentityFn>>,
    sanitize_filename: Option<Box<SanitizeFilenameFn>>,
    pre_validate: Option<Box<PreValidateFn>>,
    bucket_name: Option<Box<NamingFn>>,
    object_key: Option<Box<NamingFn>>,
    object_options: Option<Box<ObjectOptionsFn>>,
    upload_complete: Option<Box<AuthorizeFn>>,
    destroy_upload: Option<Box<AuthorizeFn>>,
    dynamic_provider: Option<Box<DynamicProviderFn>>,
}

impl HooksBuilder {
    /// Resolve the caller identity. Default: the context's `resident_id`.
    pub fn resident_identity<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.resident_identity = Some(Box::new(f));
        self
    }

    /// Sanitize the raw client filename. Default: [`sanitize_filename`].
    pub fn sanitize_filename<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.sanitize_filename = Some(Box::new(f));
        self
    }

    /// Validate the upload metadata before anything is signed or stored.
    /// Default: accept everything.
    pub fn pre_validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&UploadRequest) -> Validation + Send + Sync + 'static,
    {
        self.pre_validate = Some(Box::new(f));
        self
    }

    /// Choose the bucket for a new upload. Mandatory.
    pub fn bucket_name<F>(mut self, f: F) -> Self
    where
        F: Fn(&UploadRequest) -> String + Send + Sync + 'static,
    {
        self.bucket_name = Some(Box::new(f));
        self
    }

    /// Choose the object key for a new upload. Default: the sanitized
    /// file name.
    pub fn object_key<F>(mut self, f: F) -> Self
    where
        F: Fn(&UploadRequest) -> String + Send + Sync + 'static,
    {
        self.object_key = Some(Box::new(f));
        self
    }

    /// Produce the initial object options for a new upload. Default: empty
    /// (the provider fills in its own defaults at signing time).
    pub fn object_options<F>(mut self, f: F) -> Self
    where
        F: Fn(&UploadRequest) -> ObjectOptions + Send + Sync + 'static,
    {
        self.object_options = Some(Box::new(f));
        self
    }

    /// Authorize finalization of a completed upload. Default: allow.
    pub fn upload_complete<F>(mut self, f: F) -> Self
    where
        F: Fn(&UploadSession) -> bool + Send + Sync + 'static,
    {
        self.upload_complete = Some(Box::new(f));
        self
    }

    /// Authorize destruction of an upload. Default: allow.
    pub fn destroy_upload<F>(mut self, f: F) -> Self
    where
        F: Fn(&UploadSession) -> bool + Send + Sync + 'static,
    {
        self.destroy_upload = Some(Box::new(f));
        self
    }

    /// Select a provider per resident for brand-new sessions. The returned
    /// name is resolved against the registry; `None` falls back to the
    /// default provider. Unset by default (static selection).
    pub fn dynamic_provider<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &UploadRequest) -> Option<String> + Send + Sync + 'static,
    {
        self.dynamic_provider = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Result<Hooks, UploadError> {
        let bucket_name = self
            .bucket_name
            .ok_or_else(|| UploadError::configuration("a bucket_name hook is required"))?;

        Ok(Hooks {
            resident_identity: self
                .resident_identity
                .unwrap_or_else(|| Box::new(|ctx: &RequestContext| ctx.resident_id.clone())),
            sanitize_filename: self
                .sanitize_filename
                .unwrap_or_else(|| Box::new(|raw: &str| sanitize_filename(raw))),
            pre_validate: self
                .pre_validate
                .unwrap_or_else(|| Box::new(|_: &UploadRequest| Validation::Ok)),
            bucket_name,
            object_key: self
                .object_key
                .unwrap_or_else(|| Box::new(|req: &UploadRequest| req.file_name.clone())),
            object_options: self
                .object_options
                .unwrap_or_else(|| Box::new(|_: &UploadRequest| ObjectOptions::default())),
            upload_complete: self
                .upload_complete
                .unwrap_or_else(|| Box::new(|_: &UploadSession| true)),
            destroy_upload: self
                .destroy_upload
                .unwrap_or_else(|| Box::new(|_: &UploadSession| true)),
            dynamic_provider: self.dynamic_provider,
        })
    }
}
