//! S3 provider adapter.
//!
//! Owns strategy selection (direct vs. chunked at the 6 MiB threshold),
//! option defaulting, the legacy query-string signing, and the
//! best-effort destroy reconciliation for partially-created multipart
//! uploads.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::UploadError;
use crate::models::{
    ObjectOptions, Permissions, ProviderIdentity, RequestKind, SignedRequest, UploadSession,
};
use crate::provider::adapter::{
    NewUploadRequest, PartRequest, PartsRequest, Provider, FINISH_PART,
};
use crate::s3::client::{ObjectStoreClient, SdkObjectStoreClient};
use crate::s3::signer::{sign_request, SigningContext};

/// Uploads above this size use the chunked (multipart) strategy.
pub const CHUNKED_THRESHOLD: u64 = 6 * 1024 * 1024;

/// How long a signed request stays valid by default.
const DEFAULT_EXPIRY_SECS: i64 = 5 * 60;

/// Static configuration for the S3 adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Provider name carried on every session served by this adapter.
    #[serde(default = "default_name")]
    pub name: String,

    /// Region (maps to `location` on the provider identity).
    #[serde(default = "default_location")]
    pub location: String,

    /// Access key identifier embedded in every signed URL.
    pub access_id: String,

    /// Secret key used as the HMAC signing key.
    pub secret_key: String,

    /// Custom endpoint for S3-compatible stores (destroy calls only;
    /// signed URLs always target the region host).
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Use path-style addressing for destroy calls.
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_name() -> String {
    "AmazonS3".to_string()
}

fn default_location() -> String {
    "us-east-1".to_string()
}

/// Map a region to its endpoint host. The default region uses the fixed
/// global host; every other region gets a region-qualified host.
fn region_host(location: &str) -> String {
    if location == "us-east-1" {
        "s3.amazonaws.com".to_string()
    } else {
        format!("s3-{location}.amazonaws.com")
    }
}

/// The S3 provider adapter. Immutable after construction; signing
/// operations are pure, only [`Provider::destroy`] touches the network.
pub struct S3Provider {
    identity: ProviderIdentity,
    access_id: String,
    secret_key: String,
    endpoint_host: String,
    client: Arc<dyn ObjectStoreClient>,
}

impl S3Provider {
    /// Build an adapter from configuration and an injected network client.
    /// Missing credentials are fatal.
    pub fn new(
        config: S3Config,
        client: Arc<dyn ObjectStoreClient>,
    ) -> Result<Self, UploadError> {
        if config.access_id.is_empty() {
            return Err(UploadError::configuration("S3 access ID missing"));
        }
        if config.secret_key.is_empty() {
            return Err(UploadError::configuration("S3 secret key missing"));
        }

        Ok(Self {
            endpoint_host: region_host(&config.location),
            identity: ProviderIdentity {
                name: config.name,
                location: config.location,
            },
            access_id: config.access_id,
            secret_key: config.secret_key,
            client,
        })
    }

    /// Build an adapter wired to the production SDK client. Credentials
    /// for destroy calls default to the signing keys from `config`.
    pub async fn connect(config: S3Config) -> Result<Self, UploadError> {
        let client = SdkObjectStoreClient::new(
            config.location.clone(),
            config.endpoint_url.clone(),
            config.force_path_style,
            Some(config.access_id.clone()),
            Some(config.secret_key.clone()),
        )
        .await
        .map_err(UploadError::Provider)?;
        Self::new(config, Arc::new(client))
    }

    /// Fill provider defaults into an options bag without overwriting
    /// anything the caller set.
    fn apply_defaults(options: &mut ObjectOptions, default_verb: Option<&str>) {
        let now = Utc::now();
        if options.expires.is_none() {
            options.expires = Some(now + Duration::seconds(DEFAULT_EXPIRY_SECS));
        }
        if options.date.is_none() {
            options.date = Some(now);
        }
        if options.verb.is_none() {
            options.verb = default_verb.map(str::to_string);
        }
    }

    fn sign(
        &self,
        bucket_name: &str,
        object_key: &str,
        file_id: Option<&str>,
        options: &ObjectOptions,
    ) -> Result<crate::models::Signature, UploadError> {
        sign_request(&SigningContext {
            access_id: &self.access_id,
            secret_key: &self.secret_key,
            endpoint_host: &self.endpoint_host,
            bucket_name,
            object_key,
            file_id,
            options,
        })
    }

    /// Abort every in-progress multipart upload whose key matches the
    /// session's object key exactly. Last resort when the recorded
    /// resumable id turned out to be invalid or absent.
    ///
    /// Known limitation: the listing is not paginated, so uploads beyond
    /// the first page may remain unaborted.
    async fn abort_by_listing(&self, session: &UploadSession) -> bool {
        let listing = match self
            .client
            .list_multipart_uploads(&session.bucket_name, &session.object_key)
            .await
        {
            Ok(listing) => listing,
            Err(e) => {
                warn!(
                    bucket = %session.bucket_name,
                    key = %session.object_key,
                    "multipart listing failed during destroy: {e}"
                );
                return false;
            }
        };

        if listing.is_truncated {
            warn!(
                bucket = %session.bucket_name,
                key = %session.object_key,
                "multipart listing truncated; uploads beyond the first page are not aborted"
            );
        }

        for upload in listing.uploads.iter().filter(|u| u.key == session.object_key) {
            if let Err(e) = self
                .client
                .abort_multipart_upload(&session.bucket_name, &session.object_key, &upload.upload_id)
                .await
            {
                warn!(
                    upload_id = %upload.upload_id,
                    "failed to abort multipart upload during destroy: {e}"
                );
                return false;
            }
        }

        // Either nothing was in progress or everything matching was aborted.
        true
    }
}

impl Provider for S3Provider {
    fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    fn new_upload(&self, req: &NewUploadRequest) -> Result<SignedRequest, UploadError> {
        let mut options = req.object_options.clone();
        Self::apply_defaults(&mut options, Some("POST"));

        // Derive the access-control header from the permission unless the
        // caller set one explicitly.
        if options.headers.get("x-amz-acl").is_none() {
            let acl = match options.permissions {
                Permissions::Public => "public-read",
                Permissions::Private => "private",
            };
            options.headers.insert("x-amz-acl", acl);
        }

        let mut file_id = req.file_id.as_deref();
        let kind = if req.file_size > CHUNKED_THRESHOLD {
            // Multipart initiation is signalled by an empty `uploads`
            // query parameter; the idempotency token has no meaning for
            // chunked uploads and is dropped from the signed context.
            options.parameters.insert("uploads", "");
            file_id = None;
            RequestKind::ChunkedUpload
        } else {
            options
                .headers
                .set_if_absent("Content-Type", "binary/octet-stream");
            RequestKind::DirectUpload
        };

        debug!(
            bucket = %req.bucket_name,
            key = %req.object_key,
            size = req.file_size,
            ?kind,
            "new upload"
        );

        let signature = self.sign(&req.bucket_name, &req.object_key, file_id, &options)?;
        Ok(SignedRequest { kind, signature })
    }

    fn get_parts(&self, req: &PartsRequest) -> Result<SignedRequest, UploadError> {
        let mut options = req.object_options.clone();
        Self::apply_defaults(&mut options, Some("GET"));
        options
            .parameters
            .set_if_absent("uploadId", &req.resumable_id);

        let signature = self.sign(&req.bucket_name, &req.object_key, None, &options)?;
        Ok(SignedRequest {
            kind: RequestKind::Parts,
            signature,
        })
    }

    fn set_part(&self, req: &PartRequest) -> Result<SignedRequest, UploadError> {
        let mut options = req.object_options.clone();
        Self::apply_defaults(&mut options, None);
        options
            .parameters
            .set_if_absent("uploadId", &req.resumable_id);

        let kind = if req.part == FINISH_PART {
            // The commitment signature for the assembled object.
            options.verb = Some("PUT".to_string());
            RequestKind::Finish
        } else {
            options.parameters.set_if_absent("partNumber", &req.part);
            options.verb = Some("POST".to_string());
            RequestKind::PartUpload
        };

        let signature = self.sign(
            &req.bucket_name,
            &req.object_key,
            req.file_id.as_deref(),
            &options,
        )?;
        Ok(SignedRequest { kind, signature })
    }

    fn destroy(
        &self,
        session: &UploadSession,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let session = session.clone();
        Box::pin(async move {
            let exists = match self
                .client
                .object_exists(&session.bucket_name, &session.object_key)
                .await
            {
                Ok(exists) => exists,
                Err(e) => {
                    warn!(
                        bucket = %session.bucket_name,
                        key = %session.object_key,
                        "existence check failed during destroy: {e}"
                    );
                    return false;
                }
            };

            if !session.resumable {
                // Already gone: idempotent success without a delete call.
                if !exists {
                    return true;
                }
                return self
                    .client
                    .delete_object(&session.bucket_name, &session.object_key)
                    .await
                    .is_ok();
            }

            // A resumable upload that reached completion is an ordinary
            // object by now.
            if exists {
                return self
                    .client
                    .delete_object(&session.bucket_name, &session.object_key)
                    .await
                    .is_ok();
            }

            if let Some(resumable_id) = &session.resumable_id {
                match self
                    .client
                    .abort_multipart_upload(&session.bucket_name, &session.object_key, resumable_id)
                    .await
                {
                    Ok(()) => return true,
                    Err(e) => {
                        // The recorded id may be invalid or expired; fall
                        // through to the listing-based reconciliation.
                        warn!(
                            upload_id = %resumable_id,
                            "multipart abort failed, reconciling via listing: {e}"
                        );
                    }
                }
            }

            self.abort_by_listing(&session).await
        })
    }
}
