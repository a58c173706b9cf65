//! Network surface used by the destroy reconciliation.
//!
//! The [`ObjectStoreClient`] trait covers the four provider calls the
//! adapter ever makes over the network: object existence check, object
//! delete, multipart abort, and the in-progress multipart listing.
//! [`SdkObjectStoreClient`] is the production implementation over the
//! AWS SDK; tests substitute stubs.
//!
//! Credentials for these calls are resolved via the standard AWS
//! credential chain unless explicit keys are injected.

use aws_sdk_s3::Client;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// One entry of an in-progress multipart upload listing.
#[derive(Debug, Clone)]
pub struct MultipartUploadSummary {
    /// Object key the upload targets.
    pub key: String,
    /// Provider-allocated upload identifier.
    pub upload_id: String,
}

/// A single page of the in-progress multipart upload listing.
#[derive(Debug, Clone, Default)]
pub struct MultipartUploadListing {
    pub uploads: Vec<MultipartUploadSummary>,
    /// Whether more uploads exist beyond this page. The reconciliation
    /// does not paginate; a truncated listing is logged, not followed.
    pub is_truncated: bool,
}

/// Async provider network contract.
pub trait ObjectStoreClient: Send + Sync + 'static {
    /// Check whether a completed object exists at `bucket`/`key`.
    fn object_exists(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>>;

    /// Delete the object at `bucket`/`key`.
    fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Abort the multipart upload identified by `upload_id`.
    fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// List in-progress multipart uploads under `prefix`. Returns the
    /// first page only.
    fn list_multipart_uploads(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<MultipartUploadListing>> + Send + '_>>;
}

/// Production client over `aws-sdk-s3`.
pub struct SdkObjectStoreClient {
    client: Client,
}

impl SdkObjectStoreClient {
    /// Build a client for `region`, optionally against a custom endpoint
    /// (S3-compatible stores) and with explicit static credentials.
    pub async fn new(
        region: String,
        endpoint_url: Option<String>,
        force_path_style: bool,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
    ) -> anyhow::Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region));

        if let Some(ref endpoint) = endpoint_url {
            config_loader = config_loader.endpoint_url(endpoint);
        }

        // If explicit credentials are provided, inject them as static credentials.
        if let (Some(ref ak), Some(ref sk)) = (&access_key_id, &secret_access_key) {
            let creds = aws_sdk_s3::config::Credentials::new(
                ak,
                sk,
                None, // session_token
                None, // expiry
                "skylift-config",
            );
            config_loader = config_loader.credentials_provider(creds);
        }

        let sdk_config = config_loader.load().await;

        let s3_config_builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(force_path_style);

        Ok(Self {
            client: Client::from_conf(s3_config_builder.build()),
        })
    }

    /// Map an AWS SDK error to an anyhow error with context.
    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> anyhow::Error {
        anyhow::anyhow!("S3 {context}: {err}")
    }
}

impl ObjectStoreClient for SdkObjectStoreClient {
    fn object_exists(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 head_object: bucket={} key={}", bucket, key);

            match self
                .client
                .head_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
            {
                Ok(_) => Ok(true),
                Err(e) => {
                    let service_err = e.into_service_error();
                    if service_err.is_not_found() {
                        Ok(false)
                    } else {
                        Err(Self::map_sdk_error("head_object", service_err))
                    }
                }
            }
        })
    }

    fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            debug!("S3 delete_object: bucket={} key={}", bucket, key);

            self.client
                .delete_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("delete_object", e))?;

            Ok(())
        })
    }

    fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        let upload_id = upload_id.to_string();
        Box::pin(async move {
            debug!(
                "S3 abort_multipart_upload: bucket={} key={} upload_id={}",
                bucket, key, upload_id
            );

            self.client
                .abort_multipart_upload()
                .bucket(&bucket)
                .key(&key)
                .upload_id(&upload_id)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("abort_multipart_upload", e))?;

            Ok(())
        })
    }

    fn list_multipart_uploads(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<MultipartUploadListing>> + Send + '_>> {
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        Box::pin(async move {
            debug!(
                "S3 list_multipart_uploads: bucket={} prefix={}",
                bucket, prefix
            );

            let resp = self
                .client
                .list_multipart_uploads()
                .bucket(&bucket)
                .prefix(&prefix)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("list_multipart_uploads", e))?;

            let uploads = resp
                .uploads()
                .iter()
                .filter_map(|u| {
                    let key = u.key()?.to_string();
                    let upload_id = u.upload_id()?.to_string();
                    Some(MultipartUploadSummary { key, upload_id })
                })
                .collect();

            Ok(MultipartUploadListing {
                uploads,
                is_truncated: resp.is_truncated().unwrap_or(false),
            })
        })
    }
}
