//! End-to-end tests for the upload session lifecycle.
//!
//! Drives the coordinator against the in-memory session store and the S3
//! adapter wired to a stub network client, so every path including the
//! destroy reconciliation runs without touching a real provider.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use skylift::s3::adapter::{S3Config, S3Provider};
use skylift::s3::client::{MultipartUploadListing, ObjectStoreClient};
use skylift::store::store::{InsertOutcome, NewSession};
use skylift::{
    Coordinator, DedupKey, Hooks, MemorySessionStore, Provider, ProviderRegistry, RequestContext,
    RequestKind, SessionStore, UploadError, UploadRequest, UploadSession, Validation,
};

// ── Stub network client ─────────────────────────────────────────────

#[derive(Default)]
struct StubClient {
    object_exists: bool,
    delete_fails: bool,
    calls: Mutex<Vec<&'static str>>,
}

impl ObjectStoreClient for StubClient {
    fn object_exists(
        &self,
        _bucket: &str,
        _key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        self.calls.lock().unwrap().push("head");
        let exists = self.object_exists;
        Box::pin(async move { Ok(exists) })
    }

    fn delete_object(
        &self,
        _bucket: &str,
        _key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        self.calls.lock().unwrap().push("delete");
        let fails = self.delete_fails;
        Box::pin(async move {
            if fails {
                Err(anyhow::anyhow!("connection reset"))
            } else {
                Ok(())
            }
        })
    }

    fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        _upload_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        self.calls.lock().unwrap().push("abort");
        Box::pin(async { Ok(()) })
    }

    fn list_multipart_uploads(
        &self,
        _bucket: &str,
        _prefix: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<MultipartUploadListing>> + Send + '_>> {
        self.calls.lock().unwrap().push("list");
        Box::pin(async { Ok(MultipartUploadListing::default()) })
    }
}

// ── Fixture ─────────────────────────────────────────────────────────

struct Fixture {
    coordinator: Coordinator,
    store: Arc<MemorySessionStore>,
}

fn s3_config() -> S3Config {
    S3Config {
        name: "AmazonS3".to_string(),
        location: "us-east-1".to_string(),
        access_id: "AKIDEXAMPLE".to_string(),
        secret_key: "wJalrXUtnFEMI/K7MDENG/bPxRfiCY".to_string(),
        endpoint_url: None,
        force_path_style: false,
    }
}

fn fixture_with(client: StubClient, hooks: Hooks) -> Fixture {
    let provider: Arc<dyn Provider> =
        Arc::new(S3Provider::new(s3_config(), Arc::new(client)).unwrap());
    let registry = ProviderRegistry::new(vec![provider]).unwrap();
    let store = Arc::new(MemorySessionStore::new());
    Fixture {
        coordinator: Coordinator::new(store.clone(), registry, hooks),
        store,
    }
}

fn default_hooks() -> Hooks {
    Hooks::builder()
        .bucket_name(|_| "media".to_string())
        .build()
        .unwrap()
}

fn fixture() -> Fixture {
    fixture_with(StubClient::default(), default_hooks())
}

fn upload(file_name: &str, file_size: u64, file_id: &str) -> UploadRequest {
    UploadRequest {
        file_name: file_name.to_string(),
        file_size,
        file_id: Some(file_id.to_string()),
        ..Default::default()
    }
}

fn ctx() -> RequestContext {
    RequestContext::for_resident("r-1")
}

const TEN_MIB: u64 = 10 * 1024 * 1024;

// ── initiate ────────────────────────────────────────────────────────

#[tokio::test]
async fn initiate_reports_residence_without_creating_a_session() {
    let fx = fixture();
    let residence = fx
        .coordinator
        .initiate(&ctx(), upload("a.bin", 100, "f1"))
        .await
        .unwrap();
    assert_eq!(residence, "AmazonS3");
    assert!(fx.store.is_empty());
}

#[tokio::test]
async fn missing_identity_is_fatal() {
    let fx = fixture();
    let err = fx
        .coordinator
        .initiate(&RequestContext::default(), upload("a.bin", 100, "f1"))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::IdentityRequired));
}

#[tokio::test]
async fn field_validation_errors_are_structured() {
    let hooks = Hooks::builder()
        .bucket_name(|_| "media".to_string())
        .pre_validate(|req| {
            if req.file_size == 0 {
                let mut fields = BTreeMap::new();
                fields.insert("file_size".to_string(), "must be positive".to_string());
                Validation::Fields(fields)
            } else {
                Validation::Ok
            }
        })
        .build()
        .unwrap();
    let fx = fixture_with(StubClient::default(), hooks);

    let err = fx
        .coordinator
        .create_or_resume(&ctx(), upload("a.bin", 0, "f1"))
        .await
        .unwrap_err();
    match err {
        UploadError::ValidationFailed { fields } => {
            assert_eq!(fields.get("file_size").unwrap(), "must be positive");
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }
    assert!(fx.store.is_empty());
}

#[tokio::test]
async fn dynamic_provider_hook_selects_by_name() {
    let hooks = Hooks::builder()
        .bucket_name(|_| "media".to_string())
        .dynamic_provider(|resident, _req| {
            (resident == "r-1").then(|| "AmazonS3".to_string())
        })
        .build()
        .unwrap();
    let fx = fixture_with(StubClient::default(), hooks);

    let residence = fx
        .coordinator
        .initiate(&ctx(), upload("a.bin", 100, "f1"))
        .await
        .unwrap();
    assert_eq!(residence, "AmazonS3");
}

// ── create_or_resume ────────────────────────────────────────────────

#[tokio::test]
async fn small_file_creates_direct_session() {
    let fx = fixture();
    let resp = fx
        .coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f1"))
        .await
        .unwrap();

    assert_eq!(resp.kind, RequestKind::DirectUpload);
    assert_eq!(resp.residence, "AmazonS3");
    assert_eq!(resp.signature.verb, "POST");
    assert!(resp
        .signature
        .url
        .starts_with("https://s3.amazonaws.com/media/a.bin?"));

    let session = fx.store.find_by_id(&resp.upload_id, "r-1").await.unwrap().unwrap();
    assert!(!session.resumable);
    assert!(session.resumable_id.is_none());
}

#[tokio::test]
async fn large_file_creates_resumable_session() {
    let fx = fixture();
    let resp = fx
        .coordinator
        .create_or_resume(&ctx(), upload("big.bin", TEN_MIB, "f1"))
        .await
        .unwrap();

    assert_eq!(resp.kind, RequestKind::ChunkedUpload);
    let session = fx.store.find_by_id(&resp.upload_id, "r-1").await.unwrap().unwrap();
    assert!(session.resumable);
    assert!(session.resumable_id.is_none());
}

#[tokio::test]
async fn identical_dedup_key_returns_same_session() {
    let fx = fixture();
    let first = fx
        .coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f1"))
        .await
        .unwrap();
    let second = fx
        .coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f1"))
        .await
        .unwrap();

    assert_eq!(first.upload_id, second.upload_id);
    assert_eq!(fx.store.len(), 1);
    // No resumable id yet, so the resume path re-issues a fresh upload
    // signature rather than a parts listing.
    assert_eq!(second.kind, RequestKind::DirectUpload);
}

#[tokio::test]
async fn resume_with_allocated_id_returns_parts_listing() {
    let fx = fixture();
    let created = fx
        .coordinator
        .create_or_resume(&ctx(), upload("big.bin", TEN_MIB, "f1"))
        .await
        .unwrap();

    // Client reports the provider-allocated multipart id.
    fx.coordinator
        .advance_resumable(&ctx(), &created.upload_id, "mp-1", "1", None)
        .await
        .unwrap();

    let resumed = fx
        .coordinator
        .create_or_resume(&ctx(), upload("big.bin", TEN_MIB, "f1"))
        .await
        .unwrap();
    assert_eq!(resumed.upload_id, created.upload_id);
    assert_eq!(resumed.kind, RequestKind::Parts);
    assert_eq!(resumed.signature.verb, "GET");
    assert!(resumed.signature.url.contains("uploadId=mp-1&"));
}

#[tokio::test]
async fn different_file_ids_are_different_sessions() {
    let fx = fixture();
    let first = fx
        .coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f1"))
        .await
        .unwrap();
    let second = fx
        .coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f2"))
        .await
        .unwrap();
    assert_ne!(first.upload_id, second.upload_id);
    assert_eq!(fx.store.len(), 2);
}

/// Store wrapper whose next dedup lookup misses, reproducing the window
/// where another task inserts between this task's read and its own insert.
struct StaleReadStore {
    inner: MemorySessionStore,
    miss_next_find: AtomicBool,
}

impl SessionStore for StaleReadStore {
    fn find(
        &self,
        key: &DedupKey,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<UploadSession>>> + Send + '_>> {
        if self.miss_next_find.swap(false, Ordering::SeqCst) {
            return Box::pin(async { Ok(None) });
        }
        self.inner.find(key)
    }

    fn find_by_id(
        &self,
        id: &str,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<UploadSession>>> + Send + '_>> {
        self.inner.find_by_id(id, user_id)
    }

    fn insert(
        &self,
        new: NewSession,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<InsertOutcome>> + Send + '_>> {
        self.inner.insert(new)
    }

    fn set_resumable_id(
        &self,
        id: &str,
        resumable_id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        self.inner.set_resumable_id(id, resumable_id)
    }

    fn delete(&self, id: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        self.inner.delete(id)
    }
}

#[tokio::test]
async fn create_race_loser_resumes_winner_session() {
    let store = Arc::new(StaleReadStore {
        inner: MemorySessionStore::new(),
        miss_next_find: AtomicBool::new(false),
    });
    let provider: Arc<dyn Provider> =
        Arc::new(S3Provider::new(s3_config(), Arc::new(StubClient::default())).unwrap());
    let registry = ProviderRegistry::new(vec![provider]).unwrap();
    let coordinator = Coordinator::new(store.clone(), registry, default_hooks());

    let winner = coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f1"))
        .await
        .unwrap();

    // The next lookup misses, so this call attempts its own insert, hits
    // the dedup conflict, re-reads, and resumes the winner's session.
    store.miss_next_find.store(true, Ordering::SeqCst);
    let loser = coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f1"))
        .await
        .unwrap();

    assert_eq!(loser.upload_id, winner.upload_id);
    assert_eq!(store.inner.len(), 1);
}

#[tokio::test]
async fn filenames_are_sanitized_before_dedup() {
    let fx = fixture();
    let resp = fx
        .coordinator
        .create_or_resume(&ctx(), upload("my file!.bin", 1000, "f1"))
        .await
        .unwrap();
    let session = fx.store.find_by_id(&resp.upload_id, "r-1").await.unwrap().unwrap();
    assert_eq!(session.file_name, "my_file_.bin");
}

// ── request_part / advance_resumable ────────────────────────────────

#[tokio::test]
async fn direct_session_rejects_part_requests() {
    let fx = fixture();
    let created = fx
        .coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f1"))
        .await
        .unwrap();

    let err = fx
        .coordinator
        .request_part(&ctx(), &created.upload_id, "1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::InvalidState { .. }));
}

#[tokio::test]
async fn resumable_session_without_id_rejects_part_requests() {
    let fx = fixture();
    let created = fx
        .coordinator
        .create_or_resume(&ctx(), upload("big.bin", TEN_MIB, "f1"))
        .await
        .unwrap();

    let err = fx
        .coordinator
        .request_part(&ctx(), &created.upload_id, "1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::InvalidState { .. }));

    // advance_resumable supplies the id, after which parts flow.
    fx.coordinator
        .advance_resumable(&ctx(), &created.upload_id, "mp-1", "1", None)
        .await
        .unwrap();
    let part = fx
        .coordinator
        .request_part(&ctx(), &created.upload_id, "2", None)
        .await
        .unwrap();
    assert_eq!(part.kind, RequestKind::PartUpload);
    assert_eq!(part.signature.verb, "POST");
    assert!(part.signature.url.contains("partNumber=2&"));
}

#[tokio::test]
async fn advance_resumable_keeps_first_allocated_id() {
    let fx = fixture();
    let created = fx
        .coordinator
        .create_or_resume(&ctx(), upload("big.bin", TEN_MIB, "f1"))
        .await
        .unwrap();

    fx.coordinator
        .advance_resumable(&ctx(), &created.upload_id, "mp-first", "1", None)
        .await
        .unwrap();
    // A second allocation attempt is ignored; the first id sticks.
    let resp = fx
        .coordinator
        .advance_resumable(&ctx(), &created.upload_id, "mp-second", "2", None)
        .await
        .unwrap();
    assert!(resp.signature.url.contains("uploadId=mp-first&"));

    let session = fx.store.find_by_id(&created.upload_id, "r-1").await.unwrap().unwrap();
    assert_eq!(session.resumable_id.as_deref(), Some("mp-first"));
}

#[tokio::test]
async fn advance_resumable_rejects_direct_sessions() {
    let fx = fixture();
    let created = fx
        .coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f1"))
        .await
        .unwrap();

    let err = fx
        .coordinator
        .advance_resumable(&ctx(), &created.upload_id, "mp-1", "1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::InvalidState { .. }));
}

#[tokio::test]
async fn finish_sentinel_yields_commit_signature() {
    let fx = fixture();
    let created = fx
        .coordinator
        .create_or_resume(&ctx(), upload("big.bin", TEN_MIB, "f1"))
        .await
        .unwrap();
    fx.coordinator
        .advance_resumable(&ctx(), &created.upload_id, "mp-1", "1", None)
        .await
        .unwrap();

    let finish = fx
        .coordinator
        .request_part(&ctx(), &created.upload_id, "finish", None)
        .await
        .unwrap();
    assert_eq!(finish.kind, RequestKind::Finish);
    assert_eq!(finish.signature.verb, "PUT");
}

#[tokio::test]
async fn foreign_sessions_are_not_found() {
    let fx = fixture();
    let created = fx
        .coordinator
        .create_or_resume(&ctx(), upload("big.bin", TEN_MIB, "f1"))
        .await
        .unwrap();

    let stranger = RequestContext::for_resident("r-2");
    let err = fx
        .coordinator
        .request_part(&stranger, &created.upload_id, "1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::SessionNotFound));
}

// ── finalize ────────────────────────────────────────────────────────

#[tokio::test]
async fn finalize_deletes_the_session_once() {
    let fx = fixture();
    let created = fx
        .coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f1"))
        .await
        .unwrap();

    fx.coordinator.finalize(&ctx(), &created.upload_id).await.unwrap();
    assert!(fx.store.is_empty());

    // Idempotent: the second call finds nothing and does not re-invoke
    // the completion hook.
    let err = fx
        .coordinator
        .finalize(&ctx(), &created.upload_id)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::SessionNotFound));
}

#[tokio::test]
async fn finalize_rejection_keeps_the_session() {
    let hooks = Hooks::builder()
        .bucket_name(|_| "media".to_string())
        .upload_complete(|_| false)
        .build()
        .unwrap();
    let fx = fixture_with(StubClient::default(), hooks);

    let created = fx
        .coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f1"))
        .await
        .unwrap();
    let err = fx
        .coordinator
        .finalize(&ctx(), &created.upload_id)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::ValidationRejected));
    assert_eq!(fx.store.len(), 1);
}

// ── destroy ─────────────────────────────────────────────────────────

#[tokio::test]
async fn destroy_deletes_record_after_provider_success() {
    let fx = fixture_with(
        StubClient {
            object_exists: true,
            ..Default::default()
        },
        default_hooks(),
    );
    let created = fx
        .coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f1"))
        .await
        .unwrap();

    fx.coordinator.destroy(&ctx(), &created.upload_id).await.unwrap();
    assert!(fx.store.is_empty());
}

#[tokio::test]
async fn destroy_keeps_record_on_provider_failure() {
    let fx = fixture_with(
        StubClient {
            object_exists: true,
            delete_fails: true,
            ..Default::default()
        },
        default_hooks(),
    );
    let created = fx
        .coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f1"))
        .await
        .unwrap();

    let err = fx
        .coordinator
        .destroy(&ctx(), &created.upload_id)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Provider(_)));
    // The record survives so the caller can retry.
    assert_eq!(fx.store.len(), 1);
}

#[tokio::test]
async fn destroy_hook_rejection_touches_nothing() {
    let hooks = Hooks::builder()
        .bucket_name(|_| "media".to_string())
        .destroy_upload(|_| false)
        .build()
        .unwrap();
    let client = StubClient {
        object_exists: true,
        ..Default::default()
    };
    let fx = fixture_with(client, hooks);

    let created = fx
        .coordinator
        .create_or_resume(&ctx(), upload("a.bin", 1000, "f1"))
        .await
        .unwrap();
    let err = fx
        .coordinator
        .destroy(&ctx(), &created.upload_id)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::ValidationRejected));
    assert_eq!(fx.store.len(), 1);
}
