//! Core data types for the upload lifecycle.
//!
//! The central record is [`UploadSession`], the persisted description of
//! one logical file transfer. Everything the signing path consumes is an
//! [`ObjectOptions`] bag; its header and parameter maps are
//! insertion-ordered because the signing algorithm folds them in the
//! order they were supplied, never sorted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Ordered string map ──────────────────────────────────────────────

/// An insertion-ordered string-to-string map.
///
/// Overwriting an existing key keeps its original position. The signing
/// algorithm iterates entries in insertion order, so a `HashMap` (or a
/// sorted map) would change the bytes that get signed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedMap(Vec<(String, String)>);

impl OrderedMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Look up a value by exact key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or overwrite a value, keeping the key's original position
    /// when it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    /// Insert only when the key is not yet present.
    pub fn set_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if self.get(&key).is_none() {
            self.0.push((key, value.into()));
        }
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OrderedMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

// ── Object options ──────────────────────────────────────────────────

/// Access permission for the stored object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permissions {
    #[default]
    Private,
    Public,
}

/// Scheme used for the signed URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Https,
    Http,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Https => "https",
            Protocol::Http => "http",
        }
    }
}

/// Per-request configuration bag consumed by the signing path.
///
/// Fields left unset are filled with provider defaults at signing time;
/// caller-supplied values are never overwritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectOptions {
    /// Access permission, mapped to a provider ACL header.
    #[serde(default)]
    pub permissions: Permissions,

    /// Absolute expiry of the signed request.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,

    /// Signing timestamp.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,

    /// HTTP method of the signed request.
    #[serde(default)]
    pub verb: Option<String>,

    /// Headers the client must send, folded into the signature.
    #[serde(default)]
    pub headers: OrderedMap,

    /// Query parameters, appended to the signed URL in insertion order.
    #[serde(default)]
    pub parameters: OrderedMap,

    /// URL scheme.
    #[serde(default)]
    pub protocol: Protocol,
}

// ── Signed request ──────────────────────────────────────────────────

/// What kind of operation a signed request authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Single-shot upload of the whole file.
    DirectUpload,
    /// Initiation of a multipart (resumable) upload.
    ChunkedUpload,
    /// Listing of already-uploaded parts.
    Parts,
    /// Upload of one numbered part.
    PartUpload,
    /// Final commit of a multipart upload.
    Finish,
}

/// The verb/url/header triple the client presents to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// Uppercased HTTP method.
    pub verb: String,
    /// Fully signed URL, including the provider credential parameters.
    pub url: String,
    /// The exact header map that was folded into the signature.
    pub headers: OrderedMap,
}

/// A time-limited authorization produced by a provider adapter.
/// Never persisted; its `expires` bound is the only timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedRequest {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub signature: Signature,
}

// ── Provider identity ───────────────────────────────────────────────

/// Name and region of a configured provider adapter. Immutable after
/// construction and carried on every adapter instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub name: String,
    pub location: String,
}

// ── Upload session ──────────────────────────────────────────────────

/// Tuple identifying "the same logical upload" for idempotent resume.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub user_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_id: Option<String>,
}

/// Persisted record of one logical file transfer.
///
/// Created exactly once, deleted exactly once; between those the only
/// permitted mutation is setting `resumable_id` after the provider has
/// allocated a multipart upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    /// Store-assigned opaque identifier.
    pub id: String,
    /// Resident (caller) identity.
    pub user_id: String,
    /// Caller-supplied idempotency token.
    pub file_id: Option<String>,
    pub file_name: String,
    /// Size in bytes.
    pub file_size: u64,
    /// Name of the provider resolved at creation.
    pub provider_name: String,
    /// Region of the provider resolved at creation.
    pub provider_location: String,
    pub bucket_name: String,
    pub object_key: String,
    /// True iff the session was created with the chunked strategy.
    pub resumable: bool,
    /// Provider-allocated multipart upload identifier, present only once
    /// the provider has explicitly allocated one.
    pub resumable_id: Option<String>,
    pub object_options: ObjectOptions,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
}

impl UploadSession {
    /// The dedup key this session is addressed by.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            user_id: self.user_id.clone(),
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            file_id: self.file_id.clone(),
        }
    }
}

// ── Caller-facing shapes ────────────────────────────────────────────

/// Metadata supplied by the caller when initiating or creating an upload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadRequest {
    pub file_name: String,
    pub file_size: u64,
    #[serde(default)]
    pub file_id: Option<String>,
    /// Extra query parameters requested by the client. Application-side
    /// options always take precedence over these.
    #[serde(default)]
    pub parameters: OrderedMap,
}

/// Result returned to the caller for every signing operation.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub upload_id: String,
    /// Name of the provider serving this session.
    pub residence: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub signature: Signature,
}
