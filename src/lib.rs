//! Skylift — direct-to-cloud upload presigning engine.
//!
//! Lets a browser or device upload files straight to an object store:
//! the application server never proxies file bytes, it only decides
//! whether an upload already exists (dedup/resume), picks the provider
//! and strategy (single-shot vs. chunked), and hands back a signed,
//! time-limited request the client presents to the store directly.
//!
//! The pieces: a [`coordinator::Coordinator`] driving the session
//! lifecycle, a [`provider::adapter::Provider`] contract with a worked
//! S3 implementation in [`s3`], a [`provider::registry::ProviderRegistry`]
//! for multi-provider deployments, and a [`store::store::SessionStore`]
//! trait for session persistence.

pub mod coordinator;
pub mod errors;
pub mod hooks;
pub mod models;
pub mod provider;
pub mod s3;
pub mod store;

pub use coordinator::Coordinator;
pub use errors::UploadError;
pub use hooks::{Hooks, RequestContext, Validation};
pub use models::{
    DedupKey, ObjectOptions, OrderedMap, Permissions, Protocol, ProviderIdentity, RequestKind,
    SignedRequest, UploadRequest, UploadResponse, UploadSession,
};
pub use provider::adapter::Provider;
pub use provider::registry::ProviderRegistry;
pub use s3::adapter::{S3Config, S3Provider};
pub use store::memory::MemorySessionStore;
pub use store::store::SessionStore;
