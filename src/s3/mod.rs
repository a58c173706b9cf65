//! S3-compatible provider adapter.
//!
//! [`adapter::S3Provider`] implements the [`Provider`] contract for an
//! S3-style REST API: strategy selection, the legacy query-string signing
//! algorithm, and the best-effort multipart-abort reconciliation.
//!
//! [`Provider`]: crate::provider::adapter::Provider

pub mod adapter;
pub mod client;
pub mod signer;
