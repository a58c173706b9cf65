//! Error taxonomy for the upload lifecycle.
//!
//! Every coordinator operation yields either a structured success value
//! or one of these variants; nothing escapes the coordinator boundary
//! unclassified. The transport layer owns the mapping to status codes.

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors surfaced by the coordinator and provider adapters.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Fatal misconfiguration detected at construction time, e.g. missing
    /// provider credentials or an unknown provider name on a session.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The resident-identity hook could not resolve a caller identity.
    #[error("a resident identity is required for all upload operations")]
    IdentityRequired,

    /// Lookup by session id failed, or the session belongs to another
    /// resident. Also reported for re-entry after completion/destruction.
    #[error("upload session not found")]
    SessionNotFound,

    /// The pre-validation hook rejected the request with per-field detail.
    #[error("upload request failed validation")]
    ValidationFailed { fields: BTreeMap<String, String> },

    /// The request was rejected without structured detail (opaque
    /// pre-validation failure, or a completion/deletion hook saying no).
    #[error("upload request rejected")]
    ValidationRejected,

    /// The operation is not permitted in the session's current state,
    /// e.g. requesting a part signature on a non-resumable session.
    #[error("invalid session state: {message}")]
    InvalidState { message: String },

    /// A networked provider call failed. Signing itself never takes this
    /// path; only `destroy` talks to the provider, and it reports failure
    /// here after its best-effort reconciliation has been exhausted.
    #[error("provider failure: {0}")]
    Provider(#[from] anyhow::Error),
}

impl UploadError {
    /// Helper for construction-time configuration failures.
    pub fn configuration(message: impl Into<String>) -> Self {
        UploadError::Configuration {
            message: message.into(),
        }
    }

    /// Helper for state-machine violations.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        UploadError::InvalidState {
            message: message.into(),
        }
    }
}
