//! # Error Types
//!
//! Typed failure taxonomy for the handle cache, with classification of
//! retriable vs non-retriable failures.

use thiserror::Error;

/// Errors surfaced by [`get_or_create`](crate::cache::FileSystemHandleCache::get_or_create)
/// and by manager construction.
///
/// A failed construction never poisons the cache: the key stays absent and a
/// later call may retry from scratch.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The URI does not start with any recognized storage scheme prefix
    /// (non-retriable - the caller must fix its input)
    #[error("unsupported storage type for uri: {uri}")]
    UnsupportedStorageType { uri: String },

    /// A scheme requiring an auxiliary backend coordinate was used without
    /// that coordinate in the merged configuration (non-retriable)
    #[error("backend coordinate '{key}' is not set for uri: {uri}")]
    MissingBackendCoordinate { uri: String, key: String },

    /// The external credential provider failed (retriable - the provider may
    /// recover)
    #[error("failed to fetch credential of type '{credential_type}': {cause}")]
    CredentialFetchFailed {
        credential_type: String,
        cause: anyhow::Error,
    },

    /// Backend client initialization failed; wraps the underlying cause
    #[error("failed to construct storage handle for uri {uri}: {cause}")]
    HandleConstructionFailed { uri: String, cause: anyhow::Error },

    /// The credential's expiry metadata is missing or malformed
    /// (non-retriable - signals a data contract violation upstream)
    #[error("invalid credential metadata for '{name}': {reason}")]
    InvalidCredentialMetadata { name: String, reason: String },

    /// The manager options are invalid; raised at construction time, before
    /// any request is served
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    /// Determine if the caller may reasonably retry the failed call
    ///
    /// Construction failures are classified as retriable because the dominant
    /// causes (backend momentarily unreachable, credential race) are
    /// transient; the wrapped cause carries the detail.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            CacheError::CredentialFetchFailed { .. } | CacheError::HandleConstructionFailed { .. }
        )
    }

    /// Stable label for log fields and metrics-style aggregation
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheError::UnsupportedStorageType { .. } => "unsupported_storage_type",
            CacheError::MissingBackendCoordinate { .. } => "missing_backend_coordinate",
            CacheError::CredentialFetchFailed { .. } => "credential_fetch_failed",
            CacheError::HandleConstructionFailed { .. } => "handle_construction_failed",
            CacheError::InvalidCredentialMetadata { .. } => "invalid_credential_metadata",
            CacheError::InvalidConfig(_) => "invalid_config",
        }
    }
}
