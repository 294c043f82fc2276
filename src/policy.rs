//! # Cache Eviction Policies
//!
//! Three interchangeable expiry strategies, selected once at manager
//! construction and fixed for the manager's lifetime. Capacity enforcement is
//! the cache's job; policies decide when an entry stops being servable and
//! how evicted handles are released.

use crate::config::{AuthMode, CacheConfig};
use crate::error::CacheError;
use crate::handle::StorageHandle;
use crate::storage::CacheKey;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// When an entry stops being servable; `never()` marks a permanent entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryMarker(Option<Instant>);

impl ExpiryMarker {
    pub fn never() -> Self {
        Self(None)
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        match self.0 {
            None => false,
            Some(at) => now >= at,
        }
    }
}

/// Pluggable expiry strategy
pub trait CachePolicy: Send + Sync {
    /// Compute the entry's expiry marker at insertion time
    ///
    /// A failure here aborts the insert; the cache stays unchanged and the
    /// error surfaces to the caller that triggered construction.
    fn on_insert(&self, key: &CacheKey, handle: &StorageHandle) -> Result<ExpiryMarker, CacheError>;

    /// Whether the entry must be treated as absent
    fn is_expired(&self, _key: &CacheKey, marker: ExpiryMarker, now: Instant) -> bool {
        marker.is_expired(now)
    }

    /// Release the backend resources of an evicted handle
    ///
    /// Runs off the caller's path; failures are logged, never propagated, so
    /// a misbehaving backend cannot block unrelated cache operations.
    fn on_evict(&self, key: &CacheKey, handle: &StorageHandle) {
        close_in_background(key, handle);
    }
}

fn close_in_background(key: &CacheKey, handle: &StorageHandle) {
    let key = key.clone();
    let client = std::sync::Arc::clone(handle.client());
    let handle_id = handle.id();
    tokio::spawn(async move {
        match client.close().await {
            Ok(()) => debug!(key = %key, handle = %handle_id, "closed evicted backend client"),
            Err(e) => warn!(key = %key, handle = %handle_id, error = %e, "failed to close evicted backend client"),
        }
    });
}

/// Capacity-only policy: no time-based expiry
#[derive(Debug)]
pub struct BoundedLru;

impl CachePolicy for BoundedLru {
    fn on_insert(
        &self,
        _key: &CacheKey,
        _handle: &StorageHandle,
    ) -> Result<ExpiryMarker, CacheError> {
        Ok(ExpiryMarker::never())
    }
}

/// Fixed time-to-live per entry, counted from insertion
#[derive(Debug)]
pub struct FixedTtl {
    ttl: Duration,
}

impl FixedTtl {
    /// Immediate expiry is disallowed, not silently coerced
    pub fn new(ttl: Duration) -> Result<Self, CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "cache TTL must not be zero".to_string(),
            ));
        }
        Ok(Self { ttl })
    }
}

impl CachePolicy for FixedTtl {
    fn on_insert(
        &self,
        _key: &CacheKey,
        _handle: &StorageHandle,
    ) -> Result<ExpiryMarker, CacheError> {
        Ok(ExpiryMarker::at(Instant::now() + self.ttl))
    }
}

/// Time-to-use driven by the credential's own expiry
///
/// The marker is the credential expiry minus a safety margin. A credential
/// that never expires yields a permanent entry; one whose remaining lifetime
/// is already inside the margin yields an immediately stale entry that is
/// rebuilt on next access rather than served.
#[derive(Debug)]
pub struct CredentialTtu {
    margin: Duration,
}

impl CredentialTtu {
    pub fn new(margin: Duration) -> Self {
        Self { margin }
    }
}

impl CachePolicy for CredentialTtu {
    fn on_insert(&self, key: &CacheKey, handle: &StorageHandle) -> Result<ExpiryMarker, CacheError> {
        let credential =
            handle
                .credential()
                .ok_or_else(|| CacheError::InvalidCredentialMetadata {
                    name: key.to_string(),
                    reason: "handle was built without a credential".to_string(),
                })?;
        let expire_ms = credential.expire_time_ms()?;
        if expire_ms <= 0 {
            return Ok(ExpiryMarker::never());
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        let margin_ms = i64::try_from(self.margin.as_millis()).unwrap_or(i64::MAX);
        let remaining_ms = expire_ms - margin_ms - now_ms;
        if remaining_ms <= 0 {
            debug!(
                key = %key,
                credential = credential.name(),
                "credential lifetime inside safety margin, entry is immediately stale"
            );
            return Ok(ExpiryMarker::at(Instant::now()));
        }
        Ok(ExpiryMarker::at(
            Instant::now() + Duration::from_millis(remaining_ms as u64),
        ))
    }
}

/// Select the policy the manager will use for its whole lifetime
pub fn select_policy(config: &CacheConfig) -> Result<Box<dyn CachePolicy>, CacheError> {
    config.validate()?;
    match config.auth_mode {
        AuthMode::Credential => Ok(Box::new(CredentialTtu::new(Duration::from_secs(
            config.ttu_margin_secs,
        )))),
        AuthMode::Simple => {
            if config.cache_ttl_secs < 0 {
                Ok(Box::new(BoundedLru))
            } else {
                let ttl = Duration::from_secs(config.cache_ttl_secs.unsigned_abs());
                Ok(Box::new(FixedTtl::new(ttl)?))
            }
        }
    }
}
