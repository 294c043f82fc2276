//! # Filesystem Handle Cache
//!
//! The core of the crate: a bounded mapping from cache key to storage handle,
//! guarded by a reader/writer lock, enforcing at-most-one construction per
//! key under concurrent access and evicting entries per the configured
//! policy.
//!
//! Lock discipline: the entry map's write lock is scoped tightly around
//! check-then-insert and eviction - it is never held across a collaborator
//! call. At-most-one construction per key is enforced by a per-key
//! construction lock acquired before the double-checked re-read, so misses on
//! different keys build concurrently and hits are never stalled by a slow
//! construction.

use crate::config::{AuthMode, CacheConfig};
use crate::credential::{Credential, CredentialProvider};
use crate::environment;
use crate::error::CacheError;
use crate::handle::{DfsConnector, HandleFactory, StorageHandle};
use crate::policy::{self, CachePolicy, ExpiryMarker};
use crate::storage::{self, CacheKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct CacheEntry {
    handle: StorageHandle,
    inserted_at: Instant,
    expiry: ExpiryMarker,
    /// Recency stamp, bumped on every hit without taking the write lock
    last_access: AtomicU64,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub constructions: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    constructions: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            constructions: self.constructions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Bounded cache of authenticated storage handles, keyed by storage location
pub struct FileSystemHandleCache {
    config: CacheConfig,
    policy: Box<dyn CachePolicy>,
    factory: HandleFactory,
    provider: Option<Arc<dyn CredentialProvider>>,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    /// Per-key construction locks; lock the key to prevent concurrent builds
    build_locks: RwLock<HashMap<CacheKey, Arc<Mutex<()>>>>,
    access_clock: AtomicU64,
    stats: CacheStats,
}

impl std::fmt::Debug for FileSystemHandleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemHandleCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FileSystemHandleCache {
    /// Create the manager, failing fast on invalid options
    ///
    /// `connector` may be omitted for local-only use; `provider` is required
    /// under [`AuthMode::Credential`].
    pub fn new(
        config: CacheConfig,
        connector: Option<Arc<dyn DfsConnector>>,
        provider: Option<Arc<dyn CredentialProvider>>,
    ) -> Result<Self, CacheError> {
        let policy = policy::select_policy(&config)?;
        if config.auth_mode == AuthMode::Credential && provider.is_none() {
            return Err(CacheError::InvalidConfig(
                "credential auth mode requires a credential provider".to_string(),
            ));
        }
        environment::ensure_initialized();
        info!(
            cache_size = config.cache_size,
            cache_ttl_secs = config.cache_ttl_secs,
            auth_mode = ?config.auth_mode,
            "filesystem handle cache initialized"
        );
        Ok(Self {
            config,
            policy,
            factory: HandleFactory::new(connector),
            provider,
            entries: RwLock::new(HashMap::new()),
            build_locks: RwLock::new(HashMap::new()),
            access_clock: AtomicU64::new(0),
            stats: CacheStats::default(),
        })
    }

    /// Return the cached handle for the location behind `uri`, constructing
    /// it at most once per key
    ///
    /// `sub_path` is the operation-specific suffix of `uri`; requests that
    /// differ only in the sub-path of a location-fungible scheme share one
    /// handle.
    pub async fn get_or_create(
        &self,
        uri: &str,
        sub_path: &str,
        fileset_properties: &HashMap<String, String>,
        catalog_properties: &HashMap<String, String>,
    ) -> Result<StorageHandle, CacheError> {
        let merged = storage::merge_properties(catalog_properties, fileset_properties);
        let key = storage::derive_cache_key(uri, sub_path, &merged)?;

        if let Some(handle) = self.lookup(&key).await {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(handle);
        }

        // serialize construction per key, not per cache
        let build_lock = {
            let mut locks = self.build_locks.write().await;
            Arc::clone(
                locks
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let _build_guard = build_lock.lock().await;

        // double-check: a winner may have inserted while this task waited
        if let Some(handle) = self.lookup(&key).await {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(handle);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        self.remove_expired(&key).await;

        let credential = match self.config.auth_mode {
            AuthMode::Credential => Some(self.fetch_credential().await?),
            AuthMode::Simple => None,
        };
        let bypass_config = storage::bypass_properties(&merged);
        let handle = self.factory.build(uri, bypass_config, credential).await?;
        self.stats.constructions.fetch_add(1, Ordering::Relaxed);

        self.insert(key, handle.clone()).await?;
        Ok(handle)
    }

    /// Read-locked lookup; an expired entry is treated as absent
    async fn lookup(&self, key: &CacheKey) -> Option<StorageHandle> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if self
            .policy
            .is_expired(key, entry.expiry, Instant::now())
        {
            return None;
        }
        entry.last_access.store(
            self.access_clock.fetch_add(1, Ordering::Relaxed) + 1,
            Ordering::Relaxed,
        );
        Some(entry.handle.clone())
    }

    /// Drop the key's entry if it has expired; part of the lazy expiry
    /// baseline
    async fn remove_expired(&self, key: &CacheKey) {
        let mut entries = self.entries.write().await;
        let expired = entries
            .get(key)
            .is_some_and(|entry| self.policy.is_expired(key, entry.expiry, Instant::now()));
        if expired {
            if let Some(entry) = entries.remove(key) {
                debug!(key = %key, handle = %entry.handle.id(), "removed expired handle");
                self.policy.on_evict(key, &entry.handle);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Write-locked check-then-insert plus capacity eviction
    ///
    /// A policy failure aborts before the map is touched, leaving the cache
    /// unchanged.
    async fn insert(&self, key: CacheKey, handle: StorageHandle) -> Result<(), CacheError> {
        let expiry = self.policy.on_insert(&key, &handle)?;

        let mut entries = self.entries.write().await;
        if let Some(previous) = entries.remove(&key) {
            // replacement: the old handle is released like any eviction
            self.policy.on_evict(&key, &previous.handle);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        entries.insert(
            key.clone(),
            CacheEntry {
                handle,
                inserted_at: Instant::now(),
                expiry,
                last_access: AtomicU64::new(self.access_clock.fetch_add(1, Ordering::Relaxed) + 1),
            },
        );

        while entries.len() > self.config.cache_size {
            let lru_key = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access.load(Ordering::Relaxed))
                .map(|(candidate, _)| candidate.clone());
            let Some(lru_key) = lru_key else { break };
            if let Some(evicted) = entries.remove(&lru_key) {
                debug!(
                    key = %lru_key,
                    handle = %evicted.handle.id(),
                    age_secs = evicted.inserted_at.elapsed().as_secs(),
                    "evicted least-recently-used handle"
                );
                self.policy.on_evict(&lru_key, &evicted.handle);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    async fn fetch_credential(&self) -> Result<Credential, CacheError> {
        let Some(provider) = &self.provider else {
            return Err(CacheError::InvalidConfig(
                "credential auth mode requires a credential provider".to_string(),
            ));
        };
        provider
            .fetch_credential(&self.config.credential_type)
            .await
            .map_err(|cause| CacheError::CredentialFetchFailed {
                credential_type: self.config.credential_type.clone(),
                cause,
            })
    }

    /// Eagerly remove every expired entry
    ///
    /// Correctness never depends on this running; lookups already treat
    /// expired entries as absent.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let expired_keys: Vec<CacheKey> = entries
            .iter()
            .filter(|(key, entry)| self.policy.is_expired(key, entry.expiry, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired_keys {
            if let Some(entry) = entries.remove(key) {
                self.policy.on_evict(key, &entry.handle);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        expired_keys.len()
    }

    /// Run [`sweep_expired`](Self::sweep_expired) on a low-frequency
    /// interval until the returned handle is aborted
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = cache.sweep_expired().await;
                if removed > 0 {
                    debug!(removed, "sweeper removed expired handles");
                }
            }
        })
    }

    /// Close every cached handle and clear the map
    ///
    /// Close failures are logged, not propagated. Callers still holding
    /// handle clones keep their backend clients alive.
    pub async fn shutdown(&self) {
        let drained: Vec<(CacheKey, CacheEntry)> = {
            let mut entries = self.entries.write().await;
            entries.drain().collect()
        };
        info!(handles = drained.len(), "shutting down handle cache");
        let closes = drained.into_iter().map(|(key, entry)| async move {
            if let Err(e) = entry.handle.client().close().await {
                warn!(key = %key, error = %e, "failed to close backend client during shutdown");
            }
        });
        futures::future::join_all(closes).await;
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}
