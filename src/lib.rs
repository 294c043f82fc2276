//! # fileset-fs-cache
//!
//! Client-side cache mapping a logical storage location to a lazily
//! constructed, authenticated handle to a storage backend.
//!
//! A caller asks for a handle for a URI; the cache derives a pure key from
//! the scheme and base location, serves hits under a shared lock, and builds
//! misses at most once per key - fetching a credential from the external
//! provider first when the manager runs in credential auth mode. Entries
//! expire per the configured policy: capacity-only LRU, fixed TTL, or
//! time-to-use driven by the credential's own expiry.

pub mod cache;
pub mod config;
pub mod constants;
pub mod credential;
pub mod environment;
pub mod error;
pub mod handle;
pub mod policy;
pub mod staging;
pub mod storage;

// Re-export the caller-facing surface for convenience
pub use cache::{CacheStatsSnapshot, FileSystemHandleCache};
pub use config::{AuthMode, CacheConfig};
pub use credential::{Credential, CredentialProvider};
pub use error::CacheError;
pub use handle::{BackendClient, ConnectRequest, DfsConnector, HandleFactory, StorageHandle};
pub use policy::{BoundedLru, CachePolicy, CredentialTtu, ExpiryMarker, FixedTtl};
pub use storage::{derive_cache_key, CacheKey, StorageScheme};
