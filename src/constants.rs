//! # Constants
//!
//! Shared defaults and well-known property keys used across the crate.

/// Default maximum number of cached storage handles
pub const DEFAULT_CACHE_SIZE: usize = 20;

/// Default fixed TTL for cached handles (seconds)
///
/// Negative disables time-based expiry entirely, zero is rejected at
/// construction time.
pub const DEFAULT_CACHE_TTL_SECS: i64 = 300;

/// Safety margin subtracted from a credential's expiry when computing a
/// handle's time-to-use (seconds)
pub const DEFAULT_TTU_MARGIN_SECS: u64 = 3600;

/// Credential type this crate knows how to stage to disk
pub const KERBEROS_CREDENTIAL_TYPE: &str = "kerberos";

/// Credential property carrying the expiry timestamp (milliseconds since epoch)
pub const CREDENTIAL_EXPIRE_TIME_PROP: &str = "expireTime";

/// Prefix marking configuration keys that are passed through to the storage
/// backend unmodified (with the prefix stripped)
pub const BYPASS_PREFIX: &str = "fileset.bypass.";

/// Bypass key (relative to [`BYPASS_PREFIX`]) holding the JuiceFS cluster
/// master address
pub const JFS_MASTER_KEY: &str = "jfs.master";

/// Environment variable pointing at the distributed-FS client installation
pub const ENV_DFS_HOME: &str = "DFS_HOME";

/// Environment variable pointing at the distributed-FS client configuration
/// directory
pub const ENV_DFS_CONF_DIR: &str = "DFS_CONF_DIR";

/// Environment variable overriding the cache capacity
pub const ENV_CACHE_SIZE: &str = "FILESET_CACHE_SIZE";

/// Environment variable overriding the fixed cache TTL (seconds)
pub const ENV_CACHE_TTL_SECS: &str = "FILESET_CACHE_TTL_SECS";

/// Environment variable overriding the authentication mode
pub const ENV_AUTH_MODE: &str = "FILESET_AUTH_MODE";
