//! # Cache Configuration
//!
//! Manager-level options loaded from the caller or from environment
//! variables.
//!
//! All settings have sensible defaults and can be overridden via environment
//! variables; validation is explicit and fails fast with typed errors before
//! any request is served.

use crate::constants::{
    DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL_SECS, DEFAULT_TTU_MARGIN_SECS, ENV_AUTH_MODE,
    ENV_CACHE_SIZE, ENV_CACHE_TTL_SECS, KERBEROS_CREDENTIAL_TYPE,
};
use crate::error::CacheError;
use serde::{Deserialize, Serialize};

/// How storage handles are authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Handles are built without a credential
    Simple,
    /// A credential is fetched from the provider for every new handle;
    /// cache expiry follows the credential's own expiry
    Credential,
}

impl std::str::FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(AuthMode::Simple),
            "credential" => Ok(AuthMode::Credential),
            other => Err(format!("unknown auth mode: {other}")),
        }
    }
}

/// Handle cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached handles; must be greater than zero
    pub cache_size: usize,
    /// Fixed TTL per entry in seconds, counted from insertion
    ///
    /// Negative disables time-based expiry (capacity-only LRU), zero is
    /// rejected. Ignored under [`AuthMode::Credential`], where expiry follows
    /// the credential.
    pub cache_ttl_secs: i64,
    /// Authentication mode, fixed for the manager's lifetime
    pub auth_mode: AuthMode,
    /// Credential type requested from the provider under
    /// [`AuthMode::Credential`]
    pub credential_type: String,
    /// Safety margin subtracted from the credential expiry (seconds)
    pub ttu_margin_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            auth_mode: AuthMode::Simple,
            credential_type: KERBEROS_CREDENTIAL_TYPE.to_string(),
            ttu_margin_secs: DEFAULT_TTU_MARGIN_SECS,
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            cache_size: env_var_or_default(ENV_CACHE_SIZE, DEFAULT_CACHE_SIZE),
            cache_ttl_secs: env_var_or_default(ENV_CACHE_TTL_SECS, DEFAULT_CACHE_TTL_SECS),
            auth_mode: env_var_or_default(ENV_AUTH_MODE, AuthMode::Simple),
            ..Self::default()
        }
    }

    /// Validate the options, failing fast on values the cache would otherwise
    /// have to guess about
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.cache_size == 0 {
            return Err(CacheError::InvalidConfig(
                "cache size must be greater than 0".to_string(),
            ));
        }
        if self.auth_mode == AuthMode::Simple && self.cache_ttl_secs == 0 {
            return Err(CacheError::InvalidConfig(
                "cache TTL of 0 would expire entries immediately; use a negative value to disable expiry"
                    .to_string(),
            ));
        }
        if self.auth_mode == AuthMode::Credential && self.credential_type.is_empty() {
            return Err(CacheError::InvalidConfig(
                "credential type must not be empty under credential auth".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
