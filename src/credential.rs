//! # Credentials
//!
//! The opaque credential handed out by the external credential provider, and
//! the provider trait itself.
//!
//! A credential is immutable once returned. The cache keeps it only inside
//! the entry built from it and wipes the secret material when the credential
//! is dropped.

use crate::constants::CREDENTIAL_EXPIRE_TIME_PROP;
use crate::error::CacheError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use zeroize::Zeroize;

/// An opaque, named secret with a type tag, a property map and an expiry
/// instant
///
/// The `value` is the transported secret material (base64-encoded); the type
/// tag determines how it is interpreted. Arrives from the catalog REST client
/// as a DTO.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    name: String,
    #[serde(rename = "type")]
    credential_type: String,
    #[serde(default)]
    properties: HashMap<String, String>,
    value: String,
}

impl Credential {
    pub fn new(
        name: impl Into<String>,
        credential_type: impl Into<String>,
        properties: HashMap<String, String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            credential_type: credential_type.into(),
            properties,
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn credential_type(&self) -> &str {
        &self.credential_type
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// The base64-encoded secret material
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Parse the expiry timestamp (milliseconds since epoch) from the
    /// credential properties
    ///
    /// A value of zero or less means the credential never expires. Missing or
    /// non-numeric metadata is a data contract violation upstream and fails
    /// with [`CacheError::InvalidCredentialMetadata`].
    pub fn expire_time_ms(&self) -> Result<i64, CacheError> {
        let raw = self.properties.get(CREDENTIAL_EXPIRE_TIME_PROP).ok_or_else(|| {
            CacheError::InvalidCredentialMetadata {
                name: self.name.clone(),
                reason: format!("missing '{CREDENTIAL_EXPIRE_TIME_PROP}' property"),
            }
        })?;
        raw.parse::<i64>()
            .map_err(|_| CacheError::InvalidCredentialMetadata {
                name: self.name.clone(),
                reason: format!("expiry time '{raw}' is not a number"),
            })
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("credential_type", &self.credential_type)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

/// External credential provider boundary
///
/// Implemented over the catalog REST client in production; the transport
/// behind it is not this crate's concern. Failures cross the boundary as
/// `anyhow::Error` and are wrapped into
/// [`CacheError::CredentialFetchFailed`] by the cache.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch_credential(&self, credential_type: &str) -> anyhow::Result<Credential>;
}
