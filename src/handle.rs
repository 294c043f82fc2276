//! # Storage Handles
//!
//! The handle type returned to callers, the backend client boundary, and the
//! factory that builds handles from a URI, backend configuration and an
//! optional credential.
//!
//! Construction is the only expensive operation in this crate; everything
//! here is reachable solely through the cache's miss path.

use crate::credential::Credential;
use crate::environment;
use crate::error::CacheError;
use crate::staging::StagedCredential;
use crate::storage::StorageScheme;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// An opened backend client, bound to one storage backend instance
///
/// Implementations must tolerate concurrent use: the cache serializes handle
/// construction and eviction, never handle usage.
#[async_trait]
pub trait BackendClient: Send + Sync {
    fn scheme(&self) -> StorageScheme;

    /// The base location this client is bound to
    fn location(&self) -> &str;

    /// Release backend resources; called on eviction and shutdown
    async fn close(&self) -> anyhow::Result<()>;
}

/// Connection request handed to the distributed-FS connector
#[derive(Debug)]
pub struct ConnectRequest {
    pub uri: String,
    /// Backend-native configuration: environment settings overlaid with the
    /// request's bypass properties
    pub config: HashMap<String, String>,
    /// Path to the staged credential artifact, valid only for the duration of
    /// the connect call
    pub credential_path: Option<PathBuf>,
}

/// External boundary to the concrete distributed-FS client implementations
#[async_trait]
pub trait DfsConnector: Send + Sync {
    async fn connect(&self, request: ConnectRequest) -> anyhow::Result<Arc<dyn BackendClient>>;
}

/// Backend client for `file:/` locations
///
/// Needs no external runtime, so it lives in-crate; construction is
/// side-effect free, matching the other backends' contract that a handle is
/// merely an open client, not a directory mutation.
#[derive(Debug)]
pub struct LocalBackendClient {
    location: String,
}

impl LocalBackendClient {
    pub fn open(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

#[async_trait]
impl BackendClient for LocalBackendClient {
    fn scheme(&self) -> StorageScheme {
        StorageScheme::Local
    }

    fn location(&self) -> &str {
        &self.location
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A cached, shareable handle to one storage backend instance
///
/// Cloning is cheap; every caller of the cache receives a clone backed by the
/// same client. The backend client stays alive for as long as any clone does,
/// so eviction never invalidates a handle a caller is still using.
#[derive(Clone)]
pub struct StorageHandle {
    id: Uuid,
    client: Arc<dyn BackendClient>,
    credential: Option<Credential>,
}

impl StorageHandle {
    fn new(client: Arc<dyn BackendClient>, credential: Option<Credential>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client,
            credential,
        }
    }

    /// Identity of the underlying handle; clones share it
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn client(&self) -> &Arc<dyn BackendClient> {
        &self.client
    }

    pub fn scheme(&self) -> StorageScheme {
        self.client.scheme()
    }

    /// The credential the handle was built from, if any
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
}

impl std::fmt::Debug for StorageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageHandle")
            .field("id", &self.id)
            .field("scheme", &self.client.scheme())
            .field("location", &self.client.location())
            .finish_non_exhaustive()
    }
}

/// Pure handle construction: scheme dispatch, credential staging, connector
/// invocation
pub struct HandleFactory {
    connector: Option<Arc<dyn DfsConnector>>,
}

impl std::fmt::Debug for HandleFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleFactory")
            .field("has_connector", &self.connector.is_some())
            .finish()
    }
}

impl HandleFactory {
    pub fn new(connector: Option<Arc<dyn DfsConnector>>) -> Self {
        Self { connector }
    }

    /// Build a handle for `uri`
    ///
    /// When a credential is present for a distributed scheme, its material is
    /// staged to disk for the connector and removed again before the handle
    /// escapes this function, on success and failure alike.
    pub async fn build(
        &self,
        uri: &str,
        bypass_config: HashMap<String, String>,
        credential: Option<Credential>,
    ) -> Result<StorageHandle, CacheError> {
        let scheme = StorageScheme::recognize(uri)?;

        let client: Arc<dyn BackendClient> = match scheme {
            StorageScheme::Local => Arc::new(LocalBackendClient::open(uri)),
            StorageScheme::Hdfs | StorageScheme::JuiceFs => {
                let connector =
                    self.connector
                        .as_ref()
                        .ok_or_else(|| CacheError::HandleConstructionFailed {
                            uri: uri.to_string(),
                            cause: anyhow::anyhow!(
                                "no connector configured for scheme '{scheme}'"
                            ),
                        })?;

                let staged = credential
                    .as_ref()
                    .map(StagedCredential::stage)
                    .transpose()
                    .map_err(|cause| CacheError::HandleConstructionFailed {
                        uri: uri.to_string(),
                        cause,
                    })?;

                let mut config = environment::ensure_initialized().settings().clone();
                config.extend(bypass_config);

                let request = ConnectRequest {
                    uri: uri.to_string(),
                    config,
                    credential_path: staged.as_ref().map(|s| s.path().to_path_buf()),
                };
                let client = connector.connect(request).await.map_err(|cause| {
                    CacheError::HandleConstructionFailed {
                        uri: uri.to_string(),
                        cause,
                    }
                })?;
                // the staged artifact is only needed during connect
                drop(staged);
                client
            }
        };

        let handle = StorageHandle::new(client, credential);
        debug!(handle = %handle.id(), scheme = %scheme, uri, "constructed storage handle");
        Ok(handle)
    }
}
