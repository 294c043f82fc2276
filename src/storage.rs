//! # Storage Locations
//!
//! Scheme recognition, configuration merging and cache key derivation.
//!
//! Key derivation is pure: it never touches the network or filesystem and is
//! callable without holding any cache lock. The same function keys both
//! lookups and insertions.

use crate::constants::{BYPASS_PREFIX, JFS_MASTER_KEY};
use crate::error::CacheError;
use std::collections::HashMap;

/// The fixed, ordered set of storage schemes the cache recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScheme {
    Hdfs,
    JuiceFs,
    Local,
}

impl StorageScheme {
    /// Recognition order; first prefix match wins
    pub const ALL: [StorageScheme; 3] =
        [StorageScheme::Hdfs, StorageScheme::JuiceFs, StorageScheme::Local];

    /// URI prefix identifying this scheme
    pub fn prefix(&self) -> &'static str {
        match self {
            StorageScheme::Hdfs => "hdfs://",
            StorageScheme::JuiceFs => "jfs://",
            StorageScheme::Local => "file:/",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageScheme::Hdfs => "hdfs",
            StorageScheme::JuiceFs => "jfs",
            StorageScheme::Local => "file",
        }
    }

    /// Whether one handle serves any sub-path under the same base location
    ///
    /// JuiceFS handles are bound to a cluster master that is not derivable
    /// from the URI, so the location alone does not identify them.
    pub fn is_location_fungible(&self) -> bool {
        matches!(self, StorageScheme::Hdfs | StorageScheme::Local)
    }

    /// Recognize the storage scheme from a URI prefix
    pub fn recognize(uri: &str) -> Result<Self, CacheError> {
        Self::ALL
            .iter()
            .copied()
            .find(|scheme| uri.starts_with(scheme.prefix()))
            .ok_or_else(|| CacheError::UnsupportedStorageType {
                uri: uri.to_string(),
            })
    }
}

impl std::fmt::Display for StorageScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key identifying one cached storage handle
///
/// Two requests deriving the same key are served by the same handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Merge catalog- and fileset-level configuration; fileset values win on
/// conflicting keys
pub fn merge_properties(
    catalog_properties: &HashMap<String, String>,
    fileset_properties: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = catalog_properties.clone();
    merged.extend(
        fileset_properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    merged
}

/// Extract the backend-native configuration: keys carrying the bypass prefix,
/// with the prefix stripped, passed through unmodified
pub fn bypass_properties(merged: &HashMap<String, String>) -> HashMap<String, String> {
    merged
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix(BYPASS_PREFIX)
                .map(|stripped| (stripped.to_string(), v.clone()))
        })
        .collect()
}

/// The base storage location: the URI with the operation-specific sub-path
/// suffix stripped
fn base_location<'a>(uri: &'a str, sub_path: &str) -> &'a str {
    if sub_path.is_empty() {
        return uri;
    }
    uri.strip_suffix(sub_path).unwrap_or(uri)
}

/// Derive the cache key for a storage URI
///
/// For location-fungible schemes the key is the base location. JuiceFS
/// additionally needs the cluster master coordinate from the merged
/// configuration; the key is `base-location#master`.
pub fn derive_cache_key(
    uri: &str,
    sub_path: &str,
    merged_properties: &HashMap<String, String>,
) -> Result<CacheKey, CacheError> {
    let scheme = StorageScheme::recognize(uri)?;
    let base = base_location(uri, sub_path);

    if scheme.is_location_fungible() {
        return Ok(CacheKey(base.to_string()));
    }

    let master_key = format!("{BYPASS_PREFIX}{JFS_MASTER_KEY}");
    let master = merged_properties
        .get(&master_key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CacheError::MissingBackendCoordinate {
            uri: uri.to_string(),
            key: master_key.clone(),
        })?;
    Ok(CacheKey(format!("{base}#{master}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_recognize_known_schemes() {
        assert_eq!(
            StorageScheme::recognize("hdfs://cluster/user/data").unwrap(),
            StorageScheme::Hdfs
        );
        assert_eq!(
            StorageScheme::recognize("jfs://volume/data").unwrap(),
            StorageScheme::JuiceFs
        );
        assert_eq!(
            StorageScheme::recognize("file:///tmp/data").unwrap(),
            StorageScheme::Local
        );
    }

    #[test]
    fn test_unrecognized_scheme_fails() {
        let err = StorageScheme::recognize("s3://bucket/key").unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedStorageType { .. }));
    }

    #[test]
    fn test_key_is_sub_path_invariant_for_fungible_schemes() {
        let uri_a = "hdfs://cluster/fileset/sales/2024/01";
        let uri_b = "hdfs://cluster/fileset/sales/archive";
        let key_a = derive_cache_key(uri_a, "/2024/01", &HashMap::new()).unwrap();
        let key_b = derive_cache_key(uri_b, "/archive", &HashMap::new()).unwrap();
        assert_eq!(key_a, key_b);
        assert_eq!(key_a.as_str(), "hdfs://cluster/fileset/sales");
    }

    #[test]
    fn test_jfs_key_carries_master_coordinate() {
        let merged = props(&[("fileset.bypass.jfs.master", "meta-1:9000")]);
        let key = derive_cache_key("jfs://volume/data/part-0", "/part-0", &merged).unwrap();
        assert_eq!(key.as_str(), "jfs://volume/data#meta-1:9000");
    }

    #[test]
    fn test_jfs_missing_master_fails() {
        let err = derive_cache_key("jfs://volume/data", "", &HashMap::new()).unwrap_err();
        assert!(matches!(err, CacheError::MissingBackendCoordinate { .. }));
    }

    #[test]
    fn test_jfs_empty_master_fails() {
        let merged = props(&[("fileset.bypass.jfs.master", "")]);
        let err = derive_cache_key("jfs://volume/data", "", &merged).unwrap_err();
        assert!(matches!(err, CacheError::MissingBackendCoordinate { .. }));
    }

    #[test]
    fn test_merge_fileset_wins_on_conflict() {
        let catalog = props(&[("fileset.bypass.replication", "2"), ("owner", "catalog")]);
        let fileset = props(&[("fileset.bypass.replication", "3")]);
        let merged = merge_properties(&catalog, &fileset);
        assert_eq!(merged.get("fileset.bypass.replication").unwrap(), "3");
        assert_eq!(merged.get("owner").unwrap(), "catalog");
    }

    #[test]
    fn test_bypass_extraction_strips_prefix() {
        let merged = props(&[
            ("fileset.bypass.dfs.replication", "3"),
            ("fileset.comment", "not passed through"),
        ]);
        let bypass = bypass_properties(&merged);
        assert_eq!(bypass.len(), 1);
        assert_eq!(bypass.get("dfs.replication").unwrap(), "3");
    }

    #[test]
    fn test_base_location_only_strips_suffix() {
        // a sub-path that does not terminate the uri must not corrupt the key
        assert_eq!(base_location("hdfs://c/a/b", "/b"), "hdfs://c/a");
        assert_eq!(base_location("hdfs://c/a/b", "/x"), "hdfs://c/a/b");
        assert_eq!(base_location("hdfs://c/a/b", ""), "hdfs://c/a/b");
    }
}
