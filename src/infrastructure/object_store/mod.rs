// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Object Stores
//!
//! Publish targets for artifacts and manifests: S3 (or an S3-compatible
//! endpoint) and a plain local directory.

pub mod local;
pub mod s3;

use crate::config::{StorageBackend, StorageConfig};
use crate::domain::errors::{PublishError, RelayError, Result};
use crate::ports::object_store_port::ObjectStore;
use local::LocalObjectStore;
use s3::S3ObjectStore;
use std::sync::Arc;

pub async fn build_object_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match &config.backend {
        StorageBackend::S3 {
            bucket,
            region,
            endpoint,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            if bucket.trim().is_empty() {
                return Err(RelayError::ConfigError("storage bucket is empty".to_string()));
            }
            Arc::new(
                S3ObjectStore::new(s3::S3Settings {
                    bucket: bucket.clone(),
                    region: region.clone(),
                    endpoint: endpoint.clone(),
                    access_key_id: access_key_id.clone(),
                    secret_access_key: secret_access_key.clone(),
                    force_path_style: *force_path_style,
                })
                .await,
            )
        }
        StorageBackend::Local { root } => Arc::new(LocalObjectStore::new(root.clone())),
    };
    log::info!("Publishing to {}", store.describe());
    Ok(store)
}

/// Joins key parts with `/`, dropping empty parts and redundant slashes.
pub fn object_key(prefix: &str, parts: &[&str]) -> String {
    std::iter::once(prefix)
        .chain(parts.iter().copied())
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn validate_key(key: &str) -> std::result::Result<(), PublishError> {
    let invalid = |reason: &str| PublishError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.trim().is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.starts_with('/') {
        return Err(invalid("key must not start with '/'"));
    }
    if key.contains('\\') {
        return Err(invalid("key must not contain '\\'"));
    }
    if key.split('/').any(|seg| seg == "..") {
        return Err(invalid("key must not contain '..' segments"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_layout() {
        assert_eq!(object_key("", &["daily", "x.csv"]), "daily/x.csv");
        assert_eq!(
            object_key("/reports/", &["manifests", "daily", "manifest.json"]),
            "reports/manifests/daily/manifest.json"
        );
        assert_eq!(object_key("a/b", &["c"]), "a/b/c");
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("a/b.csv").is_ok());
        for bad in ["", "/abs", "a\\b", "a/../b"] {
            assert!(matches!(
                validate_key(bad),
                Err(PublishError::InvalidKey { .. })
            ));
        }
    }
}
