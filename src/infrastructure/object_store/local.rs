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

use crate::domain::errors::PublishError;
use crate::infrastructure::object_store::validate_key;
use crate::ports::object_store_port::ObjectStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;

/// Publishes into a directory tree; keys become relative paths under `root`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<String, PublishError> {
        validate_key(key)?;
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| PublishError::Upload {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        let absolute = tokio::fs::canonicalize(&path).await?;
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_writes_under_root_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());

        let uri = store
            .put("daily/a.csv", Bytes::from_static(b"id\n1\n"))
            .await
            .unwrap();
        assert!(uri.starts_with("file://"));
        assert!(uri.ends_with("daily/a.csv"));

        store
            .put("daily/a.csv", Bytes::from_static(b"id\n2\n"))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("daily/a.csv")).unwrap(),
            "id\n2\n"
        );
    }

    #[tokio::test]
    async fn test_put_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(matches!(
            store.put("../outside.csv", Bytes::new()).await,
            Err(PublishError::InvalidKey { .. })
        ));
    }
}
