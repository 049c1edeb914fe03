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

//! # Manifest Accumulator
//!
//! Keeps `<root>/<report>/manifest.json` up to date. Every merge is a
//! read-modify-write of the whole document, serialized per report by an
//! async lock that callers hold for as long as the merged manifest is in use
//! (the publisher keeps it across the manifest upload).

use crate::domain::errors::PublishError;
use crate::domain::manifest::Manifest;
use log::debug;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub const MANIFEST_FILE: &str = "manifest.json";

pub struct ManifestAccumulator {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Proof that the caller holds the report's manifest lock.
pub struct ManifestLock {
    report: String,
    _guard: OwnedMutexGuard<()>,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub manifest: Manifest,
    pub path: PathBuf,
    /// False when the location was already listed.
    pub added: bool,
    /// The serialized document as written to disk.
    pub bytes: Vec<u8>,
}

impl ManifestAccumulator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn manifest_path(&self, report: &str) -> PathBuf {
        self.root.join(report).join(MANIFEST_FILE)
    }

    pub async fn lock(&self, report: &str) -> ManifestLock {
        let mutex = {
            let mut locks = match self.locks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks
                .entry(report.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        ManifestLock {
            report: report.to_string(),
            _guard: mutex.lock_owned().await,
        }
    }

    /// Current manifest for the locked report; missing or unreadable files
    /// read as empty.
    pub async fn load(&self, lock: &ManifestLock) -> Manifest {
        let path = self.manifest_path(&lock.report);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Manifest::from_json_lenient(&bytes),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Cannot read manifest {}: {}", path.display(), e);
                }
                Manifest::new(Vec::new())
            }
        }
    }

    /// Appends `location` to the locked report's manifest unless present and
    /// rewrites the file whole.
    pub async fn merge(
        &self,
        lock: &ManifestLock,
        location: &str,
    ) -> Result<MergeOutcome, PublishError> {
        let mut manifest = self.load(lock).await;
        let added = manifest.merge_location(location);
        let bytes = manifest
            .to_json_pretty()
            .map_err(|e| PublishError::Manifest(e.to_string()))?;

        let path = self.manifest_path(&lock.report);
        let target = path.clone();
        let body = bytes.clone();
        tokio::task::spawn_blocking(move || write_atomically(&target, &body))
            .await
            .map_err(|e| PublishError::Manifest(e.to_string()))??;
        debug!(
            "Manifest {} now lists {} locations",
            path.display(),
            manifest.locations().len()
        );

        Ok(MergeOutcome {
            manifest,
            path,
            added,
            bytes,
        })
    }
}

fn write_atomically(path: &Path, body: &[u8]) -> Result<(), PublishError> {
    let dir = path
        .parent()
        .ok_or_else(|| PublishError::Manifest(format!("{} has no parent", path.display())))?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| PublishError::Io(e.error))?;
    Ok(())
}
