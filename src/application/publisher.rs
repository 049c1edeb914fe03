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

//! # Publisher
//!
//! Uploads an artifact, merges its URI into the report's manifest and
//! uploads the refreshed manifest. The report's manifest lock is held from
//! the merge until the manifest upload finishes, so concurrent publishes of
//! one report cannot interleave their read-modify-write.

use crate::domain::entities::{Artifact, PublishOutcome};
use crate::domain::errors::PublishError;
use crate::infrastructure::local_storage::manifest_store::{ManifestAccumulator, MANIFEST_FILE};
use crate::infrastructure::object_store::object_key;
use crate::ports::object_store_port::ObjectStore;
use bytes::Bytes;
use log::{debug, info};
use std::sync::Arc;

pub const MANIFESTS_DIR: &str = "manifests";

pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    manifests: ManifestAccumulator,
    prefix: String,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>, manifests: ManifestAccumulator, prefix: &str) -> Self {
        Self {
            store,
            manifests,
            prefix: prefix.to_string(),
        }
    }

    /// `<prefix>/<report>/<file>`
    pub fn artifact_key(&self, artifact: &Artifact) -> String {
        object_key(&self.prefix, &[&artifact.report, &artifact.file_name])
    }

    /// `<prefix>/manifests/<report>/manifest.json`
    pub fn manifest_key(&self, report: &str) -> String {
        object_key(&self.prefix, &[MANIFESTS_DIR, report, MANIFEST_FILE])
    }

    pub async fn publish(&self, artifact: &Artifact) -> Result<PublishOutcome, PublishError> {
        let report = artifact.report.as_str();
        let body = tokio::fs::read(&artifact.path).await?;
        let artifact_uri = self
            .store
            .put(&self.artifact_key(artifact), Bytes::from(body))
            .await?;
        info!(report = report; "Uploaded {}", artifact_uri);

        let lock = self.manifests.lock(report).await;
        let merged = self.manifests.merge(&lock, &artifact_uri).await?;
        if !merged.added {
            debug!(report = report; "{} was already listed in the manifest", artifact_uri);
        }
        let manifest_uri = self
            .store
            .put(&self.manifest_key(report), Bytes::from(merged.bytes))
            .await?;
        drop(lock);

        let manifest_locations = merged.manifest.locations().len();
        info!(
            report = report;
            "Manifest {} lists {} files", manifest_uri, manifest_locations
        );
        Ok(PublishOutcome {
            artifact_uri,
            manifest_uri,
            manifest_locations,
        })
    }
}
