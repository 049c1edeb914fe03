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

//! # Object Store Port
//!
//! Destination for published artifacts and manifests.

use crate::domain::errors::PublishError;
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human-readable target, e.g. `s3://bucket`.
    fn describe(&self) -> String;

    /// Stores `body` under `key`, replacing any existing object, and returns
    /// the URI the object can be addressed by.
    async fn put(&self, key: &str, body: Bytes) -> Result<String, PublishError>;
}
