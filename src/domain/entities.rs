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

//! # Domain Entities
//!
//! The nouns of the relay: rows pulled from a source, the report definition
//! that says where to pull them from, and the records of what one run produced.

use crate::domain::schedule::CronSchedule;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One normalized record. Field order is the order the source produced them
/// in (sheet header, SQL column list, JSON key order) and is authoritative for
/// the CSV column order.
pub type Row = IndexMap<String, String>;

/// Source-specific query parameters for one report.
pub type ReportParams = BTreeMap<String, String>;

/// A configured, independently scheduled unit of work.
///
/// Built once at configuration load and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Report {
    pub name: String,
    /// Name of the connection the report pulls from.
    pub connection: String,
    pub params: ReportParams,
    /// Artifacts land in `staging_dir/<name>/`.
    pub staging_dir: PathBuf,
    pub schedule: CronSchedule,
    /// Whether artifacts are pushed to the configured object store.
    pub publish: bool,
}

/// One CSV file produced by a single run.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub report: String,
    pub path: PathBuf,
    pub file_name: String,
    pub rows: usize,
}

/// Where an artifact and its refreshed manifest ended up.
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub artifact_uri: String,
    pub manifest_uri: String,
    /// Number of locations in the manifest after the merge.
    pub manifest_locations: usize,
}

/// The result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub report: String,
    pub artifact: Artifact,
    pub published: Option<PublishOutcome>,
}
