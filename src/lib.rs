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

//! # Report Relay
//!
//! Pulls tabular reports from spreadsheets, SQL databases and HTTP report
//! APIs on cron schedules, stages each pull as a timestamped CSV file and
//! optionally publishes it to an object store together with a manifest that
//! BI tools read to find every file published for a report.
//!
//! The crate follows the **Hexagonal Architecture** (Ports and Adapters):
//! `domain` holds the data model and errors, `ports` the capability traits,
//! `infrastructure` the adapters, and `application` the run pipeline.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ports;
