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

//! # Report Runner
//!
//! Executes one configured report end to end:
//! 1. fetch rows from the bound connection,
//! 2. treat an empty fetch as a failure,
//! 3. write the CSV artifact,
//! 4. publish it and refresh the manifest, when the report publishes.
//!
//! A publish failure never removes the local artifact. Runs of the same report
//! never overlap: scheduled ticks that find a run in flight are skipped, and
//! explicit one-shot runs wait for it.

use crate::application::publisher::Publisher;
use crate::domain::entities::{Report, RunOutcome};
use crate::domain::errors::{RelayError, Result};
use crate::infrastructure::local_storage::csv_artifact_writer::CsvArtifactWriter;
use crate::ports::connection_port::Connection;
use chrono::{DateTime, Local};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Source of artifact timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

pub struct ReportRunner {
    report: Report,
    connection: Arc<dyn Connection>,
    writer: CsvArtifactWriter,
    publisher: Option<Arc<Publisher>>,
    run_guard: Mutex<()>,
    clock: Clock,
}

impl ReportRunner {
    pub fn new(
        report: Report,
        connection: Arc<dyn Connection>,
        publisher: Option<Arc<Publisher>>,
    ) -> Self {
        Self {
            report,
            connection,
            writer: CsvArtifactWriter,
            publisher,
            run_guard: Mutex::new(()),
            clock: Arc::new(Local::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Explicit single run; the failure is returned to the caller.
    pub async fn run_once(&self) -> Result<RunOutcome> {
        let _guard = self.run_guard.lock().await;
        self.execute().await
    }

    /// Scheduled trigger. Failures are logged, never propagated; `None` means
    /// the run failed or was skipped.
    pub async fn run(&self) -> Option<RunOutcome> {
        let name = self.report.name.as_str();
        let _guard = match self.run_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(report = name; "Previous run still in progress, skipping this trigger");
                return None;
            }
        };
        match self.execute().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(report = name; "Run failed: {}", e);
                None
            }
        }
    }

    async fn execute(&self) -> Result<RunOutcome> {
        let name = self.report.name.as_str();
        info!(report = name; "Fetching from {} connection '{}'", self.connection.kind(), self.report.connection);

        let rows = self
            .connection
            .fetch_report(&self.report.params)
            .await
            .map_err(|source| RelayError::FetchError {
                report: name.to_string(),
                source,
            })?;
        // A first row without fields would give a header-less CSV.
        if rows.first().map_or(true, |first| first.is_empty()) {
            return Err(RelayError::EmptyResult(name.to_string()));
        }

        let writer = self.writer;
        let staging_dir = self.report.staging_dir.clone();
        let report = name.to_string();
        let at = (self.clock)();
        let artifact = tokio::task::spawn_blocking(move || {
            writer.write_artifact(&report, &staging_dir, &rows, at)
        })
        .await
        .map_err(|e| RelayError::IoError(std::io::Error::other(e.to_string())))??;
        info!(report = name; "Wrote {} rows to {}", artifact.rows, artifact.path.display());

        let published = match (&self.publisher, self.report.publish) {
            (Some(publisher), true) => Some(publisher.publish(&artifact).await.map_err(
                |source| RelayError::PublishError {
                    report: name.to_string(),
                    artifact: artifact.path.clone(),
                    source,
                },
            )?),
            _ => None,
        };

        Ok(RunOutcome {
            report: name.to_string(),
            artifact,
            published,
        })
    }
}
