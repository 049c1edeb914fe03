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

//! # Runtime Context
//!
//! Resolves the configuration into live objects, once, at startup:
//! 1. **Connections**: one adapter per declared connection, shared by every
//!    report that names it.
//! 2. **Publisher**: the object store plus the manifest accumulator, when
//!    storage is enabled.
//! 3. **Runners**: one `ReportRunner` per report, bound to its connection.

use crate::application::publisher::Publisher;
use crate::application::report_runner::ReportRunner;
use crate::config::AppConfig;
use crate::domain::entities::{Report, RunOutcome};
use crate::domain::errors::{RelayError, Result};
use crate::domain::schedule::CronSchedule;
use crate::infrastructure::connections::build_connection;
use crate::infrastructure::local_storage::manifest_store::ManifestAccumulator;
use crate::infrastructure::object_store::build_object_store;
use crate::ports::connection_port::Connection;
use indexmap::IndexMap;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;

pub struct RuntimeContext {
    runners: IndexMap<String, Arc<ReportRunner>>,
}

impl RuntimeContext {
    /// Expects a configuration that already passed `AppConfig::validate`.
    pub async fn init(config: &AppConfig) -> Result<Self> {
        let mut connections: HashMap<&str, Arc<dyn Connection>> = HashMap::new();
        for conn in &config.connections {
            connections.insert(conn.name.as_str(), build_connection(conn)?);
        }

        let publisher = match config.active_storage() {
            Some(storage) => {
                let store = build_object_store(storage).await?;
                let manifests = ManifestAccumulator::new(config.manifest_root());
                Some(Arc::new(Publisher::new(store, manifests, &storage.prefix)))
            }
            None => None,
        };

        let mut runners = IndexMap::new();
        for rc in &config.reports {
            let connection = connections.get(rc.connection.as_str()).cloned().ok_or_else(|| {
                RelayError::ConfigError(format!(
                    "report '{}' references unknown connection '{}'",
                    rc.name, rc.connection
                ))
            })?;
            let report = Report {
                name: rc.name.clone(),
                connection: rc.connection.clone(),
                params: rc.query_params.clone(),
                staging_dir: rc
                    .staging_directory
                    .clone()
                    .unwrap_or_else(|| config.staging_directory.clone()),
                schedule: CronSchedule::parse(&rc.schedule)?,
                publish: rc.publish && publisher.is_some(),
            };
            runners.insert(
                rc.name.clone(),
                Arc::new(ReportRunner::new(report, connection, publisher.clone())),
            );
        }
        info!(
            "Loaded {} reports over {} connections",
            runners.len(),
            connections.len()
        );

        Ok(Self { runners })
    }

    pub fn runners(&self) -> impl Iterator<Item = &Arc<ReportRunner>> {
        self.runners.values()
    }

    pub fn runner(&self, name: &str) -> Result<Arc<ReportRunner>> {
        self.runners
            .get(name)
            .cloned()
            .ok_or_else(|| RelayError::UnknownReport(name.to_string()))
    }

    /// Runs one report immediately and hands its outcome or error back.
    pub async fn run_report_once(&self, name: &str) -> Result<RunOutcome> {
        self.runner(name)?.run_once().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::manifest::Manifest;

    fn config(root: &std::path::Path) -> AppConfig {
        let yaml = format!(
            r#"
staging_directory: {root}/staging
storage:
  type: Local
  root: {root}/bucket
  prefix: bi
connections:
  - name: fake
    type: Mock
reports:
  - name: users
    connection: fake
    schedule: "0 6 * * *"
  - name: users_local
    connection: fake
    schedule: "@hourly"
    publish: false
    staging_directory: {root}/other
"#,
            root = root.display()
        );
        let config = AppConfig::from_str_with_env(&yaml, false, |_| None).unwrap();
        config.validate().unwrap();
        config
    }

    #[tokio::test]
    async fn test_one_shot_run_publishes_through_configured_storage() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::init(&config(dir.path())).await.unwrap();
        assert_eq!(ctx.runners().count(), 2);

        let outcome = ctx.run_report_once("users").await.unwrap();
        assert_eq!(outcome.artifact.rows, 2);
        assert!(outcome.artifact.path.starts_with(dir.path().join("staging/users")));
        let published = outcome.published.unwrap();
        assert!(published
            .manifest_uri
            .ends_with("bucket/bi/manifests/users/manifest.json"));

        let manifest = Manifest::from_json_lenient(
            &std::fs::read(dir.path().join("staging/manifests/users/manifest.json")).unwrap(),
        );
        assert_eq!(manifest.locations(), &[published.artifact_uri]);
    }

    #[tokio::test]
    async fn test_report_overrides_and_unknown_report() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::init(&config(dir.path())).await.unwrap();

        let runner = ctx.runner("users_local").unwrap();
        assert!(!runner.report().publish);
        assert_eq!(runner.report().staging_dir, dir.path().join("other"));

        assert!(matches!(
            ctx.run_report_once("nope").await,
            Err(RelayError::UnknownReport(n)) if n == "nope"
        ));
    }
}
