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

//! # Report Scheduler
//!
//! One tokio task per report sleeps until the report's next fire time and
//! then dispatches the run on a task of its own, so a slow run delays neither
//! its own schedule nor any other report's.

use crate::application::report_runner::ReportRunner;
use chrono::Local;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct ReportScheduler {
    tasks: Vec<JoinHandle<()>>,
}

impl ReportScheduler {
    pub fn start<I>(runners: I) -> Self
    where
        I: IntoIterator<Item = Arc<ReportRunner>>,
    {
        let tasks = runners
            .into_iter()
            .map(|runner| {
                info!(
                    report = runner.report().name.as_str();
                    "Scheduled with '{}'",
                    runner.report().schedule.expression()
                );
                tokio::spawn(schedule_loop(runner))
            })
            .collect();
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stops scheduling. Runs already dispatched finish on their own.
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

async fn schedule_loop(runner: Arc<ReportRunner>) {
    let name = runner.report().name.clone();
    let mut last_fire = Local::now();
    loop {
        let now = Local::now();
        let from = if now > last_fire { now } else { last_fire };
        let Some(next) = runner.report().schedule.next_after(&from) else {
            warn!(report = name.as_str(); "Schedule has no upcoming fire time, stopping");
            return;
        };
        let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
        debug!(report = name.as_str(); "Next run at {}", next.to_rfc3339());
        tokio::time::sleep(wait).await;
        last_fire = next;

        let runner = runner.clone();
        tokio::spawn(async move {
            runner.run().await;
        });
    }
}
