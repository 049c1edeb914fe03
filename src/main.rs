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

use clap::Parser;
use log::{error, info};
use report_relay::application::runtime::RuntimeContext;
use report_relay::application::scheduler::ReportScheduler;
use report_relay::config::{AppConfig, CliArgs, Command};
use std::process;

#[tokio::main]
async fn main() {
    // 1. Parse Arguments
    let args = CliArgs::parse();

    // 2. Initialize Logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .parse_default_env()
        .init();

    // 3. Load Config
    let config_path = args.config_path();
    let mut config = match AppConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            process::exit(1);
        }
    };

    // Merge CLI overrides
    config.merge_cli(&args);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }
    info!("Loaded configuration from {}", config_path.display());

    // 4. Resolve connections, publisher and runners
    let ctx = match RuntimeContext::init(&config).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Startup failed: {}", e);
            process::exit(1);
        }
    };

    match args.command {
        Command::Check => {
            let now = chrono::Local::now();
            for runner in ctx.runners() {
                let report = runner.report();
                let next = report
                    .schedule
                    .next_after(&now)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}\t{}\t{}\tnext: {}",
                    report.name,
                    report.connection,
                    report.schedule.expression(),
                    next
                );
            }
            info!("Configuration OK");
        }
        Command::Run {
            report: Some(name),
        } => match ctx.run_report_once(&name).await {
            Ok(outcome) => {
                info!(
                    "Report {} wrote {} rows to {}",
                    outcome.report,
                    outcome.artifact.rows,
                    outcome.artifact.path.display()
                );
                if let Some(published) = &outcome.published {
                    info!("Published {}", published.artifact_uri);
                }
            }
            Err(e) => {
                error!("Report {} failed: {}", name, e);
                process::exit(1);
            }
        },
        Command::Run { report: None } => {
            let scheduler = ReportScheduler::start(ctx.runners().cloned());
            info!("Scheduler started with {} reports", scheduler.len());

            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
            scheduler.shutdown();
        }
    }
}
