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

//! # Configuration
//!
//! The relay is configured by one YAML (or JSON, by `.json` extension) file
//! declaring connections, reports and the optional publish target. `$VAR` and
//! `${VAR}` references are replaced from the environment before parsing, so
//! secrets can stay out of the file.

use crate::domain::errors::{RelayError, Result};
use crate::domain::schedule::CronSchedule;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "relay.yaml";

fn default_staging_directory() -> PathBuf {
    PathBuf::from("./staging")
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_staging_directory")]
    pub staging_directory: PathBuf,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub reports: Vec<ReportConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Key prefix in front of every uploaded object.
    #[serde(default)]
    pub prefix: String,
    /// Local directory holding `<report>/manifest.json`.
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,
    #[serde(flatten)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum StorageBackend {
    S3 {
        bucket: String,
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        access_key_id: Option<String>,
        #[serde(default)]
        secret_access_key: Option<String>,
        #[serde(default)]
        force_path_style: bool,
    },
    Local { root: PathBuf },
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    pub name: String,
    #[serde(flatten)]
    pub kind: ConnectionKind,
}

/// Source type, selected by the `type` key of a connection entry.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum ConnectionKind {
    GoogleSheets {
        #[serde(default)]
        credentials_file: Option<PathBuf>,
        #[serde(default)]
        access_token: Option<String>,
        #[serde(default)]
        api_base: Option<String>,
    },
    #[serde(rename = "PostgreSQL", alias = "Postgres")]
    PostgreSql { dsn: String },
    #[serde(rename = "MariaDB", alias = "MySQL")]
    MariaDb { dsn: String },
    #[serde(rename = "SQLite")]
    Sqlite { dsn: String },
    Oracle {
        username: String,
        /// Falls back to `ORACLE_PASSWORD`.
        #[serde(default)]
        password: Option<String>,
        connect_string: String,
    },
    Folio {
        base_url: String,
        tenant: String,
        username: String,
        password: String,
        #[serde(default)]
        login_path: Option<String>,
        #[serde(default)]
        report_path: Option<String>,
    },
    #[serde(rename = "APIKey")]
    ApiKey {
        url: String,
        api_key: String,
        #[serde(default)]
        http_header_name: Option<String>,
        #[serde(default)]
        get_parameter_name: Option<String>,
    },
    Mock,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    pub name: String,
    pub connection: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(default, deserialize_with = "scalar_map")]
    pub query_params: BTreeMap<String, String>,
    #[serde(default)]
    pub staging_directory: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub publish: bool,
}

/// Parameter values may be written as numbers or booleans in YAML; they are
/// all handed to connections as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

fn scalar_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Option<Scalar>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.map(|s| s.to_string()).unwrap_or_default()))
        .collect())
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (YAML or JSON) [default: ~/relay.yaml]
    #[arg(short, long, global = true, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,

    /// Overrides `staging_directory` from the file
    #[arg(long, global = true)]
    pub staging_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run all reports on their schedules, or one report once with --report
    Run {
        /// Run this report immediately instead of starting the scheduler
        #[arg(short, long)]
        report: Option<String>,
    },
    /// Load and validate the configuration, then print the schedule
    Check,
}

impl CliArgs {
    pub fn config_path(&self) -> PathBuf {
        match &self.config {
            Some(path) => path.clone(),
            None => std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(DEFAULT_CONFIG_FILE),
        }
    }
}

/// Replaces `$VAR` and `${VAR}` using `lookup`; unknown variables become empty.
pub fn expand_env<F>(input: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .map_err(|e| RelayError::ConfigError(e.to_string()))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_default()
        })
        .into_owned())
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RelayError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        Self::from_str_with_env(&contents, is_json, |name| std::env::var(name).ok())
    }

    pub fn from_str_with_env<F>(contents: &str, is_json: bool, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_env(contents, lookup)?;
        let config: AppConfig = if is_json {
            serde_json::from_str(&expanded).map_err(|e| RelayError::ConfigError(e.to_string()))?
        } else {
            serde_yaml::from_str(&expanded).map_err(|e| RelayError::ConfigError(e.to_string()))?
        };
        Ok(config)
    }

    pub fn merge_cli(&mut self, args: &CliArgs) {
        if let Some(dir) = &args.staging_dir {
            self.staging_directory = dir.clone();
        }
    }

    /// Storage settings when publishing is switched on.
    pub fn active_storage(&self) -> Option<&StorageConfig> {
        self.storage.as_ref().filter(|s| s.enabled)
    }

    pub fn manifest_root(&self) -> PathBuf {
        self.storage
            .as_ref()
            .and_then(|s| s.manifest_path.clone())
            .unwrap_or_else(|| self.staging_directory.join("manifests"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.reports.is_empty() {
            return Err(RelayError::ConfigError("no reports configured".to_string()));
        }

        let mut connections = HashSet::new();
        for conn in &self.connections {
            if conn.name.trim().is_empty() {
                return Err(RelayError::ConfigError(
                    "connection with an empty name".to_string(),
                ));
            }
            if !connections.insert(conn.name.as_str()) {
                return Err(RelayError::ConfigError(format!(
                    "duplicate connection name '{}'",
                    conn.name
                )));
            }
        }

        let mut reports = HashSet::new();
        for report in &self.reports {
            let name = report.name.as_str();
            if name.trim().is_empty() {
                return Err(RelayError::ConfigError("report with an empty name".to_string()));
            }
            if name.contains('/') || name.contains('\\') || name.contains("..") {
                return Err(RelayError::ConfigError(format!(
                    "report name '{}' must not contain '/', '\\' or '..'",
                    name
                )));
            }
            if !reports.insert(name) {
                return Err(RelayError::ConfigError(format!(
                    "duplicate report name '{}'",
                    name
                )));
            }
            if !connections.contains(report.connection.as_str()) {
                return Err(RelayError::ConfigError(format!(
                    "report '{}' references unknown connection '{}'",
                    name, report.connection
                )));
            }
            if report.schedule.trim().is_empty() {
                return Err(RelayError::ConfigError(format!(
                    "cron schedule not provided in report '{}'",
                    name
                )));
            }
            CronSchedule::parse(&report.schedule).map_err(|e| {
                RelayError::ConfigError(format!("report '{}': {}", name, e))
            })?;
        }

        if let Some(StorageConfig {
            backend: StorageBackend::S3 { bucket, .. },
            enabled: true,
            ..
        }) = &self.storage
        {
            if bucket.trim().is_empty() {
                return Err(RelayError::ConfigError("storage bucket is empty".to_string()));
            }
        }
        Ok(())
    }
}
