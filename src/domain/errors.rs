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

//! Core error definitions for the report relay.
//!
//! Connections report failures as `AuthError` / `FetchError`, the publish stage
//! as `PublishError`. `RelayError` is the run-level error that wraps them and
//! adds configuration, empty-result and I/O failures. A `Result` alias over
//! `RelayError` is used throughout the application layer.

use std::path::PathBuf;
use thiserror::Error;

/// Credential or transport setup failures raised by `Connection::authenticate`.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("invalid connection settings: {0}")]
    InvalidSettings(String),

    #[error("authentication rejected: {0}")]
    Rejected(String),

    #[error("service unreachable: {0}")]
    Unreachable(String),
}

/// Failures raised by `Connection::fetch_report`.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("query failed: {0}")]
    Query(String),
}

impl FetchError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        FetchError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::MalformedResponse(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Failures while uploading an artifact or refreshing its manifest.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("upload of '{key}' failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("manifest update failed: {0}")]
    Manifest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error types encountered while loading configuration or running a report.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Fetch failed for {report}: {source}")]
    FetchError {
        report: String,
        #[source]
        source: FetchError,
    },

    #[error("No results returned for {0}")]
    EmptyResult(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Publish failed for {report} (local artifact kept at {}): {source}", .artifact.display())]
    PublishError {
        report: String,
        artifact: PathBuf,
        #[source]
        source: PublishError,
    },

    #[error("Unknown report: {0}")]
    UnknownReport(String),
}

/// A specialized Result type for the report relay.
pub type Result<T> = std::result::Result<T, RelayError>;
