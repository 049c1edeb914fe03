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

//! # Connection Port
//!
//! The contract every data source implements. A connection is built once
//! from configuration and shared by all reports that name it, so
//! implementations must tolerate concurrent `fetch_report` calls.

use crate::domain::entities::{ReportParams, Row};
use crate::domain::errors::{AuthError, FetchError};
use async_trait::async_trait;

#[async_trait]
pub trait Connection: Send + Sync {
    /// Short label for logs (`postgres`, `folio`, ...).
    fn kind(&self) -> &'static str;

    /// Establishes credentials or sessions. Safe to call more than once;
    /// `fetch_report` calls it itself when no session exists yet.
    async fn authenticate(&self) -> Result<(), AuthError>;

    /// Pulls the report's rows. Every row carries the same key set, in the
    /// order the source defines.
    async fn fetch_report(&self, params: &ReportParams) -> Result<Vec<Row>, FetchError>;
}

/// Looks up a parameter that must be present and non-blank.
pub fn required_param<'a>(params: &'a ReportParams, name: &str) -> Result<&'a str, FetchError> {
    match params.get(name).map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(FetchError::MissingParameter(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_param_rejects_blank_values() {
        let mut params = ReportParams::new();
        params.insert("query".to_string(), "  ".to_string());
        params.insert("url".to_string(), " /reports/x ".to_string());

        assert!(matches!(
            required_param(&params, "query"),
            Err(FetchError::MissingParameter(p)) if p == "query"
        ));
        assert!(matches!(
            required_param(&params, "spreadsheet_id"),
            Err(FetchError::MissingParameter(_))
        ));
        assert_eq!(required_param(&params, "url").unwrap(), "/reports/x");
    }
}
