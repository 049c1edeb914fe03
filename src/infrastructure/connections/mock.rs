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

use crate::domain::entities::{ReportParams, Row};
use crate::domain::errors::{AuthError, FetchError};
use crate::ports::connection_port::Connection;
use async_trait::async_trait;

/// Fixed two-row source for wiring tests and dry runs. Ignores parameters.
pub struct MockConnection;

#[async_trait]
impl Connection for MockConnection {
    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn authenticate(&self) -> Result<(), AuthError> {
        Ok(())
    }

    async fn fetch_report(&self, _params: &ReportParams) -> Result<Vec<Row>, FetchError> {
        Ok([("1", "Test User 1"), ("2", "Test User 2")]
            .into_iter()
            .map(|(id, name)| {
                let mut row = Row::new();
                row.insert("id".to_string(), id.to_string());
                row.insert("name".to_string(), name.to_string());
                row
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_two_rows() {
        let rows = MockConnection.fetch_report(&ReportParams::new()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["name"], "Test User 2");
    }
}
