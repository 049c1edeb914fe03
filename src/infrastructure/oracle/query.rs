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

//! # Oracle Connection
//!
//! Blocking `oracle` driver calls behind an r2d2 pool, moved off the async
//! runtime with `spawn_blocking`.

use crate::domain::entities::{ReportParams, Row};
use crate::domain::errors::{AuthError, FetchError};
use crate::infrastructure::oracle::connection_manager::OracleSessionManager;
use crate::ports::connection_port::{required_param, Connection};
use async_trait::async_trait;
use log::debug;
use oracle::sql_type::{OracleType, Timestamp};
use r2d2::Pool;
use tokio::sync::OnceCell;

const POOL_SIZE: u32 = 4;
const PREFETCH_ROWS: u32 = 5000;

pub struct OracleConnection {
    manager: OracleSessionManager,
    pool: OnceCell<Pool<OracleSessionManager>>,
}

impl OracleConnection {
    pub fn new(username: String, password: String, connect_string: String) -> Self {
        Self {
            manager: OracleSessionManager::new(username, password, connect_string),
            pool: OnceCell::new(),
        }
    }

    async fn pool(&self) -> Result<Pool<OracleSessionManager>, AuthError> {
        let missing = self.manager.missing_settings();
        if !missing.is_empty() {
            return Err(AuthError::MissingCredential(format!(
                "oracle connection needs {}",
                missing.join(" and ")
            )));
        }
        let pool = self
            .pool
            .get_or_try_init(|| async {
                let manager = self.manager.clone();
                debug!("Opening oracle pool for {}", manager.connect_string());
                tokio::task::spawn_blocking(move || {
                    Pool::builder().max_size(POOL_SIZE).build(manager)
                })
                .await
                .map_err(|e| AuthError::Unreachable(e.to_string()))?
                .map_err(|e| AuthError::Unreachable(e.to_string()))
            })
            .await?;
        Ok(pool.clone())
    }
}

#[async_trait]
impl Connection for OracleConnection {
    fn kind(&self) -> &'static str {
        "oracle"
    }

    async fn authenticate(&self) -> Result<(), AuthError> {
        self.pool().await.map(|_| ())
    }

    async fn fetch_report(&self, params: &ReportParams) -> Result<Vec<Row>, FetchError> {
        let query = required_param(params, "query")?.to_string();
        let pool = self.pool().await?;
        tokio::task::spawn_blocking(move || run_query(&pool, &query))
            .await
            .map_err(|e| FetchError::Query(e.to_string()))?
    }
}

fn run_query(pool: &Pool<OracleSessionManager>, sql: &str) -> Result<Vec<Row>, FetchError> {
    let oracle_err = |e: oracle::Error| FetchError::Query(e.to_string());
    let conn = pool
        .get()
        .map_err(|e| FetchError::Transport(e.to_string()))?;
    let mut stmt = conn
        .statement(sql)
        .prefetch_rows(PREFETCH_ROWS)
        .build()
        .map_err(oracle_err)?;
    let rows = stmt.query(&[]).map_err(oracle_err)?;

    let columns: Vec<(String, OracleType)> = rows
        .column_info()
        .iter()
        .map(|c| (c.name().to_string(), c.oracle_type().clone()))
        .collect();

    let mut out = Vec::new();
    for row_res in rows {
        let row = row_res.map_err(oracle_err)?;
        let mut record = Row::with_capacity(columns.len());
        for (i, (name, otype)) in columns.iter().enumerate() {
            record.insert(name.clone(), render_value(&row, i, otype).map_err(oracle_err)?);
        }
        out.push(record);
    }
    Ok(out)
}

fn render_value(row: &oracle::Row, i: usize, otype: &OracleType) -> oracle::Result<String> {
    match otype {
        OracleType::Date
        | OracleType::Timestamp(_)
        | OracleType::TimestampTZ(_)
        | OracleType::TimestampLTZ(_) => {
            let v: Option<Timestamp> = row.get(i)?;
            Ok(v.map(|ts| iso_timestamp(&ts)).unwrap_or_default())
        }
        OracleType::Raw(_) | OracleType::BLOB => {
            let v: Option<Vec<u8>> = row.get(i)?;
            Ok(v.map(|b| String::from_utf8_lossy(&b).into_owned())
                .unwrap_or_default())
        }
        _ => {
            let v: Option<String> = row.get(i)?;
            Ok(v.unwrap_or_default())
        }
    }
}

fn iso_timestamp(ts: &Timestamp) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}",
        ts.year(),
        ts.month(),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second(),
        ts.nanosecond() / 1000
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(username: &str, connect_string: &str) -> OracleConnection {
        OracleConnection::new(
            username.to_string(),
            "tiger".to_string(),
            connect_string.to_string(),
        )
    }

    #[test]
    fn test_iso_timestamp_has_microseconds() {
        let ts: Timestamp = "2026-01-02 03:04:05.123456789".parse().unwrap();
        assert_eq!(iso_timestamp(&ts), "2026-01-02T03:04:05.123456");
    }

    #[tokio::test]
    async fn test_missing_login_settings_fail_before_connecting() {
        match connection("", "").authenticate().await {
            Err(AuthError::MissingCredential(msg)) => {
                assert!(msg.contains("username and connect_string"))
            }
            other => panic!("expected MissingCredential, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_query_is_reported_before_connecting() {
        let err = connection("scott", "db:1521/ORCL")
            .fetch_report(&ReportParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MissingParameter(p) if p == "query"));
    }
}
