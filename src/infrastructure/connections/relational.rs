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

//! # Relational Connection
//!
//! Runs the report's `query` parameter verbatim against a PostgreSQL,
//! MariaDB/MySQL or SQLite database through a lazily created `sqlx` pool.
//! Column order follows the result set; every value is rendered as text and
//! NULL becomes an empty string.
//!
//! PostgreSQL queries go over the simple query protocol, so the server sends
//! every column in its text form and types without a dedicated decoder here
//! (NUMERIC, UUID, INTERVAL, arrays) arrive already rendered.

use crate::domain::entities::{ReportParams, Row};
use crate::domain::errors::{AuthError, FetchError};
use crate::ports::connection_port::{required_param, Connection};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::debug;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, ColumnIndex, Row as SqlRow, TypeInfo, ValueRef};
use tokio::sync::OnceCell;

const MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDriver {
    Postgres,
    MySql,
    Sqlite,
}

impl SqlDriver {
    fn label(self) -> &'static str {
        match self {
            SqlDriver::Postgres => "postgres",
            SqlDriver::MySql => "mariadb",
            SqlDriver::Sqlite => "sqlite",
        }
    }
}

enum SqlPool {
    Postgres(PgPool),
    MySql(MySqlPool),
    Sqlite(SqlitePool),
}

pub struct RelationalConnection {
    driver: SqlDriver,
    dsn: String,
    pool: OnceCell<SqlPool>,
}

impl RelationalConnection {
    pub fn new(driver: SqlDriver, dsn: impl Into<String>) -> Self {
        Self {
            driver,
            dsn: dsn.into(),
            pool: OnceCell::new(),
        }
    }

    async fn pool(&self) -> Result<&SqlPool, AuthError> {
        if self.dsn.trim().is_empty() {
            return Err(AuthError::MissingCredential(format!(
                "{} connection has no dsn",
                self.driver.label()
            )));
        }
        self.pool
            .get_or_try_init(|| async {
                debug!("Opening {} pool", self.driver.label());
                let unreachable = |e: sqlx::Error| AuthError::Unreachable(e.to_string());
                let pool = match self.driver {
                    SqlDriver::Postgres => SqlPool::Postgres(
                        PgPoolOptions::new()
                            .max_connections(MAX_CONNECTIONS)
                            .connect(&self.dsn)
                            .await
                            .map_err(unreachable)?,
                    ),
                    SqlDriver::MySql => SqlPool::MySql(
                        MySqlPoolOptions::new()
                            .max_connections(MAX_CONNECTIONS)
                            .connect(&self.dsn)
                            .await
                            .map_err(unreachable)?,
                    ),
                    SqlDriver::Sqlite => {
                        // Every pooled connection to ":memory:" would be a separate
                        // database, so in-memory DSNs keep a single, never-recycled one.
                        let options = if is_in_memory(&self.dsn) {
                            SqlitePoolOptions::new()
                                .max_connections(1)
                                .idle_timeout(None)
                                .max_lifetime(None)
                        } else {
                            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
                        };
                        SqlPool::Sqlite(options.connect(&self.dsn).await.map_err(unreachable)?)
                    }
                };
                Ok(pool)
            })
            .await
    }
}

fn is_in_memory(dsn: &str) -> bool {
    dsn.contains(":memory:") || dsn.contains("mode=memory")
}

#[async_trait]
impl Connection for RelationalConnection {
    fn kind(&self) -> &'static str {
        self.driver.label()
    }

    async fn authenticate(&self) -> Result<(), AuthError> {
        self.pool().await.map(|_| ())
    }

    async fn fetch_report(&self, params: &ReportParams) -> Result<Vec<Row>, FetchError> {
        let query = required_param(params, "query")?;
        let pool = self.pool().await?;
        let query_err = |e: sqlx::Error| FetchError::Query(e.to_string());

        match pool {
            SqlPool::Postgres(p) => sqlx::raw_sql(query)
                .fetch_all(p)
                .await
                .map_err(query_err)?
                .iter()
                .map(|r| decode_row(r, render_postgres))
                .collect(),
            SqlPool::MySql(p) => sqlx::query(query)
                .fetch_all(p)
                .await
                .map_err(query_err)?
                .iter()
                .map(|r| decode_row(r, render_mysql))
                .collect(),
            SqlPool::Sqlite(p) => sqlx::query(query)
                .fetch_all(p)
                .await
                .map_err(query_err)?
                .iter()
                .map(|r| decode_row(r, render_sqlite))
                .collect(),
        }
    }
}

/// Walks the columns of one result row in order, rendering non-NULL values
/// with the driver-specific `render`.
fn decode_row<R, F>(row: &R, render: F) -> Result<Row, FetchError>
where
    R: SqlRow,
    usize: ColumnIndex<R>,
    F: Fn(&R, usize, &str) -> Result<String, sqlx::Error>,
{
    let mut out = Row::with_capacity(row.columns().len());
    for col in row.columns() {
        let idx = col.ordinal();
        let raw = row
            .try_get_raw(idx)
            .map_err(|e| FetchError::Query(e.to_string()))?;
        let text = if raw.is_null() {
            String::new()
        } else {
            let type_name = raw.type_info().name().to_ascii_uppercase();
            render(row, idx, &type_name).map_err(|e| {
                FetchError::Query(format!(
                    "cannot render column '{}' of type {}: {}",
                    col.name(),
                    type_name,
                    e
                ))
            })?
        };
        out.insert(col.name().to_string(), text);
    }
    Ok(out)
}

fn iso_datetime(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

fn lossy(bytes: Vec<u8>) -> String {
    String::from_utf8_lossy(&bytes).into_owned()
}

fn render_postgres(row: &PgRow, idx: usize, type_name: &str) -> Result<String, sqlx::Error> {
    Ok(match type_name {
        "BOOL" => row.try_get::<bool, _>(idx)?.to_string(),
        "INT2" => row.try_get::<i16, _>(idx)?.to_string(),
        "INT4" => row.try_get::<i32, _>(idx)?.to_string(),
        "INT8" => row.try_get::<i64, _>(idx)?.to_string(),
        "FLOAT4" => row.try_get::<f32, _>(idx)?.to_string(),
        "FLOAT8" => row.try_get::<f64, _>(idx)?.to_string(),
        "BYTEA" => lossy(row.try_get::<Vec<u8>, _>(idx)?),
        "DATE" => row.try_get::<NaiveDate, _>(idx)?.to_string(),
        "TIME" => row.try_get::<NaiveTime, _>(idx)?.to_string(),
        "TIMESTAMP" => iso_datetime(row.try_get::<NaiveDateTime, _>(idx)?),
        "TIMESTAMPTZ" => row.try_get::<DateTime<Utc>, _>(idx)?.to_rfc3339(),
        "JSON" | "JSONB" => row.try_get::<serde_json::Value, _>(idx)?.to_string(),
        _ => row.try_get_unchecked::<String, _>(idx)?,
    })
}

fn render_mysql(row: &MySqlRow, idx: usize, type_name: &str) -> Result<String, sqlx::Error> {
    let unsigned = type_name.ends_with("UNSIGNED");
    let base = type_name.split_whitespace().next().unwrap_or(type_name);
    Ok(match base {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" if unsigned => {
            row.try_get_unchecked::<u64, _>(idx)?.to_string()
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            row.try_get_unchecked::<i64, _>(idx)?.to_string()
        }
        "BOOLEAN" => row.try_get::<bool, _>(idx)?.to_string(),
        "FLOAT" => row.try_get::<f32, _>(idx)?.to_string(),
        "DOUBLE" => row.try_get::<f64, _>(idx)?.to_string(),
        "DATE" => row.try_get::<NaiveDate, _>(idx)?.to_string(),
        "TIME" => row.try_get::<NaiveTime, _>(idx)?.to_string(),
        "DATETIME" => iso_datetime(row.try_get::<NaiveDateTime, _>(idx)?),
        "TIMESTAMP" => row.try_get::<DateTime<Utc>, _>(idx)?.to_rfc3339(),
        "JSON" => row.try_get::<serde_json::Value, _>(idx)?.to_string(),
        // Strings, DECIMAL, ENUM and binary columns all arrive as bytes.
        _ => lossy(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
    })
}

fn render_sqlite(row: &SqliteRow, idx: usize, type_name: &str) -> Result<String, sqlx::Error> {
    Ok(match type_name {
        "INTEGER" | "INT8" | "BIGINT" => row.try_get_unchecked::<i64, _>(idx)?.to_string(),
        "REAL" => row.try_get_unchecked::<f64, _>(idx)?.to_string(),
        "BOOLEAN" => row.try_get_unchecked::<bool, _>(idx)?.to_string(),
        "BLOB" => lossy(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        _ => row.try_get_unchecked::<String, _>(idx)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(query: &str) -> ReportParams {
        let mut p = ReportParams::new();
        p.insert("query".to_string(), query.to_string());
        p
    }

    #[tokio::test]
    async fn test_sqlite_rows_keep_column_order_and_render_text() {
        let conn = RelationalConnection::new(SqlDriver::Sqlite, "sqlite::memory:");
        let rows = conn
            .fetch_report(&params(
                "SELECT 1 AS id, 'A' AS name UNION ALL SELECT 2 AS id, 'B' AS name",
            ))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["id", "name"]);
        assert_eq!(rows[1]["id"], "2");
        assert_eq!(rows[1]["name"], "B");
    }

    #[tokio::test]
    async fn test_sqlite_null_blob_and_real_values() {
        let conn = RelationalConnection::new(SqlDriver::Sqlite, "sqlite::memory:");
        let rows = conn
            .fetch_report(&params(
                "SELECT NULL AS missing, X'68656C6C6F' AS raw, 1.5 AS ratio",
            ))
            .await
            .unwrap();
        assert_eq!(rows[0]["missing"], "");
        assert_eq!(rows[0]["raw"], "hello");
        assert_eq!(rows[0]["ratio"], "1.5");
    }

    #[tokio::test]
    async fn test_file_backed_sqlite_shares_one_pool_across_fetches() {
        let dir = tempfile::tempdir().unwrap();
        let dsn = format!("sqlite://{}?mode=rwc", dir.path().join("r.db").display());
        let conn = RelationalConnection::new(SqlDriver::Sqlite, dsn);
        conn.authenticate().await.unwrap();
        conn.authenticate().await.unwrap();

        conn.fetch_report(&params("CREATE TABLE sales (region TEXT, total INTEGER)"))
            .await
            .unwrap();
        conn.fetch_report(&params(
            "INSERT INTO sales VALUES ('north', 10), ('south', NULL)",
        ))
        .await
        .unwrap();
        let rows = conn
            .fetch_report(&params("SELECT region, total FROM sales ORDER BY region"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["total"], "10");
        assert_eq!(rows[1]["total"], "");
    }

    #[tokio::test]
    async fn test_missing_query_is_reported_by_name() {
        let conn = RelationalConnection::new(SqlDriver::Sqlite, "sqlite::memory:");
        let err = conn.fetch_report(&ReportParams::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::MissingParameter(p) if p == "query"));
    }

    #[tokio::test]
    async fn test_bad_sql_is_a_query_error() {
        let conn = RelationalConnection::new(SqlDriver::Sqlite, "sqlite::memory:");
        assert!(matches!(
            conn.fetch_report(&params("SELEC nonsense")).await,
            Err(FetchError::Query(_))
        ));
    }

    /// Needs a reachable server; set `RELAY_TEST_POSTGRES_DSN` to run it.
    #[tokio::test]
    async fn test_postgres_numeric_uuid_and_aggregates_render_as_text() {
        let Ok(dsn) = std::env::var("RELAY_TEST_POSTGRES_DSN") else {
            return;
        };
        let conn = RelationalConnection::new(SqlDriver::Postgres, dsn);
        let rows = conn
            .fetch_report(&params(
                "SELECT 12.5::numeric AS amount, \
                        1::numeric AS one, \
                        'a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11'::uuid AS id, \
                        (SELECT sum(x::int8) FROM generate_series(1, 3) AS x) AS total, \
                        (SELECT avg(x) FROM generate_series(1, 4) AS x) AS mean, \
                        true AS flag, \
                        '2026-01-02 03:04:05'::timestamp AS at, \
                        NULL::text AS missing",
            ))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["amount"], "12.5");
        assert_eq!(row["one"], "1");
        assert_eq!(row["id"], "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11");
        assert_eq!(row["total"], "6");
        assert_eq!(row["mean"].parse::<f64>().unwrap(), 2.5);
        assert_eq!(row["flag"], "true");
        assert_eq!(row["at"], "2026-01-02T03:04:05");
        assert_eq!(row["missing"], "");
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["amount", "one", "id", "total", "mean", "flag", "at", "missing"]
        );
    }

    #[tokio::test]
    async fn test_empty_dsn_fails_authentication() {
        let conn = RelationalConnection::new(SqlDriver::Postgres, " ");
        assert!(matches!(
            conn.authenticate().await,
            Err(AuthError::MissingCredential(_))
        ));
    }
}
