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

//! # Connection Adapters
//!
//! One adapter per source type, all behind the `Connection` port.
//! `build_connection` is the single place a configured `type` turns into an
//! adapter; it runs once per declared connection at startup.

pub mod api_key;
pub mod http;
pub mod mock;
pub mod normalize;
pub mod relational;
pub mod spreadsheet;
pub mod token_api;

use crate::config::{ConnectionConfig, ConnectionKind};
use crate::domain::errors::Result;
use crate::ports::connection_port::Connection;
use api_key::{ApiKeyConnection, ApiKeySettings};
use mock::MockConnection;
use relational::{RelationalConnection, SqlDriver};
use spreadsheet::SpreadsheetConnection;
use std::sync::Arc;
use token_api::{TokenApiConnection, TokenApiSettings};

pub fn build_connection(config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
    let conn: Arc<dyn Connection> = match &config.kind {
        ConnectionKind::GoogleSheets {
            credentials_file,
            access_token,
            api_base,
        } => Arc::new(SpreadsheetConnection::new(
            credentials_file.clone(),
            access_token.clone(),
            api_base.clone(),
        )),
        ConnectionKind::PostgreSql { dsn } => {
            Arc::new(RelationalConnection::new(SqlDriver::Postgres, dsn.clone()))
        }
        ConnectionKind::MariaDb { dsn } => {
            Arc::new(RelationalConnection::new(SqlDriver::MySql, dsn.clone()))
        }
        ConnectionKind::Sqlite { dsn } => {
            Arc::new(RelationalConnection::new(SqlDriver::Sqlite, dsn.clone()))
        }
        ConnectionKind::Oracle {
            username,
            password,
            connect_string,
        } => oracle_connection(&config.name, username, password.as_deref(), connect_string)?,
        ConnectionKind::Folio {
            base_url,
            tenant,
            username,
            password,
            login_path,
            report_path,
        } => Arc::new(TokenApiConnection::new(TokenApiSettings {
            base_url: base_url.clone(),
            tenant: tenant.clone(),
            username: username.clone(),
            password: password.clone(),
            login_path: login_path.clone(),
            report_path: report_path.clone(),
        })),
        ConnectionKind::ApiKey {
            url,
            api_key,
            http_header_name,
            get_parameter_name,
        } => Arc::new(ApiKeyConnection::new(ApiKeySettings {
            url: url.clone(),
            api_key: api_key.clone(),
            http_header_name: http_header_name.clone(),
            get_parameter_name: get_parameter_name.clone(),
        })),
        ConnectionKind::Mock => Arc::new(MockConnection),
    };
    log::debug!("Connection {} resolved as {}", config.name, conn.kind());
    Ok(conn)
}

#[cfg(feature = "oracle")]
fn oracle_connection(
    _name: &str,
    username: &str,
    password: Option<&str>,
    connect_string: &str,
) -> Result<Arc<dyn Connection>> {
    use crate::infrastructure::oracle::query::OracleConnection;

    // Fall back to the environment so the password can stay out of the file.
    let password = password
        .map(str::to_string)
        .or_else(|| std::env::var("ORACLE_PASSWORD").ok())
        .unwrap_or_default();
    Ok(Arc::new(OracleConnection::new(
        username.to_string(),
        password,
        connect_string.to_string(),
    )))
}

#[cfg(not(feature = "oracle"))]
fn oracle_connection(
    name: &str,
    _username: &str,
    _password: Option<&str>,
    _connect_string: &str,
) -> Result<Arc<dyn Connection>> {
    Err(crate::domain::errors::RelayError::ConfigError(format!(
        "connection '{}' is of type Oracle, but this build has no Oracle support (enable the `oracle` feature)",
        name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_maps_types_to_adapters() {
        let cases = [
            (ConnectionKind::Mock, "mock"),
            (
                ConnectionKind::Sqlite {
                    dsn: "sqlite::memory:".to_string(),
                },
                "sqlite",
            ),
            (
                ConnectionKind::MariaDb {
                    dsn: "mysql://u:p@h/db".to_string(),
                },
                "mariadb",
            ),
        ];
        for (kind, label) in cases {
            let conn = build_connection(&ConnectionConfig {
                name: "c".to_string(),
                kind,
            })
            .unwrap();
            assert_eq!(conn.kind(), label);
        }
    }

    #[cfg(not(feature = "oracle"))]
    #[test]
    fn test_oracle_without_feature_is_a_config_error() {
        use crate::domain::errors::RelayError;

        let result = build_connection(&ConnectionConfig {
            name: "warehouse".to_string(),
            kind: ConnectionKind::Oracle {
                username: "scott".to_string(),
                password: None,
                connect_string: "db:1521/ORCL".to_string(),
            },
        });
        assert!(matches!(result, Err(RelayError::ConfigError(m)) if m.contains("warehouse")));
    }
}
