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

//! # Token-Flow API Connection
//!
//! FOLIO-style report service: a login exchanges credentials for a session
//! token, which is then sent with every report request.
//!
//! The token is cached on the connection and only fetched again when absent.
//! A rejected report request is returned as-is; it does not trigger a new login.

use crate::domain::entities::{ReportParams, Row};
use crate::domain::errors::{AuthError, FetchError};
use crate::infrastructure::connections::http::{build_client, ensure_success, join_url, truncate};
use crate::infrastructure::connections::normalize::{rows_from_csv, rows_from_json_bytes};
use crate::ports::connection_port::{required_param, Connection};
use async_trait::async_trait;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

pub const TENANT_HEADER: &str = "x-okapi-tenant";
pub const TOKEN_HEADER: &str = "x-okapi-token";
pub const DEFAULT_LOGIN_PATH: &str = "/authn/login";
pub const DEFAULT_REPORT_PATH: &str = "/ldp/db/reports";
/// Report parameter holding the upstream query reference.
pub const QUERY_URL_PARAM: &str = "query_url";

#[derive(Debug, Clone)]
pub struct TokenApiSettings {
    pub base_url: String,
    pub tenant: String,
    pub username: String,
    pub password: String,
    pub login_path: Option<String>,
    pub report_path: Option<String>,
}

struct TokenSession {
    client: Client,
    token: String,
}

pub struct TokenApiConnection {
    settings: TokenApiSettings,
    session: Mutex<Option<TokenSession>>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct ReportRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<&'a str, &'a str>,
}

impl TokenApiConnection {
    pub fn new(settings: TokenApiSettings) -> Self {
        Self {
            settings,
            session: Mutex::new(None),
        }
    }

    fn check_settings(&self) -> Result<(), AuthError> {
        let s = &self.settings;
        for (name, value) in [
            ("base_url", &s.base_url),
            ("tenant", &s.tenant),
            ("username", &s.username),
            ("password", &s.password),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::MissingCredential(format!("missing {}", name)));
            }
        }
        Ok(())
    }

    /// Returns the cached session, logging in first if there is none. The
    /// lock is held across the login so concurrent callers share one token.
    async fn session(&self) -> Result<(Client, String), AuthError> {
        self.check_settings()?;
        let mut guard = self.session.lock().await;
        if let Some(s) = guard.as_ref() {
            return Ok((s.client.clone(), s.token.clone()));
        }
        let client = build_client()?;
        let token = self.login(&client).await?;
        *guard = Some(TokenSession {
            client: client.clone(),
            token: token.clone(),
        });
        Ok((client, token))
    }

    async fn login(&self, client: &Client) -> Result<String, AuthError> {
        let s = &self.settings;
        let url = join_url(
            &s.base_url,
            s.login_path.as_deref().unwrap_or(DEFAULT_LOGIN_PATH),
        );
        let response = client
            .post(&url)
            .header(TENANT_HEADER, &s.tenant)
            .json(&LoginRequest {
                username: &s.username,
                password: &s.password,
            })
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(format!(
                "login returned {}: {}",
                status.as_u16(),
                truncate(&body)
            )));
        }
        let token = response
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AuthError::Rejected(format!("login response carried no {} header", TOKEN_HEADER))
            })?;
        debug!("Logged in to tenant {}", s.tenant);
        Ok(token.to_string())
    }
}

#[async_trait]
impl Connection for TokenApiConnection {
    fn kind(&self) -> &'static str {
        "folio"
    }

    async fn authenticate(&self) -> Result<(), AuthError> {
        self.session().await.map(|_| ())
    }

    async fn fetch_report(&self, params: &ReportParams) -> Result<Vec<Row>, FetchError> {
        let query_url = required_param(params, QUERY_URL_PARAM)?;
        let extra: BTreeMap<&str, &str> = params
            .iter()
            .filter(|(k, _)| k.as_str() != QUERY_URL_PARAM)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let (client, token) = self.session().await?;
        let s = &self.settings;
        let url = join_url(
            &s.base_url,
            s.report_path.as_deref().unwrap_or(DEFAULT_REPORT_PATH),
        );
        let response = client
            .post(&url)
            .header(TENANT_HEADER, &s.tenant)
            .header(TOKEN_HEADER, &token)
            .json(&ReportRequest {
                url: query_url,
                params: extra,
            })
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);
        let body = response.bytes().await?;
        if is_json {
            rows_from_json_bytes(&body)
        } else {
            rows_from_csv(&body)
        }
    }
}
