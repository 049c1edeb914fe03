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

//! # Static API-Key Connection
//!
//! `GET`s a JSON endpoint with a fixed key sent either as a header or as a
//! query parameter (exactly one of the two). Report parameters are forwarded
//! as query parameters.

use crate::domain::entities::{ReportParams, Row};
use crate::domain::errors::{AuthError, FetchError};
use crate::infrastructure::connections::http::{build_client, ensure_success};
use crate::infrastructure::connections::normalize::rows_from_json_bytes;
use crate::ports::connection_port::Connection;
use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::OnceCell;

#[derive(Debug, Clone)]
pub struct ApiKeySettings {
    pub url: String,
    pub api_key: String,
    pub http_header_name: Option<String>,
    pub get_parameter_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyPlacement {
    Header(String),
    Query(String),
}

struct ApiKeySession {
    client: Client,
    placement: KeyPlacement,
}

pub struct ApiKeyConnection {
    settings: ApiKeySettings,
    session: OnceCell<ApiKeySession>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ApiKeyConnection {
    pub fn new(settings: ApiKeySettings) -> Self {
        Self {
            settings,
            session: OnceCell::new(),
        }
    }

    fn placement(&self) -> Result<KeyPlacement, AuthError> {
        let s = &self.settings;
        if s.api_key.is_empty() {
            return Err(AuthError::MissingCredential("API key is missing".to_string()));
        }
        if s.url.trim().is_empty() {
            return Err(AuthError::InvalidSettings("url is missing".to_string()));
        }
        match (non_blank(&s.http_header_name), non_blank(&s.get_parameter_name)) {
            (Some(header), None) => Ok(KeyPlacement::Header(header)),
            (None, Some(param)) => Ok(KeyPlacement::Query(param)),
            (Some(_), Some(_)) => Err(AuthError::InvalidSettings(
                "set only one of http_header_name or get_parameter_name".to_string(),
            )),
            (None, None) => Err(AuthError::InvalidSettings(
                "http_header_name or get_parameter_name must be set".to_string(),
            )),
        }
    }

    async fn session(&self) -> Result<&ApiKeySession, AuthError> {
        self.session
            .get_or_try_init(|| async {
                let placement = self.placement()?;
                Ok(ApiKeySession {
                    client: build_client()?,
                    placement,
                })
            })
            .await
    }
}

#[async_trait]
impl Connection for ApiKeyConnection {
    fn kind(&self) -> &'static str {
        "api_key"
    }

    async fn authenticate(&self) -> Result<(), AuthError> {
        self.session().await.map(|_| ())
    }

    async fn fetch_report(&self, params: &ReportParams) -> Result<Vec<Row>, FetchError> {
        let session = self.session().await?;
        let mut query: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut request = session.client.get(self.settings.url.trim());
        match &session.placement {
            KeyPlacement::Header(name) => {
                request = request.header(name.as_str(), self.settings.api_key.as_str());
            }
            KeyPlacement::Query(name) => query.push((name.as_str(), self.settings.api_key.as_str())),
        }
        if !query.is_empty() {
            request = request.query(&query);
        }

        let response = ensure_success(request.send().await?).await?;
        let body = response.bytes().await?;
        rows_from_json_bytes(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn records(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> Response {
        let by_header = headers.get("x-api-key").and_then(|v| v.to_str().ok()) == Some("k3y");
        let by_param = q.get("api_key").map(String::as_str) == Some("k3y");
        if !by_header && !by_param {
            return (StatusCode::FORBIDDEN, "denied").into_response();
        }
        if q.get("broken").is_some() {
            return "not json".into_response();
        }
        let region = q.get("region").cloned().unwrap_or_default();
        Json(json!([
            {"region": region, "count": 3, "tags": ["a"]},
            {"region": region, "count": null}
        ]))
        .into_response()
    }

    async fn spawn() -> String {
        let app = Router::new().route("/records", get(records));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/records", addr)
    }

    fn settings(url: String, header: Option<&str>, param: Option<&str>) -> ApiKeySettings {
        ApiKeySettings {
            url,
            api_key: "k3y".to_string(),
            http_header_name: header.map(str::to_string),
            get_parameter_name: param.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_key_in_header_and_params_forwarded() {
        let conn = ApiKeyConnection::new(settings(spawn().await, Some("x-api-key"), None));
        let mut params = ReportParams::new();
        params.insert("region".to_string(), "emea".to_string());
        let rows = conn.fetch_report(&params).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["region"], "emea");
        assert_eq!(rows[0]["tags"], r#"["a"]"#);
        assert_eq!(rows[1]["count"], "");
    }

    #[tokio::test]
    async fn test_key_as_query_parameter() {
        let conn = ApiKeyConnection::new(settings(spawn().await, None, Some("api_key")));
        let rows = conn.fetch_report(&ReportParams::new()).await.unwrap();
        assert_eq!(rows[0]["count"], "3");
    }

    #[tokio::test]
    async fn test_non_json_body_and_rejection() {
        let url = spawn().await;
        let conn = ApiKeyConnection::new(settings(url.clone(), None, Some("api_key")));
        let mut params = ReportParams::new();
        params.insert("broken".to_string(), "1".to_string());
        assert!(matches!(
            conn.fetch_report(&params).await,
            Err(FetchError::MalformedResponse(_))
        ));

        let wrong = ApiKeyConnection::new(settings(url, Some("x-other"), None));
        assert!(matches!(
            wrong.fetch_report(&ReportParams::new()).await,
            Err(FetchError::Status { status: 403, .. })
        ));
    }

    #[tokio::test]
    async fn test_exactly_one_key_placement() {
        let both = ApiKeyConnection::new(settings("http://h".into(), Some("x"), Some("y")));
        assert!(matches!(
            both.authenticate().await,
            Err(AuthError::InvalidSettings(_))
        ));
        let neither = ApiKeyConnection::new(settings("http://h".into(), None, Some(" ")));
        assert!(matches!(
            neither.authenticate().await,
            Err(AuthError::InvalidSettings(_))
        ));
        let mut no_key = settings("http://h".into(), Some("x"), None);
        no_key.api_key.clear();
        assert!(matches!(
            ApiKeyConnection::new(no_key).authenticate().await,
            Err(AuthError::MissingCredential(_))
        ));
    }
}
