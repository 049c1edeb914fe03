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

//! # Spreadsheet Connection
//!
//! Reads Google Sheets through the Sheets v4 REST API.
//!
//! Parameters:
//! - `spreadsheet_id` (required)
//! - `gid` (required): comma-separated sheet ids. The first listed sheet
//!   supplies the header row; every listed sheet contributes data rows.
//! - `header_row` (optional, default 1, must be >= 1)
//!
//! Scanning of each sheet stops at the first row whose first column is blank.
//! Every emitted row carries a `sheet` field holding the sheet's title.

use crate::domain::entities::{ReportParams, Row};
use crate::domain::errors::{AuthError, FetchError};
use crate::infrastructure::connections::http::{build_client, ensure_success};
use crate::infrastructure::connections::normalize::value_to_text;
use crate::ports::connection_port::{required_param, Connection};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";
pub const SHEET_FIELD: &str = "sheet";
const LAST_COLUMN: &str = "ZZ";
const LAST_ROW: usize = 10000;
const GCLOUD_TOKEN_LIFETIME: Duration = Duration::from_secs(45 * 60);

/// Where the OAuth bearer token comes from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    Static(String),
    /// `gcloud auth application-default print-access-token` with
    /// `GOOGLE_APPLICATION_CREDENTIALS` pointing at the key file.
    Gcloud { credentials_file: PathBuf },
}

struct SheetsSession {
    client: Client,
    token: String,
    issued: Instant,
}

pub struct SpreadsheetConnection {
    api_base: String,
    tokens: Option<TokenSource>,
    session: Mutex<Option<SheetsSession>>,
}

/// Raw cell values of one sheet.
#[derive(Debug, Clone, Default)]
pub struct SheetData {
    pub name: String,
    /// Only meaningful for the first sheet.
    pub header: Vec<Value>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SpreadsheetConnection {
    /// `access_token` wins over `credentials_file` when both are set.
    pub fn new(
        credentials_file: Option<PathBuf>,
        access_token: Option<String>,
        api_base: Option<String>,
    ) -> Self {
        let tokens = match (access_token, credentials_file) {
            (Some(token), _) if !token.trim().is_empty() => {
                Some(TokenSource::Static(token.trim().to_string()))
            }
            (_, Some(path)) if !path.as_os_str().is_empty() => Some(TokenSource::Gcloud {
                credentials_file: path,
            }),
            _ => None,
        };
        Self {
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            tokens,
            session: Mutex::new(None),
        }
    }

    async fn session(&self) -> Result<(Client, String), AuthError> {
        let mut guard = self.session.lock().await;
        if let Some(s) = guard.as_ref() {
            let fresh = match self.tokens {
                Some(TokenSource::Gcloud { .. }) => s.issued.elapsed() < GCLOUD_TOKEN_LIFETIME,
                _ => true,
            };
            if fresh {
                return Ok((s.client.clone(), s.token.clone()));
            }
            debug!("Refreshing Google Sheets access token");
        }

        let token = match &self.tokens {
            Some(TokenSource::Static(t)) => t.clone(),
            Some(TokenSource::Gcloud { credentials_file }) => gcloud_token(credentials_file).await?,
            None => {
                return Err(AuthError::MissingCredential(
                    "Google Sheets needs credentials_file or access_token".to_string(),
                ))
            }
        };
        let client = match guard.take() {
            Some(old) => old.client,
            None => build_client()?,
        };
        *guard = Some(SheetsSession {
            client: client.clone(),
            token: token.clone(),
            issued: Instant::now(),
        });
        Ok((client, token))
    }

    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| FetchError::Transport(format!("bad api_base '{}': {}", self.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Transport(format!("bad api_base '{}'", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        client: &Client,
        token: &str,
        url: Url,
    ) -> Result<T, FetchError> {
        let response = client.get(url).bearer_auth(token).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn sheet_titles(
        &self,
        client: &Client,
        token: &str,
        spreadsheet_id: &str,
    ) -> Result<HashMap<i64, String>, FetchError> {
        let url = self.url(
            &["v4", "spreadsheets", spreadsheet_id],
            &[("fields", "sheets.properties")],
        )?;
        let meta: SpreadsheetMeta = self.get_json(client, token, url).await?;
        Ok(meta
            .sheets
            .into_iter()
            .map(|s| (s.properties.sheet_id, s.properties.title))
            .collect())
    }

    async fn values(
        &self,
        client: &Client,
        token: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<Value>>, FetchError> {
        let url = self.url(&["v4", "spreadsheets", spreadsheet_id, "values", range], &[])?;
        let body: ValueRange = self.get_json(client, token, url).await?;
        Ok(body.values)
    }
}

#[async_trait]
impl Connection for SpreadsheetConnection {
    fn kind(&self) -> &'static str {
        "google_sheets"
    }

    async fn authenticate(&self) -> Result<(), AuthError> {
        self.session().await.map(|_| ())
    }

    async fn fetch_report(&self, params: &ReportParams) -> Result<Vec<Row>, FetchError> {
        let spreadsheet_id = required_param(params, "spreadsheet_id")?;
        let gids = parse_gids(required_param(params, "gid")?)?;
        let header_row = parse_header_row(params.get("header_row").map(String::as_str))?;

        let (client, token) = self.session().await?;
        let titles = self.sheet_titles(&client, &token, spreadsheet_id).await?;

        let mut sheets = Vec::with_capacity(gids.len());
        for (i, gid) in gids.iter().enumerate() {
            let name = titles
                .get(gid)
                .cloned()
                .ok_or_else(|| FetchError::invalid("gid", format!("sheet with gid {} not found", gid)))?;
            debug!("Fetching sheet {} (gid {})", name, gid);

            let mut sheet = SheetData {
                name,
                ..Default::default()
            };
            if i == 0 {
                let range = a1_range(&sheet.name, header_row, header_row);
                sheet.header = self
                    .values(&client, &token, spreadsheet_id, &range)
                    .await?
                    .into_iter()
                    .next()
                    .unwrap_or_default();
            }
            if header_row < LAST_ROW {
                let range = a1_range(&sheet.name, header_row + 1, LAST_ROW);
                sheet.rows = self.values(&client, &token, spreadsheet_id, &range).await?;
            }
            sheets.push(sheet);
        }

        parse_sheet_data(&sheets)
    }
}

async fn gcloud_token(credentials_file: &Path) -> Result<String, AuthError> {
    if !credentials_file.is_file() {
        return Err(AuthError::MissingCredential(format!(
            "credentials file {} not found",
            credentials_file.display()
        )));
    }
    let output = tokio::process::Command::new("gcloud")
        .args(["auth", "application-default", "print-access-token"])
        .env("GOOGLE_APPLICATION_CREDENTIALS", credentials_file)
        .output()
        .await
        .map_err(|e| AuthError::Unreachable(format!("could not run gcloud: {}", e)))?;
    if !output.status.success() {
        return Err(AuthError::Rejected(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(AuthError::Rejected("gcloud returned an empty token".to_string()));
    }
    Ok(token)
}

/// End-of-data marker: a row with no cells or a blank first cell.
pub fn first_field_is_blank(row: &[Value]) -> bool {
    row.first()
        .map(|cell| value_to_text(cell).trim().is_empty())
        .unwrap_or(true)
}

pub fn parse_gids(raw: &str) -> Result<Vec<i64>, FetchError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| FetchError::invalid("gid", format!("'{}' is not a sheet id", s)))
        })
        .collect::<Result<Vec<_>, _>>()
        .and_then(|gids| {
            if gids.is_empty() {
                Err(FetchError::MissingParameter("gid".to_string()))
            } else {
                Ok(gids)
            }
        })
}

pub fn parse_header_row(raw: Option<&str>) -> Result<usize, FetchError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(1),
        Some(s) => match s.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n),
            Ok(_) => Err(FetchError::invalid("header_row", "must be >= 1")),
            Err(_) => Err(FetchError::invalid("header_row", format!("'{}' is not a number", s))),
        },
    }
}

/// `'Sheet name'!A{from}:ZZ{to}`
pub fn a1_range(sheet: &str, from: usize, to: usize) -> String {
    format!(
        "'{}'!A{}:{}{}",
        sheet.replace('\'', "''"),
        from,
        LAST_COLUMN,
        to
    )
}

/// Flattens fetched sheets into rows keyed by the first sheet's header.
pub fn parse_sheet_data(sheets: &[SheetData]) -> Result<Vec<Row>, FetchError> {
    let first = sheets
        .first()
        .ok_or_else(|| FetchError::MalformedResponse("no sheets provided".to_string()))?;
    if first.header.is_empty() {
        return Err(FetchError::MalformedResponse(format!(
            "header row is empty in sheet '{}'",
            first.name
        )));
    }
    let header: Vec<String> = first.header.iter().map(value_to_text).collect();

    let mut rows = Vec::new();
    for sheet in sheets {
        let mut taken = 0usize;
        for cells in &sheet.rows {
            if first_field_is_blank(cells) {
                break;
            }
            let mut row: Row = header
                .iter()
                .enumerate()
                .map(|(j, name)| {
                    (
                        name.clone(),
                        cells.get(j).map(value_to_text).unwrap_or_default(),
                    )
                })
                .collect();
            row.insert(SHEET_FIELD.to_string(), sheet.name.clone());
            rows.push(row);
            taken += 1;
        }
        debug!("Sheet {}: {} rows", sheet.name, taken);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    fn cells(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| json!(v)).collect()
    }

    #[test]
    fn test_sentinel_stops_scan_and_excludes_the_blank_row() {
        let sheet = SheetData {
            name: "Q1".to_string(),
            header: cells(&["id", "name"]),
            rows: vec![
                cells(&["1", "A"]),
                cells(&["2", "B"]),
                cells(&["", "ignored"]),
                cells(&["3", "C"]),
            ],
        };
        let rows = parse_sheet_data(&[sheet]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["name"], "B");
        assert_eq!(rows[1][SHEET_FIELD], "Q1");
    }

    #[test]
    fn test_first_field_is_blank() {
        assert!(first_field_is_blank(&[]));
        assert!(first_field_is_blank(&cells(&["   ", "x"])));
        assert!(first_field_is_blank(&[Value::Null]));
        assert!(!first_field_is_blank(&[json!(0)]));
        assert!(!first_field_is_blank(&cells(&["a"])));
    }

    #[test]
    fn test_later_sheets_use_first_header_and_keep_listing_order() {
        let a = SheetData {
            name: "A".to_string(),
            header: cells(&["k", "v"]),
            rows: vec![cells(&["a1", "1"])],
        };
        let b = SheetData {
            name: "B".to_string(),
            header: Vec::new(),
            rows: vec![cells(&["b1"]), cells(&["b2", "2", "extra"]), Vec::new()],
        };
        let rows = parse_sheet_data(&[a, b]).unwrap();
        let keys: Vec<&str> = rows[1].keys().map(String::as_str).collect();
        assert_eq!(keys, ["k", "v", SHEET_FIELD]);
        let order: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r["k"].as_str(), r[SHEET_FIELD].as_str()))
            .collect();
        assert_eq!(order, [("a1", "A"), ("b1", "B"), ("b2", "B")]);
        assert_eq!(rows[1]["v"], "");
    }

    #[test]
    fn test_empty_header_is_an_error() {
        let sheet = SheetData {
            name: "Empty".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            parse_sheet_data(&[sheet]),
            Err(FetchError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parameter_parsing() {
        assert_eq!(parse_gids("0, 12 ,7").unwrap(), vec![0, 12, 7]);
        assert!(matches!(parse_gids("x"), Err(FetchError::InvalidParameter { .. })));
        assert!(matches!(parse_gids(" , "), Err(FetchError::MissingParameter(_))));
        assert_eq!(parse_header_row(None).unwrap(), 1);
        assert_eq!(parse_header_row(Some("3")).unwrap(), 3);
        assert!(parse_header_row(Some("0")).is_err());
        assert!(parse_header_row(Some("abc")).is_err());
        assert_eq!(a1_range("Bob's", 2, 10000), "'Bob''s'!A2:ZZ10000");
    }

    #[tokio::test]
    async fn test_missing_spreadsheet_id_fails_before_any_request() {
        let conn = SpreadsheetConnection::new(None, None, Some("http://127.0.0.1:9".to_string()));
        let mut params = ReportParams::new();
        params.insert("gid".to_string(), "0".to_string());
        let err = conn.fetch_report(&params).await.unwrap_err();
        assert!(matches!(err, FetchError::MissingParameter(p) if p == "spreadsheet_id"));
    }

    #[tokio::test]
    async fn test_authenticate_without_credentials_fails() {
        let conn = SpreadsheetConnection::new(None, None, None);
        assert!(matches!(
            conn.authenticate().await,
            Err(AuthError::MissingCredential(_))
        ));
    }

    async fn spreadsheet_meta(Path(_id): Path<String>) -> Json<Value> {
        Json(json!({"sheets": [
            {"properties": {"sheetId": 0, "title": "Main"}},
            {"properties": {"sheetId": 42, "title": "Extra"}}
        ]}))
    }

    async fn sheet_values(
        headers: HeaderMap,
        Path((_id, range)): Path<(String, String)>,
    ) -> Result<Json<Value>, StatusCode> {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer t0k") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        let body = match range.as_str() {
            "'Main'!A1:ZZ1" => json!({"values": [["id", "name"]]}),
            "'Main'!A2:ZZ10000" => json!({"values": [["1", "A"], ["2", "B"], [""], ["9", "Z"]]}),
            "'Extra'!A2:ZZ10000" => json!({"values": [["3", "C"]]}),
            _ => json!({}),
        };
        Ok(Json(body))
    }

    async fn spawn_sheets_api() -> String {
        let app = Router::new()
            .route("/v4/spreadsheets/:id", get(spreadsheet_meta))
            .route("/v4/spreadsheets/:id/values/:range", get(sheet_values));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_report_against_mock_api() {
        let base = spawn_sheets_api().await;
        let conn = SpreadsheetConnection::new(None, Some("t0k".to_string()), Some(base));
        let mut params = ReportParams::new();
        params.insert("spreadsheet_id".to_string(), "abc".to_string());
        params.insert("gid".to_string(), "0,42".to_string());

        let rows = conn.fetch_report(&params).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2]["id"], "3");
        assert_eq!(rows[2][SHEET_FIELD], "Extra");

        params.insert("gid".to_string(), "99".to_string());
        assert!(matches!(
            conn.fetch_report(&params).await,
            Err(FetchError::InvalidParameter { .. })
        ));
    }
}
