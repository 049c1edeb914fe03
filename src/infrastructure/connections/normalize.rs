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

//! # Row Normalization
//!
//! Converts API payloads (JSON documents or CSV bodies) into `Row`s.

use crate::domain::entities::Row;
use crate::domain::errors::FetchError;
use csv::ReaderBuilder;
use serde_json::Value;

/// Field name used when a JSON array holds scalars instead of records.
pub const SCALAR_FIELD: &str = "value";

/// Text form of a JSON value as written to CSV.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn object_to_row(map: &serde_json::Map<String, Value>) -> Row {
    map.iter()
        .map(|(k, v)| (k.clone(), value_to_text(v)))
        .collect()
}

/// Accepts an array of records, a single record, an array of scalars or `null`.
pub fn rows_from_json(value: &Value) -> Result<Vec<Row>, FetchError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(vec![object_to_row(map)]),
        Value::Array(items) => Ok(items
            .iter()
            .map(|item| match item {
                Value::Object(map) => object_to_row(map),
                other => {
                    let mut row = Row::new();
                    row.insert(SCALAR_FIELD.to_string(), value_to_text(other));
                    row
                }
            })
            .collect()),
        other => Err(FetchError::MalformedResponse(format!(
            "expected a JSON array or object, got {}",
            other
        ))),
    }
}

pub fn rows_from_json_bytes(body: &[u8]) -> Result<Vec<Row>, FetchError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| FetchError::MalformedResponse(format!("invalid JSON: {}", e)))?;
    rows_from_json(&value)
}

/// Parses a CSV body whose first record is the header. Leading whitespace of
/// every field is dropped, trailing whitespace is kept. Short records are
/// padded with empty strings; surplus fields are dropped.
pub fn rows_from_csv(body: &[u8]) -> Result<Vec<Row>, FetchError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body);

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => {
            record.map_err(|e| FetchError::MalformedResponse(format!("invalid CSV: {}", e)))?
        }
        None => return Ok(Vec::new()),
    };

    let mut rows = Vec::new();
    for record in records {
        let record =
            record.map_err(|e| FetchError::MalformedResponse(format!("invalid CSV: {}", e)))?;
        let row: Row = header
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = record.get(i).unwrap_or("").trim_start();
                (name.trim_start().to_string(), value.to_string())
            })
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_records_keep_key_order() {
        let rows = rows_from_json(&json!([
            {"zeta": 1, "alpha": "a", "nested": {"k": [1, 2]}, "gone": null},
            {"alpha": "b"}
        ]))
        .unwrap();
        assert_eq!(rows.len(), 2);
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha", "nested", "gone"]);
        assert_eq!(rows[0]["zeta"], "1");
        assert_eq!(rows[0]["nested"], r#"{"k":[1,2]}"#);
        assert_eq!(rows[0]["gone"], "");
    }

    #[test]
    fn test_json_shapes() {
        assert_eq!(rows_from_json(&json!({"a": true})).unwrap()[0]["a"], "true");
        assert!(rows_from_json(&Value::Null).unwrap().is_empty());
        let scalars = rows_from_json(&json!([1, "x"])).unwrap();
        assert_eq!(scalars[1][SCALAR_FIELD], "x");
        assert!(matches!(
            rows_from_json(&json!(42)),
            Err(FetchError::MalformedResponse(_))
        ));
        assert!(matches!(
            rows_from_json_bytes(b"<html>"),
            Err(FetchError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_csv_pads_short_records_and_trims() {
        let body = b"id, name, note\n1, Alice, hi\n2,Bob\n";
        let rows = rows_from_csv(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Alice");
        assert_eq!(rows[1]["note"], "");
        let keys: Vec<&str> = rows[1].keys().map(String::as_str).collect();
        assert_eq!(keys, ["id", "name", "note"]);
    }

    #[test]
    fn test_csv_keeps_trailing_whitespace() {
        let rows = rows_from_csv(b"code,label
  A1 , padded  
").unwrap();
        assert_eq!(rows[0]["code"], "A1 ");
        assert_eq!(rows[0]["label"], "padded  ");
    }

    #[test]
    fn test_empty_csv_is_zero_rows() {
        assert!(rows_from_csv(b"").unwrap().is_empty());
        assert!(rows_from_csv(b"id,name\n").unwrap().is_empty());
    }
}
