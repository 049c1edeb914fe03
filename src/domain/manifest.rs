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

//! # Manifest Document
//!
//! The manifest is what a BI catalog tool reads to find every CSV ever
//! published for a report. It has exactly one `fileLocations` entry whose
//! `URIs` list is unique and kept in first-seen order.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "fileLocations", default)]
    pub file_locations: Vec<FileLocation>,
    #[serde(rename = "globalUploadSettings", default)]
    pub global_upload_settings: UploadSettings,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileLocation {
    #[serde(rename = "URIs", default)]
    pub uris: Vec<String>,
}

/// Static description of the artifacts' CSV dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub format: String,
    pub delimiter: String,
    #[serde(rename = "textqualifier")]
    pub text_qualifier: String,
    #[serde(rename = "containsHeader")]
    pub contains_header: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            format: "CSV".to_string(),
            delimiter: ",".to_string(),
            text_qualifier: "\"".to_string(),
            contains_header: "true".to_string(),
        }
    }
}

impl Manifest {
    /// Builds a manifest over `locations`, dropping repeats after their first occurrence.
    pub fn new(locations: Vec<String>) -> Self {
        let mut uris: Vec<String> = Vec::with_capacity(locations.len());
        for loc in locations {
            if !uris.contains(&loc) {
                uris.push(loc);
            }
        }
        Self {
            file_locations: vec![FileLocation { uris }],
            global_upload_settings: UploadSettings::default(),
        }
    }

    /// Parses a stored manifest. Only `fileLocations[0].URIs` is read back;
    /// the rest of the document is rewritten from defaults, so fields written
    /// by another producer never cost the stored locations. Anything
    /// unreadable is treated as an empty manifest so a corrupt file never
    /// fails a run.
    pub fn from_json_lenient(bytes: &[u8]) -> Self {
        let doc = match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("Ignoring unreadable manifest: {}", e);
                return Manifest::new(Vec::new());
            }
        };
        let uris = doc
            .get("fileLocations")
            .and_then(|locs| locs.get(0))
            .and_then(|loc| loc.get("URIs"))
            .and_then(serde_json::Value::as_array)
            .map(|uris| {
                uris.iter()
                    .filter_map(|u| u.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Manifest::new(uris)
    }

    pub fn locations(&self) -> &[String] {
        self.file_locations
            .first()
            .map(|loc| loc.uris.as_slice())
            .unwrap_or(&[])
    }

    /// Appends `location` unless it is already present (exact match).
    /// Returns whether the list changed.
    pub fn merge_location(&mut self, location: &str) -> bool {
        if self.file_locations.is_empty() {
            self.file_locations.push(FileLocation::default());
        }
        let uris = &mut self.file_locations[0].uris;
        if uris.iter().any(|u| u == location) {
            return false;
        }
        uris.push(location.to_string());
        true
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_same_location_twice_keeps_one_copy() {
        let mut m = Manifest::new(vec!["s3://b/r/1.csv".into()]);
        assert!(m.merge_location("s3://b/r/2.csv"));
        assert!(!m.merge_location("s3://b/r/1.csv"));
        assert!(!m.merge_location("s3://b/r/2.csv"));
        assert_eq!(m.locations(), &["s3://b/r/1.csv", "s3://b/r/2.csv"]);
    }

    #[test]
    fn test_merge_preserves_first_seen_order_after_existing_entries() {
        let mut m = Manifest::new(vec!["old-a".into(), "old-b".into()]);
        for loc in ["n1", "n2", "old-a", "n3"] {
            m.merge_location(loc);
        }
        assert_eq!(m.locations(), &["old-a", "old-b", "n1", "n2", "n3"]);
    }

    #[test]
    fn test_lenient_parse_of_garbage_is_empty() {
        let m = Manifest::from_json_lenient(b"{not json");
        assert!(m.locations().is_empty());
        assert_eq!(m.file_locations.len(), 1);
    }

    #[test]
    fn test_lenient_parse_drops_duplicate_entries() {
        let raw = br#"{"fileLocations":[{"URIs":["a","b","a"]}],"globalUploadSettings":{"format":"CSV","delimiter":",","textqualifier":"\"","containsHeader":"true"}}"#;
        let m = Manifest::from_json_lenient(raw);
        assert_eq!(m.locations(), &["a", "b"]);
    }

    #[test]
    fn test_merge_into_manifest_from_another_producer_keeps_locations() {
        let raw = br#"{"fileLocations":[{"URIs":["s3://b/r/1.csv","s3://b/r/2.csv"]}],"globalUploadSettings":{"format":"CSV"},"catalog":"bi"}"#;
        let mut m = Manifest::from_json_lenient(raw);
        assert!(m.merge_location("s3://b/r/3.csv"));
        assert_eq!(
            m.locations(),
            &["s3://b/r/1.csv", "s3://b/r/2.csv", "s3://b/r/3.csv"]
        );
        assert_eq!(m.global_upload_settings, UploadSettings::default());
    }

    #[test]
    fn test_upload_settings_fill_missing_fields_from_defaults() {
        let s: UploadSettings = serde_json::from_str(r#"{"delimiter":";"}"#).unwrap();
        assert_eq!(s.delimiter, ";");
        assert_eq!(s.format, "CSV");
        assert_eq!(s.contains_header, "true");
    }

    #[test]
    fn test_serialized_layout() {
        let m = Manifest::new(vec!["s3://bucket/x.csv".into()]);
        let v: serde_json::Value = serde_json::from_slice(&m.to_json_pretty().unwrap()).unwrap();
        assert_eq!(v["fileLocations"][0]["URIs"][0], "s3://bucket/x.csv");
        assert_eq!(v["globalUploadSettings"]["format"], "CSV");
        assert_eq!(v["globalUploadSettings"]["delimiter"], ",");
        assert_eq!(v["globalUploadSettings"]["textqualifier"], "\"");
        assert_eq!(v["globalUploadSettings"]["containsHeader"], "true");
    }
}
