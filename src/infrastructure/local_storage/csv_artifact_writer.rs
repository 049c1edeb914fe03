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

//! # CSV Artifact Writer
//!
//! Persists one run's rows as `staging_dir/<report>/<YYYY-MM-DD.HH.MM.SS>.csv`.
//! The header comes from the first row's field order; a row missing one of
//! those fields gets an empty cell there.

use crate::domain::entities::{Artifact, Row};
use crate::domain::errors::{RelayError, Result};
use chrono::{DateTime, Local};
use csv::WriterBuilder;
use log::debug;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

const FILE_NAME_FORMAT: &str = "%Y-%m-%d.%H.%M.%S.csv";

pub fn artifact_file_name(at: DateTime<Local>) -> String {
    at.format(FILE_NAME_FORMAT).to_string()
}

/// Column names, in the order the first row carries them.
pub fn header_of(rows: &[Row]) -> Vec<String> {
    rows.first()
        .map(|r| r.keys().cloned().collect())
        .unwrap_or_default()
}

/// Writes a header line plus one record per row, every record exactly as
/// wide as the header.
pub fn write_rows<W: Write>(out: W, rows: &[Row]) -> Result<()> {
    let header = header_of(rows);
    let mut wtr = WriterBuilder::new().from_writer(out);
    wtr.write_record(&header)?;
    for row in rows {
        wtr.write_record(
            header
                .iter()
                .map(|name| row.get(name).map(String::as_str).unwrap_or("")),
        )?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvArtifactWriter;

impl CsvArtifactWriter {
    /// Creates the report's staging subdirectory if needed and writes a new,
    /// exclusively created file. A file left half-written by an error is removed.
    pub fn write_artifact(
        &self,
        report: &str,
        staging_dir: &Path,
        rows: &[Row],
        at: DateTime<Local>,
    ) -> Result<Artifact> {
        let dir = staging_dir.join(report);
        fs::create_dir_all(&dir)?;

        let file_name = artifact_file_name(at);
        let path = dir.join(&file_name);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                RelayError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("cannot create {}: {}", path.display(), e),
                ))
            })?;

        if let Err(e) = write_rows(BufWriter::new(file), rows) {
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        debug!("Wrote {} rows to {}", rows.len(), path.display());

        Ok(Artifact {
            report: report.to_string(),
            path,
            file_name,
            rows: rows.len(),
        })
    }
}
