//! Bid record loading and writing.
//!
//! The input sheet is a CSV with a header row. Only the URL and platform
//! columns matter for validation; every other cell is carried through to the
//! output untouched.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::config::InputConfig;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Failed to read input file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Input file {path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },
}

/// One landing page row from the input sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct BidRecord {
    /// 1-based data row number in the input file (header excluded)
    pub row: usize,
    pub url: String,
    pub platform: String,
    /// All cells of the row, in header order
    pub cells: Vec<String>,
}

/// A loaded input sheet.
#[derive(Debug, Clone)]
pub struct BidSheet {
    pub headers: Vec<String>,
    pub url_index: usize,
    pub platform_index: usize,
    pub records: Vec<BidRecord>,
    /// Rows skipped for a missing URL or platform
    pub dropped: usize,
}

impl BidSheet {
    /// Cells to write for `record`, with its (possibly rewritten) URL in place.
    pub fn output_row(&self, record: &BidRecord) -> Vec<String> {
        let mut cells = record.cells.clone();
        if cells.len() < self.headers.len() {
            cells.resize(self.headers.len(), String::new());
        }
        cells[self.url_index] = record.url.clone();
        cells
    }
}

/// Load the input sheet, dropping rows whose URL or platform cell is blank.
pub fn load_sheet(path: &Path, input: &InputConfig) -> Result<BidSheet, RecordError> {
    if !path.exists() {
        return Err(RecordError::InputNotFound(path.to_path_buf()));
    }

    let read_error = |source: csv::Error| RecordError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(read_error)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(read_error)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let column_index = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| RecordError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let url_index = column_index(&input.url_column)?;
    let platform_index = column_index(&input.platform_column)?;

    let mut records = Vec::new();
    let mut dropped = 0;

    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(read_error)?;

        let url = record.get(url_index).map(str::trim).unwrap_or_default();
        let platform = record.get(platform_index).map(str::trim).unwrap_or_default();
        if url.is_empty() || platform.is_empty() {
            debug!("Dropping row {}: missing URL or platform", i + 1);
            dropped += 1;
            continue;
        }

        let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
        cells.resize(headers.len().max(cells.len()), String::new());

        records.push(BidRecord {
            row: i + 1,
            url: url.to_string(),
            platform: platform.to_string(),
            cells,
        });
    }

    Ok(BidSheet {
        headers,
        url_index,
        platform_index,
        records,
        dropped,
    })
}

/// Write `records` as CSV with the sheet's header row.
pub fn write_sheet<W: io::Write>(writer: W, sheet: &BidSheet, records: &[BidRecord]) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(writer);

    wtr.write_record(&sheet.headers)?;
    for record in records {
        wtr.write_record(sheet.output_row(record))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write `records` to a new file at `path`, replacing any existing file.
pub fn write_sheet_to_path(path: &Path, sheet: &BidSheet, records: &[BidRecord]) -> io::Result<()> {
    let file = File::create(path)?;
    write_sheet(file, sheet, records)
}
