//! Sheet reading
//!
//! Input files are CSV with a header row naming columns. The byte stream is
//! transcoded to UTF-8 before parsing (BOM sniffing, then a windows-1252
//! fallback for non-UTF-8 input), and columns are resolved by header name so
//! column order in the file is arbitrary.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::RawRecord;

/// Sheet reading errors; these fail the whole job, not a single row
#[derive(Debug, Error)]
pub enum IngestError {
    /// Sheet file missing or unreadable
    #[error("Cannot read sheet {0}: {1}")]
    Read(PathBuf, std::io::Error),

    /// Malformed CSV
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// First row is missing or has no usable column names
    #[error("Sheet has no usable header row")]
    MissingHeader,
}

/// One page of decoded rows
#[derive(Debug)]
pub struct SheetPage {
    /// (1-based file line, record); the header row is line 1
    pub rows: Vec<(u64, RawRecord)>,
    /// True when the sheet has no rows past this page
    pub exhausted: bool,
}

/// Read up to `limit` data rows starting at 0-based row offset `skip_rows`
pub fn read_page(path: &Path, skip_rows: usize, limit: usize) -> Result<SheetPage, IngestError> {
    let bytes =
        std::fs::read(path).map_err(|e| IngestError::Read(path.to_path_buf(), e))?;
    let (text, encoding) = decode_bytes(&bytes);
    if encoding != "UTF-8" {
        tracing::debug!(sheet = %path.display(), encoding = %encoding, "Transcoded sheet");
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(IngestError::MissingHeader);
    }

    let mut rows = Vec::new();
    let mut exhausted = true;

    for (index, result) in reader.records().enumerate() {
        if index < skip_rows {
            continue;
        }
        if rows.len() == limit {
            exhausted = false;
            break;
        }

        let record = result?;
        let mut raw = RawRecord::new();
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            raw.push(header, record.get(i).unwrap_or("").to_string());
        }
        // Header is line 1, first data row is line 2
        rows.push(((index + 2) as u64, raw));
    }

    Ok(SheetPage { rows, exhausted })
}

/// Decode sheet bytes to UTF-8, auto-detecting the source encoding
pub fn decode_bytes(bytes: &[u8]) -> (String, &'static str) {
    if let Some((encoding, _bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_with_bom_removal(bytes);
        return (text.into_owned(), encoding.name());
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), "UTF-8"),
        Err(_) => {
            let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            (text.into_owned(), encoding_rs::WINDOWS_1252.name())
        }
    }
}
