//! Delimited-text helpers shared by the table loaders and writers.

use crate::error::Result;
use std::fs::File;
use std::path::Path;

/// Pick the field delimiter from a file extension: comma for `.csv`, tab otherwise.
pub fn delimiter_for<P: AsRef<Path>>(path: P) -> u8 {
    match path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("csv") => b',',
        _ => b'\t',
    }
}

/// Open a delimited reader with the header row treated as data.
///
/// Every loader wants the raw header (sample IDs, column names), so headers
/// are not consumed by the reader. Rows may have differing lengths.
pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<csv::Reader<File>> {
    let delimiter = delimiter_for(&path);
    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    Ok(reader)
}

/// Open a comma-delimited writer.
pub fn open_writer<P: AsRef<Path>>(path: P) -> Result<csv::Writer<File>> {
    Ok(csv::WriterBuilder::new().delimiter(b',').from_path(path)?)
}

/// True for cells that encode a missing value.
pub fn is_missing(raw: &str) -> bool {
    let v = raw.trim();
    v.is_empty() || v.eq_ignore_ascii_case("na") || v.eq_ignore_ascii_case("nan")
}
