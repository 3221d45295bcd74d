//! CSV file adapter: raw price rows in, daily bar files out.

use crate::domain::daily_bar::DailyBar;
use crate::domain::error::DipLadderError;
use crate::domain::normalizer::{normalize, NormalizedSeries, RawRow, DATE_FORMAT};
use std::fs;
use std::path::Path;

pub const DAILY_BAR_HEADER: [&str; 7] =
    ["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"];

fn read_error(reason: impl Into<String>) -> DipLadderError {
    DipLadderError::DataRead {
        reason: reason.into(),
    }
}

pub fn parse_rows(content: &str) -> Result<Vec<RawRow>, DipLadderError> {
    parse_bytes(content.as_bytes())
}

/// Parse CSV bytes with a header row into raw rows. Short rows simply lack
/// the trailing columns and a field that is not UTF-8 turns its row into an
/// undecodable placeholder; the normalizer decides what to do with both.
pub fn parse_bytes(content: &[u8]) -> Result<Vec<RawRow>, DipLadderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let headers: Vec<String> = rdr
        .byte_headers()
        .map_err(|e| read_error(format!("CSV header error: {}", e)))?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.byte_records() {
        let record = result.map_err(|e| read_error(format!("CSV parse error: {}", e)))?;
        rows.push(decode_row(&headers, &record));
    }
    Ok(rows)
}

fn decode_row(headers: &[String], record: &csv::ByteRecord) -> RawRow {
    let mut pairs = Vec::with_capacity(record.len());
    for (header, value) in headers.iter().zip(record.iter()) {
        match std::str::from_utf8(value) {
            Ok(text) => pairs.push((header.as_str(), text.to_string())),
            Err(_) => return RawRow::undecodable(header),
        }
    }
    RawRow::from_pairs(pairs)
}

pub fn read_rows(path: &Path) -> Result<Vec<RawRow>, DipLadderError> {
    let content = fs::read(path)
        .map_err(|e| read_error(format!("failed to read {}: {}", path.display(), e)))?;
    parse_bytes(&content)
}

/// Read and normalize a price file in one go.
pub fn read_series(path: &Path) -> Result<NormalizedSeries, DipLadderError> {
    Ok(normalize(read_rows(path)?))
}

/// Encode bars as CSV with `DD/MM/YYYY` dates.
pub fn write_daily_bars(bars: &[DailyBar]) -> Result<Vec<u8>, DipLadderError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    let write_err = |e: csv::Error| read_error(format!("CSV write error: {}", e));

    wtr.write_record(DAILY_BAR_HEADER).map_err(write_err)?;
    for bar in bars {
        wtr.write_record([
            bar.date.format(DATE_FORMAT).to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.adj_close.to_string(),
            bar.volume.to_string(),
        ])
        .map_err(write_err)?;
    }

    wtr.into_inner()
        .map_err(|e| read_error(format!("CSV flush error: {}", e)))
}
