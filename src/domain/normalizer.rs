//! Price series normalizer.
//!
//! Turns raw string-keyed rows into a date-ordered [`PriceRecord`] series.
//! Bad rows are skipped with a [`SkipReason`] and logged; they never abort
//! the run.

use crate::domain::price_record::{PriceRecord, RecordedAction};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::warn;

pub const DATE_FORMAT: &str = "%d/%m/%Y";

pub const COL_DATE: &str = "date";
pub const COL_LOW_PRICE: &str = "low price";
pub const COL_PRICE: &str = "price";
pub const COL_HIGHEST_PEAK: &str = "highest peak";
pub const COL_ACTION: &str = "action";

/// One input row, keyed by trimmed lower-case column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    fields: HashMap<String, String>,
    /// Set when the reader could not decode the row at all.
    defect: Option<SkipReason>,
}

impl RawRow {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (normalize_header(k.as_ref()), v.into()))
            .collect();
        RawRow {
            fields,
            defect: None,
        }
    }

    /// Placeholder for a row whose `column` is not valid UTF-8. It keeps its
    /// position in the input so the skip report carries the right row number.
    pub fn undecodable(column: &str) -> Self {
        RawRow {
            fields: HashMap::new(),
            defect: Some(SkipReason::InvalidEncoding(normalize_header(column))),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(&normalize_header(column)).map(String::as_str)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(&normalize_header(column))
    }
}

pub fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingField(&'static str),
    EmptyField(&'static str),
    InvalidDate(String),
    NonNumeric { column: &'static str, value: String },
    NonPositive { column: &'static str, value: f64 },
    DuplicateDate(NaiveDate),
    InvalidEncoding(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingField(col) => write!(f, "missing column '{col}'"),
            SkipReason::EmptyField(col) => write!(f, "empty value in '{col}'"),
            SkipReason::InvalidDate(text) => {
                write!(f, "invalid date '{text}' (expected DD/MM/YYYY)")
            }
            SkipReason::NonNumeric { column, value } => {
                write!(f, "non-numeric value '{value}' in '{column}'")
            }
            SkipReason::NonPositive { column, value } => {
                write!(f, "non-positive value {value} in '{column}'")
            }
            SkipReason::DuplicateDate(date) => write!(f, "duplicate date {date}"),
            SkipReason::InvalidEncoding(col) => write!(f, "invalid UTF-8 in '{col}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Kept(PriceRecord),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// 1-based position of the row in the input, header excluded.
    pub row: usize,
    pub reason: SkipReason,
}

/// Materialised, date-ordered series plus the diagnostics of the rows that
/// did not make it in. Iterating it is free to repeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedSeries {
    pub records: Vec<PriceRecord>,
    pub skipped: Vec<SkippedRow>,
}

impl NormalizedSeries {
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PriceRecord> {
        self.records.iter()
    }

    /// Records dated fewer than `window_days` days after the first record.
    pub fn window(&self, window_days: Option<u32>) -> &[PriceRecord] {
        match (window_days, self.start_date()) {
            (Some(days), Some(start)) => {
                let end = self
                    .records
                    .iter()
                    .position(|r| !within_window(start, r.date, days))
                    .unwrap_or(self.records.len());
                &self.records[..end]
            }
            _ => &self.records,
        }
    }
}

pub fn within_window(start: NaiveDate, date: NaiveDate, window_days: u32) -> bool {
    (date - start).num_days() < i64::from(window_days)
}

fn required<'a>(row: &'a RawRow, column: &'static str) -> Result<&'a str, SkipReason> {
    let value = row.get(column).ok_or(SkipReason::MissingField(column))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(SkipReason::EmptyField(column));
    }
    Ok(value)
}

fn positive_number(row: &RawRow, column: &'static str) -> Result<f64, SkipReason> {
    let text = required(row, column)?;
    let value: f64 = text
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| SkipReason::NonNumeric {
            column,
            value: text.to_string(),
        })?;
    if value <= 0.0 {
        return Err(SkipReason::NonPositive { column, value });
    }
    Ok(value)
}

fn parse_row(row: &RawRow) -> Result<PriceRecord, SkipReason> {
    if let Some(reason) = &row.defect {
        return Err(reason.clone());
    }
    let date_text = required(row, COL_DATE)?;
    let date = NaiveDate::parse_from_str(date_text, DATE_FORMAT)
        .map_err(|_| SkipReason::InvalidDate(date_text.to_string()))?;

    let price_column = if row.has_column(COL_LOW_PRICE) {
        COL_LOW_PRICE
    } else {
        COL_PRICE
    };
    let low_price = positive_number(row, price_column)?;
    let peak_reference = positive_number(row, COL_HIGHEST_PEAK)?;

    let recorded_action = row.get(COL_ACTION).map(RecordedAction::parse);

    Ok(PriceRecord {
        date,
        low_price,
        peak_reference,
        recorded_action,
    })
}

/// Classify a single row.
pub fn normalize_row(row: &RawRow) -> RowOutcome {
    match parse_row(row) {
        Ok(record) => RowOutcome::Kept(record),
        Err(reason) => RowOutcome::Skipped(reason),
    }
}

/// Normalize a whole table. Rows are sorted by date (stable) and a repeated
/// date keeps only its first row.
pub fn normalize<I>(rows: I) -> NormalizedSeries
where
    I: IntoIterator<Item = RawRow>,
{
    let mut kept: Vec<(usize, PriceRecord)> = Vec::new();
    let mut skipped = Vec::new();

    for (idx, row) in rows.into_iter().enumerate() {
        let row_no = idx + 1;
        match normalize_row(&row) {
            RowOutcome::Kept(record) => kept.push((row_no, record)),
            RowOutcome::Skipped(reason) => {
                warn!(row = row_no, %reason, "skipping row");
                skipped.push(SkippedRow {
                    row: row_no,
                    reason,
                });
            }
        }
    }

    kept.sort_by_key(|(_, r)| r.date);

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(kept.len());
    for (row_no, record) in kept {
        if !seen.insert(record.date) {
            let reason = SkipReason::DuplicateDate(record.date);
            warn!(row = row_no, %reason, "skipping row");
            skipped.push(SkippedRow {
                row: row_no,
                reason,
            });
            continue;
        }
        records.push(record);
    }

    skipped.sort_by_key(|s| s.row);
    NormalizedSeries { records, skipped }
}
