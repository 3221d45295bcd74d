//! Publish pipeline: fetch, write and publish daily price files, one symbol at a time.
//!
//! Each symbol is handled independently: a failure is logged, recorded in
//! its [`SymbolReport`] and the loop moves on to the next symbol.

use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

use crate::adapters::csv_adapter::write_daily_bars;
use crate::domain::error::DipLadderError;
use crate::ports::data_port::PriceDataPort;
use crate::ports::publish_port::{PublishOutcome, PublishPort, PublishRequest};

/// Keep word characters only: letters, digits and underscore.
pub fn sanitize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

pub fn csv_filename(sanitized: &str) -> String {
    format!("{}_stock_data.csv", sanitized.to_lowercase())
}

pub fn commit_message(sanitized: &str, existing: bool) -> String {
    if existing {
        format!("Update {sanitized} stock data")
    } else {
        format!("Create {sanitized} stock data")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolStatus {
    Published(PublishOutcome),
    NoData,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolReport {
    pub symbol: String,
    pub file_name: String,
    pub bars: usize,
    pub status: SymbolStatus,
}

impl SymbolReport {
    pub fn succeeded(&self) -> bool {
        matches!(
            self.status,
            SymbolStatus::Published(PublishOutcome::Created | PublishOutcome::Updated)
        )
    }
}

fn publish_symbol(
    data_port: &dyn PriceDataPort,
    publisher: &dyn PublishPort,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    output_dir: Option<&Path>,
) -> Result<(usize, SymbolStatus), DipLadderError> {
    let sanitized = sanitize_symbol(symbol);
    let file_name = csv_filename(&sanitized);

    info!(symbol, %start, %end, "fetching data");
    let bars = data_port.fetch_daily(symbol, start, end)?;
    if bars.is_empty() {
        warn!(symbol, "no data found, skipping");
        return Ok((0, SymbolStatus::NoData));
    }

    let content = write_daily_bars(&bars)?;
    if let Some(dir) = output_dir {
        let local = dir.join(&file_name);
        info!(path = %local.display(), "writing local copy");
        fs::write(&local, &content)?;
    }

    let sha = publisher.existing_sha(&file_name)?;
    let existing = sha.is_some();
    if existing {
        info!(file = %file_name, "updating existing file");
    } else {
        info!(file = %file_name, "creating new file");
    }

    let request = PublishRequest {
        path: file_name.clone(),
        content,
        message: commit_message(&sanitized, existing),
        sha,
    };
    let outcome = publisher.publish(&request)?;
    match outcome {
        PublishOutcome::Created | PublishOutcome::Updated => {
            info!(file = %file_name, ?outcome, "published")
        }
        PublishOutcome::Conflict | PublishOutcome::NotFound => {
            warn!(file = %file_name, ?outcome, "publish rejected")
        }
    }
    Ok((bars.len(), SymbolStatus::Published(outcome)))
}

pub fn run_publish_pipeline(
    data_port: &dyn PriceDataPort,
    publisher: &dyn PublishPort,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
    output_dir: Option<&Path>,
) -> Vec<SymbolReport> {
    symbols
        .iter()
        .map(|symbol| {
            let file_name = csv_filename(&sanitize_symbol(symbol));
            let (bars, status) =
                match publish_symbol(data_port, publisher, symbol, start, end, output_dir) {
                    Ok(done) => done,
                    Err(e) => {
                        error!(symbol = %symbol, error = %e, "processing failed");
                        (0, SymbolStatus::Failed(e.to_string()))
                    }
                };
            SymbolReport {
                symbol: symbol.clone(),
                file_name,
                bars,
                status,
            }
        })
        .collect()
}
