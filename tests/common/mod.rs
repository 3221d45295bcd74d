#![allow(dead_code)]

use chrono::NaiveDate;
use dipladder::domain::daily_bar::DailyBar;
use dipladder::domain::error::DipLadderError;
use dipladder::domain::ladder::{AnchorPolicy, RunMode, SellPolicy, SimulationConfig};
pub use dipladder::domain::price_record::{PriceRecord, RecordedAction};
use dipladder::ports::data_port::PriceDataPort;
use dipladder::ports::publish_port::{PublishOutcome, PublishPort, PublishRequest};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<DailyBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<DailyBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl PriceDataPort for MockDataPort {
    fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, DipLadderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(DipLadderError::DataFetch {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && b.date < end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Records every request; answers from a fixed table of existing SHAs.
pub struct MockPublisher {
    pub existing: HashMap<String, String>,
    pub outcome: Option<PublishOutcome>,
    pub requests: RefCell<Vec<PublishRequest>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self {
            existing: HashMap::new(),
            outcome: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_existing(mut self, path: &str, sha: &str) -> Self {
        self.existing.insert(path.to_string(), sha.to_string());
        self
    }

    pub fn always(mut self, outcome: PublishOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }
}

impl PublishPort for MockPublisher {
    fn existing_sha(&self, path: &str) -> Result<Option<String>, DipLadderError> {
        Ok(self.existing.get(path).cloned())
    }

    fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, DipLadderError> {
        self.requests.borrow_mut().push(request.clone());
        Ok(self.outcome.unwrap_or(if request.sha.is_some() {
            PublishOutcome::Updated
        } else {
            PublishOutcome::Created
        }))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn day(n: u32) -> NaiveDate {
    date(2024, 1, 1) + chrono::Duration::days(i64::from(n))
}

pub fn record(n: u32, low: f64, peak: f64, action: RecordedAction) -> PriceRecord {
    PriceRecord::new(day(n), low, peak).with_action(action)
}

pub fn sample_config() -> SimulationConfig {
    SimulationConfig {
        initial_cash: 5000.0,
        investment_per_buy: 5000.0,
        drop_step: 0.05,
        window_days: None,
        anchor: AnchorPolicy::ExternalPeak,
        sell: SellPolicy::PopOne,
        mode: RunMode::Validation,
    }
}

pub fn ladder_config(initial_cash: f64, per_buy: f64) -> SimulationConfig {
    SimulationConfig {
        initial_cash,
        investment_per_buy: per_buy,
        ..sample_config()
    }
}

pub fn make_bar(date_str: &str, low: f64) -> DailyBar {
    DailyBar {
        date: NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap(),
        open: low + 1.0,
        high: low + 2.0,
        low,
        close: low + 1.5,
        adj_close: low + 1.5,
        volume: 1000,
    }
}

pub fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
