//! Yahoo Finance market-data adapter.
//!
//! Fetches daily bars from Yahoo's v8 chart API with retry and exponential
//! backoff. Yahoo has no official API and its format changes without notice;
//! parse failures surface as `DataFetch` errors for the symbol.

use crate::domain::daily_bar::DailyBar;
use crate::domain::error::DipLadderError;
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

fn fetch_error(symbol: &str, reason: impl Into<String>) -> DipLadderError {
    DipLadderError::DataFetch {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

impl YahooAdapter {
    pub fn new(base_url: &str) -> Result<Self, DipLadderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| fetch_error("*", format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Chart URL for `symbol`, appended as a single path segment. `end` is
    /// exclusive: `period2` is midnight at the start of that day.
    fn chart_url(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Url, DipLadderError> {
        let start_ts = start.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp());
        let end_ts = end.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp());
        let (Some(start_ts), Some(end_ts)) = (start_ts, end_ts) else {
            return Err(fetch_error(symbol, "invalid date range"));
        };

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| fetch_error(symbol, format!("invalid base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| fetch_error(symbol, "base url cannot take a path"))?
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("period1", &start_ts.to_string())
            .append_pair("period2", &end_ts.to_string())
            .append_pair("interval", "1d")
            .append_pair("includeAdjustedClose", "true");
        Ok(url)
    }

    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<DailyBar>, DipLadderError> {
        let result = match (resp.chart.result, resp.chart.error) {
            (Some(result), _) => result,
            (None, Some(err)) if err.code == "Not Found" => return Ok(Vec::new()),
            (None, Some(err)) => {
                return Err(fetch_error(
                    symbol,
                    format!("{}: {}", err.code, err.description),
                ));
            }
            (None, None) => return Err(fetch_error(symbol, "empty result with no error")),
        };

        let Some(data) = result.into_iter().next() else {
            return Ok(Vec::new());
        };
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };
        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| fetch_error(symbol, "no quote data"))?;
        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| fetch_error(symbol, format!("invalid timestamp: {ts}")))?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Non-trading days come back as all-null rows.
            let (Some(open), Some(high), Some(low), Some(close)) = (open, high, low, close) else {
                debug!(symbol, %date, "dropping incomplete bar");
                continue;
            };
            let adj_close = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten())
                .unwrap_or(close);

            bars.push(DailyBar {
                date,
                open,
                high,
                low,
                close,
                adj_close,
                volume: volume.unwrap_or(0),
            });
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Ok(bars)
    }

    fn fetch_with_retry(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, DipLadderError> {
        let url = self.chart_url(symbol, start, end)?;
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(symbol, attempt, ?delay, "retrying");
                std::thread::sleep(delay);
            }

            let resp = match self.client.get(url.clone()).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(symbol, error = %e, "network error");
                    last_error = Some(fetch_error(symbol, e.to_string()));
                    continue;
                }
                Err(e) => return Err(fetch_error(symbol, e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(Vec::new());
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!(symbol, %status, "provider refused request");
                last_error = Some(fetch_error(symbol, format!("HTTP {status}")));
                continue;
            }
            if !status.is_success() {
                return Err(fetch_error(symbol, format!("HTTP {status}")));
            }

            let chart: ChartResponse = resp
                .json()
                .map_err(|e| fetch_error(symbol, format!("failed to parse response: {e}")))?;
            return Self::parse_response(symbol, chart);
        }

        Err(last_error.unwrap_or_else(|| fetch_error(symbol, "max retries exceeded")))
    }
}

impl PriceDataPort for YahooAdapter {
    fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, DipLadderError> {
        self.fetch_with_retry(symbol, start, end)
    }
}
