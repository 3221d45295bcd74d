//! Market-data port trait.

use crate::domain::daily_bar::DailyBar;
use crate::domain::error::DipLadderError;
use chrono::NaiveDate;

pub trait PriceDataPort {
    /// Daily bars for `symbol` in `[start, end)`, ascending by date. A symbol
    /// without data yields an empty vector rather than an error.
    fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, DipLadderError>;
}
