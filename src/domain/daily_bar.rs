//! Daily bar as returned by a market-data provider.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

impl DailyBar {
    /// All price fields are finite and positive.
    pub fn is_complete(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> DailyBar {
        DailyBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            adj_close: 104.5,
            volume: 50_000,
        }
    }

    #[test]
    fn complete_bar() {
        assert!(sample_bar().is_complete());
    }

    #[test]
    fn nan_price_is_incomplete() {
        let bar = DailyBar {
            low: f64::NAN,
            ..sample_bar()
        };
        assert!(!bar.is_complete());
    }

    #[test]
    fn zero_price_is_incomplete() {
        let bar = DailyBar {
            open: 0.0,
            ..sample_bar()
        };
        assert!(!bar.is_complete());
    }
}
