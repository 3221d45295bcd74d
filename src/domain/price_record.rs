//! Daily price record consumed by the simulator.

use chrono::NaiveDate;
use std::fmt;

/// Action label carried by validation datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedAction {
    Buy,
    Sell,
    None,
}

impl RecordedAction {
    /// Case-insensitive match against `buy` / `sell`; anything else is `None`.
    pub fn parse(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "buy" => RecordedAction::Buy,
            "sell" => RecordedAction::Sell,
            _ => RecordedAction::None,
        }
    }
}

impl fmt::Display for RecordedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordedAction::Buy => "buy",
            RecordedAction::Sell => "sell",
            RecordedAction::None => "none",
        };
        f.write_str(s)
    }
}

/// One trading day. `low_price` and `peak_reference` are always positive.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub low_price: f64,
    /// Precomputed "highest peak" for the day, supplied upstream.
    pub peak_reference: f64,
    /// Present only when the dataset carries an `action` column.
    pub recorded_action: Option<RecordedAction>,
}

impl PriceRecord {
    pub fn new(date: NaiveDate, low_price: f64, peak_reference: f64) -> Self {
        PriceRecord {
            date,
            low_price,
            peak_reference,
            recorded_action: None,
        }
    }

    pub fn with_action(mut self, action: RecordedAction) -> Self {
        self.recorded_action = Some(action);
        self
    }

    pub fn is_labelled(&self, action: RecordedAction) -> bool {
        self.recorded_action == Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(RecordedAction::parse("BUY"), RecordedAction::Buy);
        assert_eq!(RecordedAction::parse(" Sell "), RecordedAction::Sell);
        assert_eq!(RecordedAction::parse("hold"), RecordedAction::None);
        assert_eq!(RecordedAction::parse(""), RecordedAction::None);
    }

    #[test]
    fn unlabelled_by_default() {
        let rec = PriceRecord::new(day(), 90.0, 100.0);
        assert!(rec.recorded_action.is_none());
        assert!(!rec.is_labelled(RecordedAction::Buy));
    }

    #[test]
    fn with_action_sets_label() {
        let rec = PriceRecord::new(day(), 90.0, 100.0).with_action(RecordedAction::Sell);
        assert!(rec.is_labelled(RecordedAction::Sell));
    }
}
