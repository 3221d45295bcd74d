//! Decision log writer: one CSV line per processed record.

use crate::domain::error::DipLadderError;
use crate::domain::normalizer::DATE_FORMAT;
use crate::domain::simulator::{BuyCheck, Decision, DecisionOutcome, SimulationResult};
use crate::ports::report_port::ReportPort;
use std::fs;

pub struct CsvReportAdapter;

fn decision_label(decision: Decision) -> &'static str {
    match decision {
        Decision::NoAction => "none",
        Decision::Buy => "buy",
        Decision::Sell => "sell",
        Decision::BuyThenSell => "buy+sell",
    }
}

fn check_label(check: BuyCheck) -> &'static str {
    match check {
        BuyCheck::NotTriggered => "",
        BuyCheck::Passed => "passed",
        BuyCheck::Failed => "failed",
        BuyCheck::SkippedForCash => "insufficient_cash",
        BuyCheck::Unlabelled => "unlabelled",
    }
}

fn row(outcome: &DecisionOutcome) -> [String; 9] {
    [
        outcome.date.format(DATE_FORMAT).to_string(),
        format!("{:.4}", outcome.low_price),
        format!("{:.4}", outcome.reference_peak),
        format!("{:.4}", outcome.trigger_price),
        decision_label(outcome.decision).to_string(),
        check_label(outcome.buy_check).to_string(),
        format!("{:.2}", outcome.cash_balance),
        outcome.open_positions.to_string(),
        match outcome.matched {
            Some(true) => "yes".to_string(),
            Some(false) => "no".to_string(),
            None => String::new(),
        },
    ]
}

impl CsvReportAdapter {
    pub fn render(result: &SimulationResult) -> Result<String, DipLadderError> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        let csv_err = |e: csv::Error| DipLadderError::Io(e.into());

        wtr.write_record([
            "date",
            "low price",
            "reference peak",
            "trigger",
            "decision",
            "buy check",
            "cash",
            "open positions",
            "matched",
        ])
        .map_err(csv_err)?;
        for outcome in &result.outcomes {
            wtr.write_record(row(outcome)).map_err(csv_err)?;
        }

        let bytes = wtr
            .into_inner()
            .map_err(|e| DipLadderError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| DipLadderError::Io(std::io::Error::other(e)))
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &SimulationResult, output_path: &str) -> Result<(), DipLadderError> {
        let content = Self::render(result)?;
        fs::write(output_path, content)?;
        Ok(())
    }
}
