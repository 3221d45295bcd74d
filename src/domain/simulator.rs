//! Dip-buy simulator.
//!
//! A single pass over a date-ordered series. Each record is checked against
//! the current trigger (buy first, then sell), and the running state is
//! threaded through in a [`SimulationState`] owned by the [`Simulator`].
//!
//! In validation mode the simulator only executes buys the dataset labels as
//! buys, and counts every disagreement between the label and the rule as a
//! failed buy. A record without any label cannot disagree: a trigger hit on
//! it is noted as unlabelled and nothing is bought.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::error::DipLadderError;
use super::ladder::{trigger_price, RunMode, SellPolicy, SimulationConfig};
use super::normalizer::within_window;
use super::position::{Position, PositionStack};
use super::price_record::{PriceRecord, RecordedAction};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub cash_balance: f64,
    pub open_positions: PositionStack,
    pub reference_peak: Option<f64>,
    pub campaign_active: bool,
}

impl SimulationState {
    pub fn new(initial_cash: f64) -> Self {
        SimulationState {
            cash_balance: initial_cash,
            open_positions: PositionStack::new(),
            reference_peak: None,
            campaign_active: false,
        }
    }

    pub fn last_buy_price(&self) -> Option<f64> {
        self.open_positions.top().map(|p| p.entry_price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NoAction,
    Buy,
    Sell,
    BuyThenSell,
}

/// Result of comparing the record against the buy trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyCheck {
    NotTriggered,
    Passed,
    /// The rule and the recorded action disagree.
    Failed,
    SkippedForCash,
    /// Validation mode, trigger hit, but the record carries no label.
    Unlabelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    pub date: NaiveDate,
    pub low_price: f64,
    pub reference_peak: f64,
    pub trigger_price: f64,
    pub decision: Decision,
    pub buy_check: BuyCheck,
    pub positions_closed: usize,
    pub cash_balance: f64,
    pub open_positions: usize,
    /// `Some` in validation mode for labelled records only.
    pub matched: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub records: usize,
    pub passed_buys: usize,
    pub failed_buys: usize,
    pub skipped_for_cash: usize,
    pub unlabelled_triggers: usize,
    pub sells: usize,
    pub ignored_sells: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub outcomes: Vec<DecisionOutcome>,
    pub tally: Tally,
    pub final_cash: f64,
    pub open_positions: Vec<Position>,
}

impl SimulationResult {
    pub fn open_position_count(&self) -> usize {
        self.open_positions.len()
    }

    /// Escalates a non-zero failed-buy count to a run-level error.
    pub fn ensure_no_mismatch(&self) -> Result<(), DipLadderError> {
        if self.tally.failed_buys > 0 {
            return Err(DipLadderError::SignalMismatch {
                failed: self.tally.failed_buys,
            });
        }
        Ok(())
    }
}

pub struct Simulator {
    config: SimulationConfig,
    state: SimulationState,
    tally: Tally,
    start_date: Option<NaiveDate>,
}

impl Simulator {
    pub fn new(config: SimulationConfig) -> Self {
        let state = SimulationState::new(config.initial_cash);
        Simulator {
            config,
            state,
            tally: Tally::default(),
            start_date: None,
        }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    /// True once `date` lies past the configured horizon.
    pub fn past_horizon(&self, date: NaiveDate) -> bool {
        match (self.config.window_days, self.start_date) {
            (Some(days), Some(start)) => !within_window(start, date, days),
            _ => false,
        }
    }

    fn anchor_campaign(&mut self, record: &PriceRecord) -> f64 {
        match self.state.reference_peak {
            Some(peak) if self.state.campaign_active => peak,
            _ => {
                debug!(date = %record.date, peak = record.peak_reference, "anchoring campaign");
                self.state.reference_peak = Some(record.peak_reference);
                self.state.campaign_active = true;
                record.peak_reference
            }
        }
    }

    fn current_trigger(&self, reference_peak: f64) -> f64 {
        trigger_price(
            self.config.anchor,
            reference_peak,
            self.state.last_buy_price(),
            self.state.open_positions.len(),
            self.config.drop_step,
        )
    }

    fn execute_buy(&mut self, record: &PriceRecord, trigger: f64) {
        let amount = self.config.investment_per_buy;
        self.state
            .open_positions
            .push(Position::open(record.low_price, record.date, amount));
        self.state.cash_balance -= amount;
        self.tally.passed_buys += 1;
        info!(
            date = %record.date,
            price = record.low_price,
            trigger,
            cash = self.state.cash_balance,
            open = self.state.open_positions.len(),
            "buy"
        );
    }

    fn evaluate_buy(&mut self, record: &PriceRecord, trigger: f64) -> BuyCheck {
        let validating = self.config.mode == RunMode::Validation;
        let labelled_buy = record.is_labelled(RecordedAction::Buy);

        if record.low_price > trigger {
            if validating && labelled_buy {
                self.tally.failed_buys += 1;
                warn!(
                    date = %record.date,
                    price = record.low_price,
                    trigger,
                    "failed buy: recorded buy above trigger"
                );
                return BuyCheck::Failed;
            }
            return BuyCheck::NotTriggered;
        }

        if self.state.cash_balance < self.config.investment_per_buy {
            self.tally.skipped_for_cash += 1;
            debug!(
                date = %record.date,
                cash = self.state.cash_balance,
                "trigger hit with insufficient cash"
            );
            return BuyCheck::SkippedForCash;
        }

        if validating && record.recorded_action.is_none() {
            self.tally.unlabelled_triggers += 1;
            debug!(date = %record.date, trigger, "trigger hit on unlabelled record");
            return BuyCheck::Unlabelled;
        }

        if validating && !labelled_buy {
            self.tally.failed_buys += 1;
            warn!(
                date = %record.date,
                price = record.low_price,
                trigger,
                "failed buy: trigger hit but no buy recorded"
            );
            return BuyCheck::Failed;
        }

        self.execute_buy(record, trigger);
        BuyCheck::Passed
    }

    fn evaluate_sell(&mut self, record: &PriceRecord) -> usize {
        if !record.is_labelled(RecordedAction::Sell) {
            return 0;
        }
        if self.state.open_positions.is_empty() {
            self.tally.ignored_sells += 1;
            debug!(date = %record.date, "sell with no open positions");
            return 0;
        }

        let closed: Vec<Position> = match self.config.sell {
            SellPolicy::PopOne => self.state.open_positions.pop().into_iter().collect(),
            SellPolicy::CloseAll => self.state.open_positions.drain_all(),
        };
        let credited: f64 = closed.iter().map(|p| p.invested_amount).sum();
        self.state.cash_balance += credited;
        self.tally.sells += closed.len();

        if self.state.open_positions.is_empty() {
            self.state.campaign_active = false;
        }

        info!(
            date = %record.date,
            closed = closed.len(),
            credited,
            cash = self.state.cash_balance,
            "sell"
        );
        closed.len()
    }

    /// Process one record. Records must arrive in ascending date order.
    pub fn step(&mut self, record: &PriceRecord) -> DecisionOutcome {
        if self.start_date.is_none() {
            self.start_date = Some(record.date);
        }
        self.tally.records += 1;

        let reference_peak = self.anchor_campaign(record);
        let trigger = self.current_trigger(reference_peak);
        debug!(
            date = %record.date,
            low = record.low_price,
            trigger,
            open = self.state.open_positions.len(),
            "evaluating"
        );

        let buy_check = self.evaluate_buy(record, trigger);
        let positions_closed = self.evaluate_sell(record);

        let decision = match (buy_check == BuyCheck::Passed, positions_closed > 0) {
            (true, true) => Decision::BuyThenSell,
            (true, false) => Decision::Buy,
            (false, true) => Decision::Sell,
            (false, false) => Decision::NoAction,
        };

        let matched = match (self.config.mode, record.recorded_action) {
            (RunMode::Validation, Some(_)) => Some(buy_check != BuyCheck::Failed),
            _ => None,
        };

        DecisionOutcome {
            date: record.date,
            low_price: record.low_price,
            reference_peak,
            trigger_price: trigger,
            decision,
            buy_check,
            positions_closed,
            cash_balance: self.state.cash_balance,
            open_positions: self.state.open_positions.len(),
            matched,
        }
    }

    pub fn finish(self, outcomes: Vec<DecisionOutcome>) -> SimulationResult {
        SimulationResult {
            outcomes,
            tally: self.tally,
            final_cash: self.state.cash_balance,
            open_positions: self.state.open_positions.iter().cloned().collect(),
        }
    }
}

/// Replay `records` through a fresh simulator. Stops at the end of input or
/// at the first record past the `window_days` horizon.
pub fn run<'a, I>(config: &SimulationConfig, records: I) -> SimulationResult
where
    I: IntoIterator<Item = &'a PriceRecord>,
{
    let mut sim = Simulator::new(config.clone());
    let mut outcomes = Vec::new();

    for record in records {
        if sim.past_horizon(record.date) {
            debug!(date = %record.date, "window horizon reached");
            break;
        }
        outcomes.push(sim.step(record));
    }

    let result = sim.finish(outcomes);
    info!(
        records = result.tally.records,
        passed = result.tally.passed_buys,
        failed = result.tally.failed_buys,
        skipped_for_cash = result.tally.skipped_for_cash,
        unlabelled = result.tally.unlabelled_triggers,
        final_cash = result.final_cash,
        open = result.open_position_count(),
        anchor = %config.anchor,
        "simulation finished"
    );
    result
}
