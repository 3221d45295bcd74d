//! Dip-ladder parameters and trigger price math.
//!
//! The ladder buys a fixed amount each time the low price reaches the next
//! rung. Rungs decay geometrically by `drop_step`, anchored either on the
//! campaign's reference peak or on the last purchase price.

use std::fmt;
use std::str::FromStr;

/// What the next trigger is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorPolicy {
    /// `reference_peak * (1 - drop_step)^(n + 1)` for the (n+1)-th lot.
    ExternalPeak,
    /// `last_buy_price * (1 - drop_step)`, falling back to the peak when no
    /// lot is open.
    LastPurchase,
}

/// How a recorded sell unwinds the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellPolicy {
    PopOne,
    CloseAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Execute every affordable trigger.
    Live,
    /// Execute only labelled buys and count disagreements.
    Validation,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unrecognised value '{value}' (expected one of: {expected})")]
pub struct UnknownVariant {
    pub value: String,
    pub expected: &'static str,
}

fn lookup<T: Copy>(
    s: &str,
    table: &[(&str, T)],
    expected: &'static str,
) -> Result<T, UnknownVariant> {
    let key = s.trim().to_lowercase().replace('-', "_");
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, v)| *v)
        .ok_or_else(|| UnknownVariant {
            value: s.to_string(),
            expected,
        })
}

impl FromStr for AnchorPolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(
            s,
            &[
                ("external_peak", AnchorPolicy::ExternalPeak),
                ("last_purchase", AnchorPolicy::LastPurchase),
            ],
            "external_peak, last_purchase",
        )
    }
}

impl FromStr for SellPolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(
            s,
            &[
                ("pop_one", SellPolicy::PopOne),
                ("close_all", SellPolicy::CloseAll),
            ],
            "pop_one, close_all",
        )
    }
}

impl FromStr for RunMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(
            s,
            &[("live", RunMode::Live), ("validation", RunMode::Validation)],
            "live, validation",
        )
    }
}

impl fmt::Display for AnchorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnchorPolicy::ExternalPeak => "external_peak",
            AnchorPolicy::LastPurchase => "last_purchase",
        })
    }
}

impl fmt::Display for SellPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SellPolicy::PopOne => "pop_one",
            SellPolicy::CloseAll => "close_all",
        })
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunMode::Live => "live",
            RunMode::Validation => "validation",
        })
    }
}

/// Simulation parameters. There are no defaults; every field comes from the
/// caller or the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub initial_cash: f64,
    pub investment_per_buy: f64,
    /// Fraction in (0, 1), e.g. 0.05 for a 5% rung spacing.
    pub drop_step: f64,
    pub window_days: Option<u32>,
    pub anchor: AnchorPolicy,
    pub sell: SellPolicy,
    pub mode: RunMode,
}

/// Trigger for the next lot under `ExternalPeak`, given `open` lots already held.
pub fn peak_trigger(reference_peak: f64, drop_step: f64, open: usize) -> f64 {
    let rungs = i32::try_from(open).unwrap_or(i32::MAX - 1) + 1;
    reference_peak * (1.0 - drop_step).powi(rungs)
}

/// Trigger one rung below `anchor_price`.
pub fn next_rung(anchor_price: f64, drop_step: f64) -> f64 {
    anchor_price * (1.0 - drop_step)
}

/// Trigger price for the next buy.
pub fn trigger_price(
    policy: AnchorPolicy,
    reference_peak: f64,
    last_buy_price: Option<f64>,
    open: usize,
    drop_step: f64,
) -> f64 {
    match (policy, last_buy_price) {
        (AnchorPolicy::ExternalPeak, _) => peak_trigger(reference_peak, drop_step, open),
        (AnchorPolicy::LastPurchase, Some(last)) => next_rung(last, drop_step),
        (AnchorPolicy::LastPurchase, None) => next_rung(reference_peak, drop_step),
    }
}
