//! Configuration validation.
//!
//! Validates all config fields before a simulation or publish run. The
//! simulation section has no defaults: every key except `window_days` must
//! be present.

use crate::domain::error::DipLadderError;
use crate::domain::ladder::{AnchorPolicy, RunMode, SellPolicy};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;

pub const SIMULATION: &str = "simulation";
pub const DATA: &str = "data";
pub const PUBLISH: &str = "publish";

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), DipLadderError> {
    validate_initial_cash(config)?;
    validate_investment(config)?;
    validate_drop_step(config)?;
    optional_u32(config, SIMULATION, "window_days")?;
    required_enum::<AnchorPolicy>(config, SIMULATION, "anchor")?;
    required_enum::<SellPolicy>(config, SIMULATION, "sell_policy")?;
    required_enum::<RunMode>(config, SIMULATION, "mode")?;
    Ok(())
}

pub fn validate_publish_config(config: &dyn ConfigPort) -> Result<(), DipLadderError> {
    validate_symbols(config)?;
    required_date(config, PUBLISH, "start_date")?;
    validate_repo(config)?;
    required_string(config, PUBLISH, "branch")?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> DipLadderError {
    DipLadderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub fn required_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, DipLadderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(DipLadderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

pub fn required_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<f64, DipLadderError> {
    let raw = required_string(config, section, key)?;
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(section, key, format!("'{raw}' is not a number")))
}

pub fn optional_u32(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<u32>, DipLadderError> {
    let raw = match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Ok(None),
    };
    let value: u32 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, format!("'{raw}' is not a whole number")))?;
    if value == 0 {
        return Err(invalid(section, key, format!("{key} must be positive")));
    }
    Ok(Some(value))
}

pub fn required_enum<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<T, DipLadderError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = required_string(config, section, key)?;
    raw.parse::<T>()
        .map_err(|e| invalid(section, key, e.to_string()))
}

pub fn parse_date(value: &str, section: &str, key: &str) -> Result<NaiveDate, DipLadderError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| invalid(section, key, format!("invalid {key} format, expected YYYY-MM-DD")))
}

pub fn required_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDate, DipLadderError> {
    let raw = required_string(config, section, key)?;
    parse_date(&raw, section, key)
}

fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), DipLadderError> {
    let value = required_f64(config, SIMULATION, "initial_cash")?;
    if value < 0.0 {
        return Err(invalid(
            SIMULATION,
            "initial_cash",
            "initial_cash must be non-negative",
        ));
    }
    Ok(())
}

fn validate_investment(config: &dyn ConfigPort) -> Result<(), DipLadderError> {
    let value = required_f64(config, SIMULATION, "investment_per_buy")?;
    if value <= 0.0 {
        return Err(invalid(
            SIMULATION,
            "investment_per_buy",
            "investment_per_buy must be positive",
        ));
    }
    Ok(())
}

fn validate_drop_step(config: &dyn ConfigPort) -> Result<(), DipLadderError> {
    let value = required_f64(config, SIMULATION, "drop_step")?;
    if value <= 0.0 || value >= 1.0 {
        return Err(invalid(
            SIMULATION,
            "drop_step",
            "drop_step must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), DipLadderError> {
    match config.get_list(PUBLISH, "symbols") {
        Some(list) if !list.is_empty() => Ok(()),
        _ => Err(DipLadderError::ConfigMissing {
            section: PUBLISH.to_string(),
            key: "symbols".to_string(),
        }),
    }
}

fn validate_repo(config: &dyn ConfigPort) -> Result<(), DipLadderError> {
    let repo = required_string(config, PUBLISH, "repo")?;
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(())
        }
        _ => Err(invalid(PUBLISH, "repo", "repo must be in owner/name form")),
    }
}
