//! Core domain types and logic.

pub mod price_record;
pub mod normalizer;
pub mod position;
pub mod ladder;
pub mod simulator;
pub mod daily_bar;
pub mod config_validation;
pub mod error;
