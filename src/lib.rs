//! dipladder: dollar-cost-averaging dip-ladder simulator and validator.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. [`publish`] and [`cli`] wire them
//! together.

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod publish;
pub mod cli;
