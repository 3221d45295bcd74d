//! Report generation port trait.

use crate::domain::error::DipLadderError;
use crate::domain::simulator::SimulationResult;

/// Port for writing the per-record decision log of a simulation run.
pub trait ReportPort {
    fn write(&self, result: &SimulationResult, output_path: &str) -> Result<(), DipLadderError>;
}
