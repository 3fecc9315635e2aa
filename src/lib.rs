//! CPFA Swarm v0.3.0 - Central Place Foraging Algorithm runtime
//!
//! iAnt foraging controllers that leave the nest, search, carry food home and
//! recruit each other through decaying pheromone trails and remembered
//! discovery sites. Ships a headless kinematic simulation to drive them and a
//! genetic tuner for the CPFA parameters.
// Python bindings live behind the `python` feature

pub mod core;
pub mod evolution;
pub mod swarm;
pub mod utils;

#[cfg(feature = "python")]
use pyo3::prelude::*;

// Re-export key types
pub use crate::core::{
    AgentId, ArenaConfig, ControllerParams, CpfaError, CpfaParams, CpfaResult, FoodDistribution,
    SimulationConfig, Vec2,
};
pub use evolution::{GaConfig, PopulationEngine};
pub use swarm::{
    ForagingAgent, ForagingSimulation, PheromoneField, PheromoneTrail, RandomSource, RobotIo,
    SharedArenaState, SimRng, SimulationReport, SiteFidelityRegistry,
};
pub use utils::ForagingBenchmark;

/// Initialize tracing for the library.
#[cfg_attr(feature = "python", pyfunction)]
pub fn setup_logging(level: Option<String>) {
    let filter = level.unwrap_or_else(|| "info".to_string());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Python module initialization
#[cfg(feature = "python")]
#[pymodule]
fn cpfa_swarm(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(setup_logging, m)?)?;

    // Simulation
    m.add_class::<swarm::py_api::PySimulation>()?;

    // Parameter tuning
    m.add_class::<swarm::py_api::PyEvolution>()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_setup_is_idempotent() {
        setup_logging(Some("debug".to_string()));
        setup_logging(None);
    }
}
