//! Evolution Layer for CPFA parameter tuning
//!
//! A generational GA over the seven evolvable CPFA parameters:
//! 1. Score every genome by mean food collected over shared seeds
//! 2. Carry the elites over unchanged
//! 3. Fill the rest by tournament selection, crossover and mutation

pub mod population;

use serde::{Deserialize, Serialize};

use crate::core::{CpfaError, CpfaResult};

pub use population::{
    CpfaGene, CpfaGenome, GenerationHistory, GenerationRecord, ParameterLimits, PopulationEngine,
};

/// Configuration for a tuning run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    pub population_size: usize,
    pub generations: u32,
    pub elites: usize,
    /// Per-gene probability of a Gaussian nudge.
    pub mutation_rate: f64,
    pub trials_per_generation: usize,
    pub seed: u64,
}

impl Default for GaConfig {
    fn default() -> Self {
        GaConfig {
            population_size: 50,
            generations: 20,
            elites: 1,
            mutation_rate: 0.1,
            trials_per_generation: 10,
            seed: 42,
        }
    }
}

impl GaConfig {
    pub fn from_json_str(json: &str) -> CpfaResult<Self> {
        let config: GaConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CpfaResult<()> {
        if self.population_size < 2 {
            return Err(CpfaError::InvalidConfig(format!(
                "population_size must be at least 2, got {}",
                self.population_size
            )));
        }
        if self.elites > self.population_size {
            return Err(CpfaError::InvalidConfig(format!(
                "elites ({}) exceed population_size ({})",
                self.elites, self.population_size
            )));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(CpfaError::InvalidConfig(format!(
                "mutation_rate must lie in [0, 1], got {}",
                self.mutation_rate
            )));
        }
        if self.trials_per_generation == 0 {
            return Err(CpfaError::InvalidConfig(
                "trials_per_generation must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
