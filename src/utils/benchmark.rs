use rayon::prelude::*;
use tracing::{debug, info};

use crate::core::{CpfaParams, CpfaResult, SimulationConfig};
use crate::swarm::simulation::ForagingSimulation;

/// Benchmark - Scores a CPFA parameter set by the food a swarm collects
pub struct ForagingBenchmark {
    base: SimulationConfig,
}

impl ForagingBenchmark {
    pub fn new(base: SimulationConfig) -> Self {
        ForagingBenchmark { base }
    }

    pub fn base(&self) -> &SimulationConfig {
        &self.base
    }

    /// Food collected in a single run of `params` under `seed`.
    pub fn run_once(&self, params: &CpfaParams, seed: u64) -> CpfaResult<usize> {
        let mut config = self.base.clone();
        config.seed = seed;
        config.cpfa = params.clone();
        let report = ForagingSimulation::new(config)?.run();
        debug!(
            "[Benchmark] seed {} -> {} collected in {} ticks",
            seed, report.food_collected, report.ticks
        );
        Ok(report.food_collected)
    }

    /// Mean food collected over one run per seed; runs execute in parallel.
    pub fn evaluate(&self, params: &CpfaParams, seeds: &[u64]) -> CpfaResult<f64> {
        if seeds.is_empty() {
            return Ok(0.0);
        }
        let collected = seeds
            .par_iter()
            .map(|&seed| self.run_once(params, seed))
            .collect::<CpfaResult<Vec<usize>>>()?;

        let fitness = collected.iter().sum::<usize>() as f64 / seeds.len() as f64;
        info!(
            "📊 [Benchmark] {} trials, mean food collected {:.2}",
            seeds.len(),
            fitness
        );
        Ok(fitness)
    }
}
