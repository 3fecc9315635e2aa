//! Population Engine
//!
//! Manages a population of CPFA parameter genomes that evolve over time.
//! Fitness is the mean food collected over a shared set of seeds, so every
//! genome in a generation faces the same arenas.

use parking_lot::RwLock;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

use super::GaConfig;
use crate::core::{CpfaParams, CpfaResult, SimulationConfig};
use crate::utils::benchmark::ForagingBenchmark;

/// Relative standard deviation of a mutation step.
const MUTATION_SIGMA: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterLimits {
    pub min: f64,
    pub max: f64,
}

impl ParameterLimits {
    pub const fn new(min: f64, max: f64) -> Self {
        ParameterLimits { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        rng.gen_range(self.min..=self.max)
    }
}

/// One evolvable CPFA parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpfaGene {
    RateOfLayingPheromone,
    RateOfPheromoneDecay,
    ProbabilityOfSwitchingToSearching,
    RateOfSiteFidelity,
    RateOfInformedSearchDecay,
    ProbabilityOfReturningToNest,
    UninformedSearchVariation,
}

impl CpfaGene {
    /// Fixed gene order; crossover alternates parents along it.
    pub const ALL: [CpfaGene; 7] = [
        CpfaGene::RateOfLayingPheromone,
        CpfaGene::RateOfPheromoneDecay,
        CpfaGene::ProbabilityOfSwitchingToSearching,
        CpfaGene::RateOfSiteFidelity,
        CpfaGene::RateOfInformedSearchDecay,
        CpfaGene::ProbabilityOfReturningToNest,
        CpfaGene::UninformedSearchVariation,
    ];

    pub fn limits(self) -> ParameterLimits {
        match self {
            CpfaGene::RateOfLayingPheromone | CpfaGene::RateOfSiteFidelity => {
                ParameterLimits::new(0.0, 20.0)
            }
            CpfaGene::UninformedSearchVariation => ParameterLimits::new(0.0, 359.0),
            _ => ParameterLimits::new(0.0, 1.0),
        }
    }

    pub fn get(self, params: &CpfaParams) -> f64 {
        match self {
            CpfaGene::RateOfLayingPheromone => params.rate_of_laying_pheromone,
            CpfaGene::RateOfPheromoneDecay => params.rate_of_pheromone_decay,
            CpfaGene::ProbabilityOfSwitchingToSearching => {
                params.probability_of_switching_to_searching
            }
            CpfaGene::RateOfSiteFidelity => params.rate_of_site_fidelity,
            CpfaGene::RateOfInformedSearchDecay => params.rate_of_informed_search_decay,
            CpfaGene::ProbabilityOfReturningToNest => params.probability_of_returning_to_nest,
            CpfaGene::UninformedSearchVariation => params.uninformed_search_variation_deg,
        }
    }

    pub fn set(self, params: &mut CpfaParams, value: f64) {
        let slot = match self {
            CpfaGene::RateOfLayingPheromone => &mut params.rate_of_laying_pheromone,
            CpfaGene::RateOfPheromoneDecay => &mut params.rate_of_pheromone_decay,
            CpfaGene::ProbabilityOfSwitchingToSearching => {
                &mut params.probability_of_switching_to_searching
            }
            CpfaGene::RateOfSiteFidelity => &mut params.rate_of_site_fidelity,
            CpfaGene::RateOfInformedSearchDecay => &mut params.rate_of_informed_search_decay,
            CpfaGene::ProbabilityOfReturningToNest => &mut params.probability_of_returning_to_nest,
            CpfaGene::UninformedSearchVariation => &mut params.uninformed_search_variation_deg,
        };
        *slot = value;
    }
}

/// Genetic representation of a CPFA parameter set
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CpfaGenome {
    pub id: String,
    pub generation: u32,
    pub params: CpfaParams,
    pub fitness: f64,
}

impl CpfaGenome {
    /// Every gene drawn uniformly inside its limits.
    pub fn random<R: Rng>(id: String, generation: u32, rng: &mut R) -> Self {
        let mut params = CpfaParams::default();
        for gene in CpfaGene::ALL {
            gene.set(&mut params, gene.limits().sample(rng));
        }
        CpfaGenome {
            id,
            generation,
            params,
            fitness: 0.0,
        }
    }
}

/// Summary of one scored generation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation: u32,
    pub best_id: String,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub best_params: CpfaParams,
    pub seeds: Vec<u64>,
}

/// Shared, forkable record of a tuning run.
///
/// Forks share storage, so a reader handed a fork sees generations as they land.
#[derive(Clone, Debug, Default)]
pub struct GenerationHistory {
    inner: Arc<RwLock<Vec<GenerationRecord>>>,
}

impl GenerationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: GenerationRecord) {
        let mut data = self.inner.write();
        data.push(record);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Creates a shallow copy
    pub fn fork(&self) -> Self {
        GenerationHistory {
            inner: self.inner.clone(),
        }
    }

    pub fn last(&self) -> Option<GenerationRecord> {
        self.inner.read().last().cloned()
    }

    pub fn records(&self) -> Vec<GenerationRecord> {
        self.inner.read().clone()
    }

    pub fn to_json(&self) -> String {
        let data = self.inner.read();
        serde_json::to_string(&*data).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Generational GA over `CpfaParams`
pub struct PopulationEngine {
    config: GaConfig,
    benchmark: ForagingBenchmark,
    population: Vec<CpfaGenome>,
    generation: u32,
    champion: Option<CpfaGenome>,
    history: GenerationHistory,
    rng: StdRng,
}

impl PopulationEngine {
    /// Uniformly random generation 0 evaluated against `base`.
    pub fn new(config: GaConfig, base: SimulationConfig) -> CpfaResult<Self> {
        config.validate()?;
        base.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let population = (0..config.population_size)
            .map(|i| CpfaGenome::random(format!("gen0_v{}", i), 0, &mut rng))
            .collect();

        info!(
            "🧬 [PopulationEngine] Initialized (pop_size={}, elites={}, mutation={:.2}, trials={})",
            config.population_size, config.elites, config.mutation_rate, config.trials_per_generation
        );

        Ok(PopulationEngine {
            config,
            benchmark: ForagingBenchmark::new(base),
            population,
            generation: 0,
            champion: None,
            history: GenerationHistory::new(),
            rng,
        })
    }

    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn population(&self) -> &[CpfaGenome] {
        &self.population
    }

    /// Fittest genome seen across all scored generations.
    pub fn champion(&self) -> Option<&CpfaGenome> {
        self.champion.as_ref()
    }

    pub fn history(&self) -> GenerationHistory {
        self.history.fork()
    }

    /// Scores the current population, records it and breeds the next one.
    pub fn run_generation(&mut self) -> GenerationRecord {
        let seeds: Vec<u64> = (0..self.config.trials_per_generation)
            .map(|_| self.rng.gen::<u32>() as u64)
            .collect();

        for genome in &mut self.population {
            genome.fitness = match self.benchmark.evaluate(&genome.params, &seeds) {
                Ok(fitness) => fitness,
                Err(e) => {
                    warn!("[Evolution] {} scored 0: {}", genome.id, e);
                    0.0
                }
            };
        }

        // 1. Sort by fitness (descending)
        self.population.sort_by(|a, b| {
            b.fitness
                .partial_cmp(&a.fitness)
                .unwrap_or(Ordering::Equal)
        });

        let best = self.population[0].clone();
        let mean = self.population.iter().map(|g| g.fitness).sum::<f64>()
            / self.population.len() as f64;
        let record = GenerationRecord {
            generation: self.generation,
            best_id: best.id.clone(),
            best_fitness: best.fitness,
            mean_fitness: mean,
            best_params: best.params.clone(),
            seeds,
        };
        self.history.push(record.clone());
        info!(
            "🏆 [Evolution] Generation {} best: {} (fitness={:.2}, mean={:.2})",
            self.generation, best.id, best.fitness, mean
        );

        let improved = self
            .champion
            .as_ref()
            .map_or(true, |c| best.fitness > c.fitness);
        if improved {
            self.champion = Some(best);
        }

        // 2. Selection & Reproduction
        self.population = self.breed();
        self.generation += 1;
        record
    }

    /// Runs every configured generation and returns the champion.
    pub fn run(&mut self) -> Option<CpfaGenome> {
        for _ in 0..self.config.generations {
            self.run_generation();
        }
        self.champion.clone()
    }

    /// Expects the population sorted by fitness, best first.
    fn breed(&mut self) -> Vec<CpfaGenome> {
        let next_generation = self.generation + 1;
        let mut next: Vec<CpfaGenome> = self
            .population
            .iter()
            .take(self.config.elites)
            .cloned()
            .map(|mut elite| {
                elite.generation = next_generation;
                elite
            })
            .collect();

        while next.len() < self.config.population_size {
            let p1 = self.tournament();
            let p2 = self.tournament();
            let mut params = crossover(&self.population[p1].params, &self.population[p2].params);
            self.mutate(&mut params);
            next.push(CpfaGenome {
                id: format!("gen{}_v{}", next_generation, next.len()),
                generation: next_generation,
                params,
                fitness: 0.0,
            });
        }
        next
    }

    /// Binary tournament with replacement; ties go to the second draw.
    fn tournament(&mut self) -> usize {
        let n = self.population.len();
        let a = self.rng.gen_range(0..n);
        let b = self.rng.gen_range(0..n);
        if self.population[a].fitness > self.population[b].fitness {
            a
        } else {
            b
        }
    }

    fn mutate(&mut self, params: &mut CpfaParams) {
        for gene in CpfaGene::ALL {
            if self.rng.gen::<f64>() < self.config.mutation_rate {
                let limits = gene.limits();
                let z: f64 = self.rng.sample(StandardNormal);
                let nudged = gene.get(params) + z * MUTATION_SIGMA * limits.span();
                gene.set(params, limits.clamp(nudged));
            }
        }
    }
}

/// Child starts as `p2` and takes every other gene from `p1`.
pub fn crossover(p1: &CpfaParams, p2: &CpfaParams) -> CpfaParams {
    let mut child = p2.clone();
    for (i, gene) in CpfaGene::ALL.iter().enumerate() {
        if i % 2 == 1 {
            gene.set(&mut child, gene.get(p1));
        }
    }
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FoodDistribution;

    fn tiny_base() -> SimulationConfig {
        let mut cfg = SimulationConfig::default();
        cfg.robot_count = 3;
        cfg.max_ticks = 200;
        cfg.arena.food_distribution = FoodDistribution::Random { count: 32 };
        cfg
    }

    fn tiny_ga(mutation_rate: f64) -> GaConfig {
        GaConfig {
            population_size: 4,
            generations: 2,
            elites: 1,
            mutation_rate,
            trials_per_generation: 2,
            seed: 17,
        }
    }

    #[test]
    fn random_genomes_respect_limits() {
        let mut rng = StdRng::seed_from_u64(3);
        for i in 0..50 {
            let genome = CpfaGenome::random(format!("g{}", i), 0, &mut rng);
            for gene in CpfaGene::ALL {
                let v = gene.get(&genome.params);
                let limits = gene.limits();
                assert!(v >= limits.min && v <= limits.max, "{:?} = {}", gene, v);
            }
        }
    }

    #[test]
    fn crossover_alternates_parents() {
        let p1 = CpfaParams::default();
        let mut p2 = CpfaParams::default();
        for gene in CpfaGene::ALL {
            gene.set(&mut p2, gene.limits().max);
        }
        let child = crossover(&p1, &p2);
        for (i, gene) in CpfaGene::ALL.iter().enumerate() {
            let expected = if i % 2 == 1 { gene.get(&p1) } else { gene.get(&p2) };
            assert_eq!(gene.get(&child), expected);
        }
    }

    #[test]
    fn generations_keep_size_elites_and_history() {
        let mut engine = PopulationEngine::new(tiny_ga(0.5), tiny_base()).unwrap();
        let history = engine.history();

        let first = engine.run_generation();
        assert_eq!(engine.population().len(), 4);
        assert_eq!(engine.generation(), 1);
        assert_eq!(engine.population()[0].params, first.best_params);
        assert_eq!(first.seeds.len(), 2);
        assert!(first.best_fitness >= first.mean_fitness);

        engine.run_generation();
        assert_eq!(history.len(), 2);
        assert!(history.to_json().contains("best_fitness"));
        let champion = engine.champion().unwrap();
        let best_seen = history
            .records()
            .iter()
            .map(|r| r.best_fitness)
            .fold(f64::MIN, f64::max);
        assert_eq!(champion.fitness, best_seen);
    }

    #[test]
    fn same_seed_same_tuning_run() {
        let a = PopulationEngine::new(tiny_ga(0.3), tiny_base()).unwrap().run().unwrap();
        let b = PopulationEngine::new(tiny_ga(0.3), tiny_base()).unwrap().run().unwrap();
        assert_eq!(a.params, b.params);
        assert_eq!(a.fitness, b.fitness);
    }

    #[test]
    fn mutation_stays_inside_limits() {
        let mut engine = PopulationEngine::new(tiny_ga(1.0), tiny_base()).unwrap();
        let mut params = CpfaParams::default();
        for gene in CpfaGene::ALL {
            gene.set(&mut params, gene.limits().max);
        }
        for _ in 0..100 {
            engine.mutate(&mut params);
            for gene in CpfaGene::ALL {
                let limits = gene.limits();
                let v = gene.get(&params);
                assert!(v >= limits.min && v <= limits.max);
            }
        }
    }
}
