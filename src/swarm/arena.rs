//! Shared arena state.
//!
//! Everything the swarm reads in common (clock, nest geometry, tunables) and the
//! three structures robots mutate (food set, pheromone field, fidelity registry).
//! Robots receive it by `&mut` one at a time, which serialises every mutation and
//! gives first-come-first-served food claims in agent order.

use tracing::{info, warn};

use super::fidelity::SiteFidelityRegistry;
use super::pheromone::{PheromoneField, PheromoneTrail};
use super::rng::RandomSource;
use crate::core::config::{
    ArenaConfig, ControllerParams, CpfaParams, FoodDistribution, MAX_POWER_LAW_LEVELS,
};
use crate::core::{SimulationConfig, Vec2};

const MAX_PLACEMENT_ATTEMPTS: usize = 100;

pub struct SharedArenaState {
    tick: u64,
    config: ArenaConfig,
    controller: ControllerParams,
    params: CpfaParams,
    pheromone_threshold: f64,
    food: Vec<Vec2>,
    pheromones: PheromoneField,
    fidelity: SiteFidelityRegistry,
    food_delivered: usize,
}

impl SharedArenaState {
    /// Arena with an explicit food set.
    pub fn new(config: &SimulationConfig, food: Vec<Vec2>) -> Self {
        SharedArenaState {
            tick: 0,
            config: config.arena.clone(),
            controller: config.controller.clone(),
            params: config.cpfa.clone(),
            pheromone_threshold: config.pheromone_threshold,
            food,
            pheromones: PheromoneField::new(),
            fidelity: SiteFidelityRegistry::new(),
            food_delivered: 0,
        }
    }

    /// Arena with food scattered according to `config.arena.food_distribution`.
    pub fn populated(config: &SimulationConfig, rng: &mut dyn RandomSource) -> Self {
        let food = place_food(&config.arena, rng);
        info!(
            "[Arena] Placed {} food items ({:?})",
            food.len(),
            config.arena.food_distribution
        );
        Self::new(config, food)
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advances the clock and applies pheromone decay for the new tick.
    /// This is the only place decay happens.
    pub fn advance_tick(&mut self) -> u64 {
        self.tick += 1;
        self.pheromones.decay_all(self.tick);
        self.tick
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn controller(&self) -> &ControllerParams {
        &self.controller
    }

    pub fn params(&self) -> &CpfaParams {
        &self.params
    }

    pub fn ticks_per_second(&self) -> u64 {
        self.config.ticks_per_second
    }

    pub fn seconds_to_ticks(&self, seconds: u64) -> u64 {
        seconds * self.config.ticks_per_second
    }

    /// Food and pheromone scans run twice per simulated second.
    pub fn is_scan_tick(&self) -> bool {
        let interval = (self.config.ticks_per_second / 2).max(1);
        self.tick % interval == 0
    }

    pub fn nest_position(&self) -> Vec2 {
        self.config.nest_position
    }

    pub fn in_nest(&self, position: Vec2) -> bool {
        position.within(self.config.nest_position, self.config.nest_radius)
    }

    /// Clamps X and Y independently into the forage range.
    pub fn clamp_to_arena(&self, point: Vec2) -> Vec2 {
        let (min, max) = (self.config.forage_min, self.config.forage_max);
        Vec2::new(point.x.clamp(min.x, max.x), point.y.clamp(min.y, max.y))
    }

    pub fn food(&self) -> &[Vec2] {
        &self.food
    }

    /// Removes and returns the first food item within pickup range of `position`.
    pub fn claim_food_near(&mut self, position: Vec2) -> Option<Vec2> {
        let radius = self.config.food_radius;
        let idx = self.food.iter().position(|f| position.within(*f, radius))?;
        Some(self.food.remove(idx))
    }

    /// Number of remaining items inside the density search radius of `position`.
    pub fn count_food_within(&self, position: Vec2) -> usize {
        let radius = self.config.search_radius;
        self.food.iter().filter(|f| position.within(**f, radius)).count()
    }

    pub fn record_delivery(&mut self) {
        self.food_delivered += 1;
    }

    pub fn food_delivered(&self) -> usize {
        self.food_delivered
    }

    pub fn pheromones(&self) -> &PheromoneField {
        &self.pheromones
    }

    /// Per-tick decay rate derived from the per-second configuration value.
    pub fn pheromone_decay_per_tick(&self) -> f64 {
        self.params.rate_of_pheromone_decay / self.config.ticks_per_second as f64
    }

    pub fn pheromone_threshold(&self) -> f64 {
        self.pheromone_threshold
    }

    pub fn deposit_trail(&mut self, trail: PheromoneTrail) {
        self.pheromones.add(trail);
    }

    pub fn fidelity(&self) -> &SiteFidelityRegistry {
        &self.fidelity
    }

    pub fn fidelity_mut(&mut self) -> &mut SiteFidelityRegistry {
        &mut self.fidelity
    }
}

/// Scatters food over the forage range, keeping the nest disc clear.
pub fn place_food(config: &ArenaConfig, rng: &mut dyn RandomSource) -> Vec<Vec2> {
    let mut food = Vec::new();
    match config.food_distribution {
        FoodDistribution::Random { count } => {
            for _ in 0..count {
                let sampled = (0..MAX_PLACEMENT_ATTEMPTS)
                    .map(|_| {
                        Vec2::new(
                            rng.uniform(config.forage_min.x, config.forage_max.x),
                            rng.uniform(config.forage_min.y, config.forage_max.y),
                        )
                    })
                    .find(|p| !blocks_nest(config, *p));
                match sampled {
                    Some(p) => food.push(p),
                    None => warn!("[Arena] Gave up placing a random food item"),
                }
            }
        }
        FoodDistribution::Cluster {
            clusters,
            width,
            length,
        } => {
            for _ in 0..clusters {
                place_patch(config, width, length, rng, &mut food);
            }
        }
        FoodDistribution::PowerLaw { levels } => {
            if levels > MAX_POWER_LAW_LEVELS {
                warn!(
                    "[Arena] Power-law depth {} capped at {}",
                    levels, MAX_POWER_LAW_LEVELS
                );
            }
            let levels = levels.min(MAX_POWER_LAW_LEVELS);
            for k in 0..levels {
                let side = 1usize << (levels - 1 - k);
                for _ in 0..4usize.pow(k) {
                    place_patch(config, side, side, rng, &mut food);
                }
            }
        }
    }
    food
}

fn blocks_nest(config: &ArenaConfig, p: Vec2) -> bool {
    p.within(config.nest_position, config.nest_radius + config.food_radius)
}

/// Places a `width` x `length` grid of items whose footprint fits in the forage range.
fn place_patch(
    config: &ArenaConfig,
    width: usize,
    length: usize,
    rng: &mut dyn RandomSource,
    food: &mut Vec<Vec2>,
) {
    if width == 0 || length == 0 {
        return;
    }
    let span_x = (width - 1) as f64 * config.food_spacing;
    let span_y = (length - 1) as f64 * config.food_spacing;
    let max_x = (config.forage_max.x - span_x).max(config.forage_min.x);
    let max_y = (config.forage_max.y - span_y).max(config.forage_min.y);

    for _ in 0..MAX_PLACEMENT_ATTEMPTS {
        let corner = Vec2::new(
            rng.uniform(config.forage_min.x, max_x),
            rng.uniform(config.forage_min.y, max_y),
        );
        let patch: Vec<Vec2> = (0..width)
            .flat_map(|i| {
                (0..length).map(move |j| {
                    corner
                        + Vec2::new(i as f64 * config.food_spacing, j as f64 * config.food_spacing)
                })
            })
            .collect();
        if patch.iter().all(|p| !blocks_nest(config, *p)) {
            food.extend(patch);
            return;
        }
    }
    warn!(
        "[Arena] Gave up placing a {}x{} food patch after {} attempts",
        width, length, MAX_PLACEMENT_ATTEMPTS
    );
}
