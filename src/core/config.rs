use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{CpfaError, CpfaResult};
use super::math::Vec2;

/// The seven evolvable CPFA parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpfaParams {
    pub probability_of_switching_to_searching: f64,
    pub probability_of_returning_to_nest: f64,
    /// Standard deviation of the uninformed correlated walk, in degrees.
    pub uninformed_search_variation_deg: f64,
    pub rate_of_informed_search_decay: f64,
    pub rate_of_site_fidelity: f64,
    pub rate_of_laying_pheromone: f64,
    /// Per-second exponential decay rate of a pheromone trail.
    pub rate_of_pheromone_decay: f64,
}

impl CpfaParams {
    pub fn uninformed_search_variation(&self) -> f64 {
        self.uninformed_search_variation_deg.to_radians()
    }
}

impl Default for CpfaParams {
    fn default() -> Self {
        CpfaParams {
            probability_of_switching_to_searching: 0.204_145_625_233_650_2,
            probability_of_returning_to_nest: 0.000_940_595_753_490_924_8,
            uninformed_search_variation_deg: 12.996_437,
            rate_of_informed_search_decay: 0.249_787_867_069_244_4,
            rate_of_site_fidelity: 2.511_750_698_089_6,
            rate_of_laying_pheromone: 2.244_212_388_992_31,
            rate_of_pheromone_decay: 0.038_218_088_448_047_64,
        }
    }
}

/// Per-robot navigation settings (not evolved).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerParams {
    /// Linear reach distance for targets and trail waypoints (m).
    pub distance_tolerance: f64,
    pub search_step_size: f64,
    /// Wheel speed when driving straight (cm/s).
    pub robot_forward_speed: f64,
    /// Wheel speed magnitude when turning in place (cm/s).
    pub robot_rotation_speed: f64,
    /// Half-width of the "facing the target" window, in degrees.
    pub angle_tolerance_deg: f64,
}

impl ControllerParams {
    pub fn angle_tolerance(&self) -> f64 {
        self.angle_tolerance_deg.to_radians()
    }
}

impl Default for ControllerParams {
    fn default() -> Self {
        ControllerParams {
            distance_tolerance: 0.1,
            search_step_size: 0.175,
            robot_forward_speed: 16.0,
            robot_rotation_speed: 13.3,
            angle_tolerance_deg: 15.0,
        }
    }
}

/// How food items are scattered when an arena is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FoodDistribution {
    /// Items placed uniformly over the forage area.
    Random { count: usize },
    /// `clusters` rectangular patches of `width` x `length` items.
    Cluster {
        clusters: usize,
        width: usize,
        length: usize,
    },
    /// Level k holds 4^k square patches of side 2^(levels-1-k); every level carries the same food.
    PowerLaw { levels: u32 },
}

impl Default for FoodDistribution {
    fn default() -> Self {
        FoodDistribution::Cluster {
            clusters: 4,
            width: 8,
            length: 8,
        }
    }
}

/// Arena geometry and the simulation clock rate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub forage_min: Vec2,
    pub forage_max: Vec2,
    pub nest_position: Vec2,
    pub nest_radius: f64,
    /// Pickup distance between a robot and a food item.
    pub food_radius: f64,
    /// Neighbourhood radius used to count local resource density.
    pub search_radius: f64,
    /// Grid pitch of items inside a cluster.
    pub food_spacing: f64,
    pub ticks_per_second: u64,
    pub food_distribution: FoodDistribution,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        ArenaConfig {
            forage_min: Vec2::new(-9.5, -9.5),
            forage_max: Vec2::new(9.5, 9.5),
            nest_position: Vec2::ZERO,
            nest_radius: 0.25,
            food_radius: 0.05,
            search_radius: 0.25,
            food_spacing: 0.15,
            ticks_per_second: 16,
            food_distribution: FoodDistribution::default(),
        }
    }
}

/// Top-level simulation settings, loaded once and immutable afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub robot_count: usize,
    pub max_ticks: u64,
    /// Pitch of the start-up grid the robots are placed on around the nest.
    pub robot_spacing: f64,
    pub controller: ControllerParams,
    pub arena: ArenaConfig,
    pub cpfa: CpfaParams,
    /// Strength below which a pheromone trail stops being active.
    pub pheromone_threshold: f64,
    /// Distance between the drive wheels (m).
    pub wheel_base: f64,
    /// Centre-to-centre distance at which another robot counts as an obstruction.
    pub proximity_range: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            seed: 1337,
            robot_count: 12,
            max_ticks: 3600 * 16,
            robot_spacing: 0.2,
            controller: ControllerParams::default(),
            arena: ArenaConfig::default(),
            cpfa: CpfaParams::default(),
            pheromone_threshold: 0.001,
            wheel_base: 0.14,
            proximity_range: 0.22,
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> CpfaResult<Self> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> CpfaResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Rejects parameter sets that would make a probability branch or decay law ill-defined.
    pub fn validate(&self) -> CpfaResult<()> {
        let cpfa = &self.cpfa;
        for (name, p) in [
            ("probability_of_switching_to_searching", cpfa.probability_of_switching_to_searching),
            ("probability_of_returning_to_nest", cpfa.probability_of_returning_to_nest),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(invalid(format!("{} must lie in [0, 1], got {}", name, p)));
            }
        }
        for (name, rate) in [
            ("uninformed_search_variation_deg", cpfa.uninformed_search_variation_deg),
            ("rate_of_informed_search_decay", cpfa.rate_of_informed_search_decay),
            ("rate_of_site_fidelity", cpfa.rate_of_site_fidelity),
            ("rate_of_laying_pheromone", cpfa.rate_of_laying_pheromone),
        ] {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(invalid(format!("{} must be finite and >= 0, got {}", name, rate)));
            }
        }
        if !(cpfa.rate_of_pheromone_decay.is_finite() && cpfa.rate_of_pheromone_decay > 0.0) {
            return Err(CpfaError::InvalidDecayRate(cpfa.rate_of_pheromone_decay));
        }
        if !(self.pheromone_threshold > 0.0 && self.pheromone_threshold < 1.0) {
            return Err(invalid(format!(
                "pheromone_threshold must lie in (0, 1), got {}",
                self.pheromone_threshold
            )));
        }

        let ctl = &self.controller;
        for (name, v) in [
            ("distance_tolerance", ctl.distance_tolerance),
            ("search_step_size", ctl.search_step_size),
            ("angle_tolerance_deg", ctl.angle_tolerance_deg),
            ("wheel_base", self.wheel_base),
            ("nest_radius", self.arena.nest_radius),
            ("food_radius", self.arena.food_radius),
            ("search_radius", self.arena.search_radius),
            ("food_spacing", self.arena.food_spacing),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(invalid(format!("{} must be positive, got {}", name, v)));
            }
        }

        let arena = &self.arena;
        if arena.ticks_per_second < 2 {
            return Err(invalid(format!(
                "ticks_per_second must be at least 2, got {}",
                arena.ticks_per_second
            )));
        }
        if !(arena.forage_min.x < arena.forage_max.x && arena.forage_min.y < arena.forage_max.y) {
            return Err(invalid(format!(
                "empty forage range {:?}..{:?}",
                arena.forage_min, arena.forage_max
            )));
        }
        match arena.food_distribution {
            FoodDistribution::Random { .. } => {}
            FoodDistribution::Cluster { width, length, .. } => check_patch_fits(arena, width, length)?,
            FoodDistribution::PowerLaw { levels } => {
                if !(1..=MAX_POWER_LAW_LEVELS).contains(&levels) {
                    return Err(invalid(format!(
                        "power-law levels must lie in 1..={}, got {}",
                        MAX_POWER_LAW_LEVELS, levels
                    )));
                }
                let side = 1usize << (levels - 1);
                check_patch_fits(arena, side, side)?;
            }
        }
        Ok(())
    }
}

/// Deepest power-law hierarchy accepted; level 0 then holds a 128 x 128 patch.
pub const MAX_POWER_LAW_LEVELS: u32 = 8;

/// A food patch must fit inside the forage range.
fn check_patch_fits(arena: &ArenaConfig, width: usize, length: usize) -> CpfaResult<()> {
    let footprint = |n: usize| n.saturating_sub(1) as f64 * arena.food_spacing;
    let (span_x, span_y) = (
        arena.forage_max.x - arena.forage_min.x,
        arena.forage_max.y - arena.forage_min.y,
    );
    if footprint(width) > span_x || footprint(length) > span_y {
        return Err(invalid(format!(
            "{}x{} food patch at spacing {} does not fit in the {:.2}x{:.2} forage range",
            width, length, arena.food_spacing, span_x, span_y
        )));
    }
    Ok(())
}

fn invalid(msg: String) -> CpfaError {
    CpfaError::InvalidConfig(msg)
}
