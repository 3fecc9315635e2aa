//! Headless foraging simulation.
//!
//! Owns the arena, one controller and one kinematic body per robot, and the
//! single random source every stochastic branch draws from.

use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

use super::agent::{CpfaState, ForagingAgent};
use super::arena::SharedArenaState;
use super::fidelity::SiteFidelityEntry;
use super::navigation::RobotIo;
use super::pheromone::PheromoneTrail;
use super::rng::{RandomSource, SimRng};
use crate::core::math::signed_normalize;
use crate::core::{AgentId, CpfaResult, SimulationConfig, Vec2};

/// Wheel speeds are configured in cm/s.
const CM_PER_M: f64 = 100.0;

/// Unicycle-model robot body integrated once per tick.
#[derive(Clone, Debug)]
pub struct DifferentialDriveBody {
    position: Vec2,
    heading: f64,
    left: f64,
    right: f64,
    wheel_base: f64,
    dt: f64,
    obstructed: bool,
    bounds: (Vec2, Vec2),
}

impl DifferentialDriveBody {
    pub fn new(position: Vec2, heading: f64, config: &SimulationConfig) -> Self {
        DifferentialDriveBody {
            position,
            heading: signed_normalize(heading),
            left: 0.0,
            right: 0.0,
            wheel_base: config.wheel_base,
            dt: 1.0 / config.arena.ticks_per_second as f64,
            obstructed: false,
            bounds: (config.arena.forage_min, config.arena.forage_max),
        }
    }

    pub fn set_obstructed(&mut self, obstructed: bool) {
        self.obstructed = obstructed;
    }

    pub fn wheel_speeds(&self) -> (f64, f64) {
        (self.left, self.right)
    }

    /// Advances the body by one tick under the current wheel speeds.
    pub fn integrate(&mut self) {
        let v_left = self.left / CM_PER_M;
        let v_right = self.right / CM_PER_M;
        let linear = 0.5 * (v_left + v_right);
        let angular = (v_right - v_left) / self.wheel_base;

        self.heading = signed_normalize(self.heading + angular * self.dt);
        let next = self.position + Vec2::from_polar(linear * self.dt, self.heading);
        let (min, max) = self.bounds;
        self.position = Vec2::new(next.x.clamp(min.x, max.x), next.y.clamp(min.y, max.y));
    }
}

impl RobotIo for DifferentialDriveBody {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn heading(&self) -> f64 {
        self.heading
    }

    fn obstruction_detected(&self) -> bool {
        self.obstructed
    }

    fn set_wheel_speeds(&mut self, left: f64, right: f64) {
        self.left = left;
        self.right = right;
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AgentSummary {
    pub id: AgentId,
    pub state: CpfaState,
    pub food_delivered: usize,
    pub trails_laid: usize,
    pub halted: bool,
}

/// End-of-run statistics.
#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub ticks: u64,
    pub food_collected: usize,
    pub food_remaining: usize,
    pub active_trails: usize,
    pub fidelity_sites: usize,
    pub trails_laid: usize,
    pub halted_agents: usize,
    pub agents: Vec<AgentSummary>,
}

pub struct ForagingSimulation {
    config: SimulationConfig,
    arena: SharedArenaState,
    agents: Vec<ForagingAgent>,
    bodies: Vec<DifferentialDriveBody>,
    rng: SimRng,
}

impl ForagingSimulation {
    /// Validates `config`, scatters food and places the robots around the nest.
    pub fn new(config: SimulationConfig) -> CpfaResult<Self> {
        config.validate()?;
        let mut rng = SimRng::seeded(config.seed);
        let arena = SharedArenaState::populated(&config, &mut rng);
        Ok(Self::assemble(config, arena, rng))
    }

    /// Same as `new` but with an explicit food set.
    pub fn with_food(config: SimulationConfig, food: Vec<Vec2>) -> CpfaResult<Self> {
        config.validate()?;
        let rng = SimRng::seeded(config.seed);
        let arena = SharedArenaState::new(&config, food);
        Ok(Self::assemble(config, arena, rng))
    }

    fn assemble(config: SimulationConfig, arena: SharedArenaState, mut rng: SimRng) -> Self {
        let nest = arena.nest_position();
        let n = config.robot_count;
        let cols = (n as f64).sqrt().ceil().max(1.0) as usize;
        let rows = n.div_ceil(cols);
        let offset = Vec2::new(
            (cols as f64 - 1.0) * 0.5 * config.robot_spacing,
            (rows as f64 - 1.0) * 0.5 * config.robot_spacing,
        );

        let mut agents = Vec::with_capacity(n);
        let mut bodies = Vec::with_capacity(n);
        for i in 0..n {
            let cell = Vec2::new((i % cols) as f64, (i / cols) as f64) * config.robot_spacing;
            let position = arena.clamp_to_arena(nest + cell - offset);
            let heading = rng.uniform(-std::f64::consts::PI, std::f64::consts::PI);
            agents.push(ForagingAgent::new(i as AgentId, nest));
            bodies.push(DifferentialDriveBody::new(position, heading, &config));
        }

        info!(
            "[Sim] Ready: {} robots, {} food items, seed {}",
            n,
            arena.food().len(),
            config.seed
        );

        ForagingSimulation {
            config,
            arena,
            agents,
            bodies,
            rng,
        }
    }

    /// One simulation step: clock and decay, sensing, control, then motion.
    pub fn tick(&mut self) -> u64 {
        let tick = self.arena.advance_tick();
        self.refresh_obstructions();

        for (agent, body) in self.agents.iter_mut().zip(self.bodies.iter_mut()) {
            if agent.is_halted() {
                continue;
            }
            if let Err(e) = agent.control_step(body, &mut self.arena, &mut self.rng) {
                warn!("[Sim] tick {}: {}", tick, e);
            }
        }

        for body in &mut self.bodies {
            body.integrate();
        }
        tick
    }

    /// Flags every robot that has another robot close ahead of it.
    fn refresh_obstructions(&mut self) {
        let range_sq = self.config.proximity_range * self.config.proximity_range;
        let window = self.config.controller.angle_tolerance();
        let poses: Vec<(Vec2, f64)> = self
            .bodies
            .iter()
            .map(|b| (b.position(), b.heading()))
            .collect();

        for (i, body) in self.bodies.iter_mut().enumerate() {
            let (pos, heading) = poses[i];
            let blocked = poses.iter().enumerate().any(|(j, (other, _))| {
                if i == j {
                    return false;
                }
                let offset = *other - pos;
                offset.square_length() < range_sq
                    && signed_normalize(offset.angle() - heading).abs() < window
            });
            body.set_obstructed(blocked);
        }
    }

    /// True at `max_ticks`, or once the ground is bare and every carried item is home.
    pub fn is_finished(&self) -> bool {
        if self.arena.tick() >= self.config.max_ticks {
            return true;
        }
        self.arena.food().is_empty() && self.food_carried() == 0
    }

    /// Items held by robots that can still deliver them.
    pub fn food_carried(&self) -> usize {
        self.agents
            .iter()
            .filter(|a| a.is_holding_food() && !a.is_halted())
            .count()
    }

    /// Runs until `max_ticks` or until all food has been delivered.
    pub fn run(&mut self) -> SimulationReport {
        let start = Instant::now();
        while !self.is_finished() {
            self.tick();
        }
        let report = self.report();
        info!(
            "[Sim] Finished after {} ticks in {:?}: {} collected, {} remaining, {} active trails",
            report.ticks,
            start.elapsed(),
            report.food_collected,
            report.food_remaining,
            report.active_trails
        );
        report
    }

    pub fn report(&self) -> SimulationReport {
        let agents: Vec<AgentSummary> = self
            .agents
            .iter()
            .map(|a| AgentSummary {
                id: a.id(),
                state: a.state(),
                food_delivered: a.food_delivered(),
                trails_laid: a.trails_laid(),
                halted: a.is_halted(),
            })
            .collect();

        SimulationReport {
            seed: self.config.seed,
            ticks: self.arena.tick(),
            food_collected: self.arena.food_delivered(),
            food_remaining: self.arena.food().len(),
            active_trails: self.arena.pheromones().active_count(),
            fidelity_sites: self.arena.fidelity().len(),
            trails_laid: agents.iter().map(|a| a.trails_laid).sum(),
            halted_agents: agents.iter().filter(|a| a.halted).count(),
            agents,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn arena(&self) -> &SharedArenaState {
        &self.arena
    }

    pub fn agents(&self) -> &[ForagingAgent] {
        &self.agents
    }

    pub fn bodies(&self) -> &[DifferentialDriveBody] {
        &self.bodies
    }

    pub fn food(&self) -> &[Vec2] {
        self.arena.food()
    }

    pub fn trails(&self) -> Vec<&PheromoneTrail> {
        self.arena.pheromones().active().collect()
    }

    pub fn fidelity_sites(&self) -> Vec<SiteFidelityEntry> {
        self.arena.fidelity().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FoodDistribution;

    fn small_config(seed: u64) -> SimulationConfig {
        let mut cfg = SimulationConfig::default();
        cfg.seed = seed;
        cfg.robot_count = 6;
        cfg.max_ticks = 400;
        cfg.arena.food_distribution = FoodDistribution::Random { count: 40 };
        cfg
    }

    #[test]
    fn run_waits_for_carried_food_to_reach_the_nest() {
        let mut cfg = SimulationConfig::default();
        cfg.robot_count = 1;
        // the lone robot starts on the nest, right on top of the only item
        let mut sim = ForagingSimulation::with_food(cfg, vec![Vec2::ZERO]).unwrap();

        sim.tick();
        assert!(sim.food().is_empty());
        assert_eq!(sim.food_carried(), 1);
        assert!(!sim.is_finished());

        let report = sim.run();
        assert_eq!(report.food_collected, 1);
        assert_eq!(sim.food_carried(), 0);
        assert!(report.ticks < 100);
    }

    #[test]
    fn body_drives_straight_and_turns_in_place() {
        let cfg = SimulationConfig::default();
        let mut body = DifferentialDriveBody::new(Vec2::ZERO, 0.0, &cfg);
        body.set_wheel_speeds(16.0, 16.0);
        for _ in 0..16 {
            body.integrate();
        }
        assert!((body.position().x - 0.16).abs() < 1e-9);
        assert_eq!(body.heading(), 0.0);

        body.set_wheel_speeds(-13.3, 13.3);
        body.integrate();
        assert!(body.heading() > 0.0);
        assert!((body.position().x - 0.16).abs() < 1e-9);
    }

    #[test]
    fn body_is_clamped_to_the_arena() {
        let cfg = SimulationConfig::default();
        let mut body = DifferentialDriveBody::new(Vec2::new(9.49, 0.0), 0.0, &cfg);
        body.set_wheel_speeds(16.0, 16.0);
        for _ in 0..100 {
            body.integrate();
        }
        assert_eq!(body.position().x, 9.5);
    }

    #[test]
    fn robots_start_on_a_grid_around_the_nest() {
        let sim = ForagingSimulation::new(small_config(1)).unwrap();
        assert_eq!(sim.agents().len(), 6);
        for body in sim.bodies() {
            assert!(body.position().length() < 0.5);
        }
        assert_eq!(sim.food().len(), 40);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = small_config(1);
        cfg.cpfa.rate_of_pheromone_decay = 0.0;
        assert!(ForagingSimulation::new(cfg).is_err());
    }

    #[test]
    fn food_is_conserved() {
        let mut sim = ForagingSimulation::new(small_config(3)).unwrap();
        for _ in 0..400 {
            sim.tick();
            let carried = sim.agents().iter().filter(|a| a.is_holding_food()).count();
            assert_eq!(sim.food().len() + carried + sim.arena().food_delivered(), 40);
        }
    }

    #[test]
    fn same_seed_reproduces_the_run() {
        let a = ForagingSimulation::new(small_config(21)).unwrap().run();
        let b = ForagingSimulation::new(small_config(21)).unwrap().run();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert_eq!(a.ticks, 400);
        assert_eq!(a.halted_agents, 0);
    }
}
