//! CPFA foraging controller.
//!
//! One `ForagingAgent` per robot. Each tick the driver hands it the robot's
//! `RobotIo`, the shared arena and the simulation's random source; the agent
//! updates its phase and issues exactly one motor command.

use serde::Serialize;
use std::f64::consts::{PI, TAU};
use tracing::{debug, error, warn};

use super::arena::SharedArenaState;
use super::navigation::{move_toward, random_boundary_target, MotorCommand, RobotIo};
use super::pheromone::PheromoneTrail;
use super::rng::RandomSource;
use crate::core::math::{exponential_decay, get_bound, poisson_cdf};
use crate::core::{AgentId, CpfaError, CpfaResult, Vec2};

/// A trail snapshot being walked back toward its origin during a departure.
#[derive(Clone, Debug, PartialEq)]
pub struct TrailFollow {
    pub waypoints: Vec<Vec2>,
    /// Waypoint currently targeted; decreases toward the origin end.
    pub index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Toward the nest end of the trail.
    Forward,
    /// Toward the discovery site.
    Backward,
}

/// A trail detected while searching, before the agent commits to it.
#[derive(Clone, Debug, PartialEq)]
pub struct TrailSearch {
    pub origin: Vec2,
    pub waypoints: Vec<Vec2>,
    pub index: usize,
    /// `None` until the first tick after detection.
    pub direction: Option<Direction>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
    Departing { follow: Option<TrailFollow> },
    Searching { trail: Option<TrailSearch> },
    Returning { giving_up: bool },
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Returning { giving_up: false }
    }
}

/// Payload-free view of `Phase` for reports and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CpfaState {
    Departing,
    Searching,
    Returning,
}

impl Phase {
    pub fn state(&self) -> CpfaState {
        match self {
            Phase::Departing { .. } => CpfaState::Departing,
            Phase::Searching { .. } => CpfaState::Searching,
            Phase::Returning { .. } => CpfaState::Returning,
        }
    }
}

/// Positions recorded while carrying food, with cyclic polarity labels.
#[derive(Clone, Debug, Default)]
struct TrailBuffer {
    waypoints: Vec<Vec2>,
    polarity: Vec<u8>,
    next_polarity: u8,
}

impl TrailBuffer {
    fn push(&mut self, position: Vec2) {
        self.waypoints.push(position);
        self.polarity.push(self.next_polarity);
        self.next_polarity = (self.next_polarity + 1) % 3;
    }

    fn clear(&mut self) {
        *self = TrailBuffer::default();
    }
}

enum TrailProgress {
    Searching(TrailSearch),
    Departing(Option<TrailFollow>),
}

#[derive(Clone, Debug)]
pub struct ForagingAgent {
    id: AgentId,
    phase: Phase,
    target: Vec2,
    final_target: Vec2,
    fidelity_position: Option<Vec2>,
    using_site_fidelity: bool,
    informed: bool,
    holding_food: bool,
    resource_density: usize,
    trail_buffer: TrailBuffer,
    search_ticks: u64,
    wait_until: u64,
    collision_until: u64,
    halted: Option<String>,
    food_delivered: usize,
    trails_laid: usize,
}

impl ForagingAgent {
    /// Agent in its post-reset state: returning to `nest` with nothing in hand.
    pub fn new(id: AgentId, nest: Vec2) -> Self {
        ForagingAgent {
            id,
            phase: Phase::default(),
            target: nest,
            final_target: nest,
            fidelity_position: None,
            using_site_fidelity: false,
            informed: false,
            holding_food: false,
            resource_density: 0,
            trail_buffer: TrailBuffer::default(),
            search_ticks: 0,
            wait_until: 0,
            collision_until: 0,
            halted: None,
            food_delivered: 0,
            trails_laid: 0,
        }
    }

    /// Uninformed agent already heading out toward `target`.
    pub fn departing(id: AgentId, target: Vec2) -> Self {
        ForagingAgent {
            phase: Phase::Departing { follow: None },
            ..Self::new(id, target)
        }
    }

    /// Drops all per-trip state and heads back to the nest. Lifetime counters survive.
    pub fn reset(&mut self, nest: Vec2) {
        let (food_delivered, trails_laid) = (self.food_delivered, self.trails_laid);
        *self = ForagingAgent {
            food_delivered,
            trails_laid,
            ..Self::new(self.id, nest)
        };
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn state(&self) -> CpfaState {
        self.phase.state()
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn final_target(&self) -> Vec2 {
        self.final_target
    }

    pub fn fidelity_position(&self) -> Option<Vec2> {
        self.fidelity_position
    }

    pub fn is_using_site_fidelity(&self) -> bool {
        self.using_site_fidelity
    }

    pub fn is_informed(&self) -> bool {
        self.informed
    }

    pub fn is_holding_food(&self) -> bool {
        self.holding_food
    }

    pub fn resource_density(&self) -> usize {
        self.resource_density
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn food_delivered(&self) -> usize {
        self.food_delivered
    }

    pub fn trails_laid(&self) -> usize {
        self.trails_laid
    }

    /// Runs one controller tick against the robot and the shared arena.
    ///
    /// A halted agent only ever returns `AgentHalted`.
    pub fn control_step(
        &mut self,
        io: &mut dyn RobotIo,
        arena: &mut SharedArenaState,
        rng: &mut dyn RandomSource,
    ) -> CpfaResult<()> {
        if let Some(reason) = &self.halted {
            return Err(CpfaError::AgentHalted {
                agent_id: self.id,
                reason: reason.clone(),
            });
        }
        if let Err(reason) = self.check_invariants() {
            error!("[CPFA] Agent {} halted: {}", self.id, reason);
            self.halted = Some(reason.clone());
            stop(io, arena);
            return Err(CpfaError::AgentHalted {
                agent_id: self.id,
                reason,
            });
        }

        // pickup scan pause
        if arena.tick() < self.wait_until {
            stop(io, arena);
            return Ok(());
        }

        let position = io.position();
        let heading = io.heading();
        let before = self.state();

        self.phase = match std::mem::take(&mut self.phase) {
            Phase::Departing { follow } => self.depart(position, heading, follow, arena, rng),
            Phase::Searching { trail } => self.search(position, heading, trail, arena, rng),
            Phase::Returning { giving_up } => self.return_home(position, giving_up, arena, rng),
        };

        if self.state() != before {
            debug!(
                "[CPFA] Agent {} {:?} -> {:?} at tick {}",
                self.id,
                before,
                self.state(),
                arena.tick()
            );
        }

        move_toward(io, self.target, arena, &mut self.collision_until);
        Ok(())
    }

    fn check_invariants(&self) -> Result<(), String> {
        match &self.phase {
            Phase::Departing { follow } => {
                if self.holding_food {
                    return Err("holding food while departing".to_string());
                }
                if let Some(f) = follow {
                    check_trail_index(f.waypoints.len(), f.index)?;
                }
            }
            Phase::Searching { trail: Some(s) } => check_trail_index(s.waypoints.len(), s.index)?,
            _ => {}
        }
        Ok(())
    }

    fn depart(
        &mut self,
        position: Vec2,
        heading: f64,
        mut follow: Option<TrailFollow>,
        arena: &mut SharedArenaState,
        rng: &mut dyn RandomSource,
    ) -> Phase {
        let r = rng.uniform(0.0, 1.0);
        let tol_sq = arena.controller().distance_tolerance.powi(2);

        if position.square_distance(self.final_target) < tol_sq {
            self.search_ticks = 0;
            if self.using_site_fidelity {
                self.using_site_fidelity = false;
                if let Some(site) = self.fidelity_position {
                    arena.fidelity_mut().set_for(self.id, site);
                }
            }
            return Phase::Searching { trail: None };
        }

        let mut exhausted = false;
        if let Some(f) = follow.as_mut() {
            if position.square_distance(self.target) < tol_sq {
                let next = f
                    .index
                    .checked_sub(1)
                    .and_then(|i| f.waypoints.get(i).map(|w| (i, *w)));
                match next {
                    Some((i, waypoint)) => {
                        f.index = i;
                        self.target = arena.clamp_to_arena(waypoint);
                    }
                    None => exhausted = true,
                }
            }
        }
        if exhausted {
            follow = None;
            self.target = self.final_target;
        }

        if !self.informed && r < arena.params().probability_of_switching_to_searching {
            self.search_ticks = 0;
            let turn = rng.gaussian(arena.params().uninformed_search_variation());
            self.target = step_target(position, heading + turn, arena);
            return Phase::Searching { trail: None };
        }

        Phase::Departing { follow }
    }

    fn search(
        &mut self,
        position: Vec2,
        heading: f64,
        mut trail: Option<TrailSearch>,
        arena: &mut SharedArenaState,
        rng: &mut dyn RandomSource,
    ) -> Phase {
        let tol_sq = arena.controller().distance_tolerance.powi(2);

        if let Some(found) = trail.take() {
            match self.walk_found_trail(position, found, arena, rng) {
                TrailProgress::Searching(found) => trail = Some(found),
                TrailProgress::Departing(follow) => return Phase::Departing { follow },
            }
        }

        if arena.is_scan_tick() {
            self.check_food(position, arena);
            if trail.is_none() && !self.holding_food {
                trail = self.detect_trail(position, arena);
            }
        }

        if self.holding_food {
            self.target = arena.clamp_to_arena(arena.nest_position());
            return Phase::Returning { giving_up: false };
        }

        if rng.uniform(0.0, 1.0) < arena.params().probability_of_returning_to_nest {
            self.target = arena.clamp_to_arena(arena.nest_position());
            return Phase::Returning { giving_up: true };
        }

        if trail.is_none() && position.square_distance(self.target) < tol_sq {
            let usv = arena.params().uninformed_search_variation();
            let turn = if self.informed {
                let correlation = exponential_decay(
                    2.0 * (TAU - usv),
                    self.search_ticks as f64,
                    arena.params().rate_of_informed_search_decay,
                );
                self.search_ticks += 1;
                get_bound(rng.gaussian(correlation + usv), -PI, PI)
            } else {
                rng.gaussian(usv)
            };
            self.target = step_target(position, heading + turn, arena);
        }

        Phase::Searching { trail }
    }

    fn detect_trail(&self, position: Vec2, arena: &SharedArenaState) -> Option<TrailSearch> {
        let tolerance = arena.controller().distance_tolerance;
        let (trail, index) = arena.pheromones().find_near(position, tolerance)?;
        debug!(
            "[CPFA] Agent {} found a trail at waypoint {}/{}",
            self.id,
            index,
            trail.waypoints().len()
        );
        Some(TrailSearch {
            origin: trail.origin(),
            waypoints: trail.waypoints().to_vec(),
            index,
            direction: None,
        })
    }

    /// Direction resolution on the first tick after detection, then one step
    /// along the trail before handing over to an informed departure.
    fn walk_found_trail(
        &mut self,
        position: Vec2,
        mut found: TrailSearch,
        arena: &SharedArenaState,
        rng: &mut dyn RandomSource,
    ) -> TrailProgress {
        if found.direction.is_none() {
            let direction = if rng.coin_flip() {
                Direction::Forward
            } else {
                Direction::Backward
            };
            found.direction = Some(direction);
            let next = match direction {
                Direction::Forward => Some(found.index + 1).filter(|i| *i < found.waypoints.len()),
                Direction::Backward => found.index.checked_sub(1),
            };
            return match next {
                Some(i) => {
                    found.index = i;
                    self.target = arena.clamp_to_arena(found.waypoints[i]);
                    TrailProgress::Searching(found)
                }
                None => self.leave_trail_toward_origin(found, arena),
            };
        }

        let tol_sq = arena.controller().distance_tolerance.powi(2);
        if position.square_distance(self.target) < tol_sq {
            self.leave_trail_toward_origin(found, arena)
        } else {
            TrailProgress::Searching(found)
        }
    }

    fn leave_trail_toward_origin(&mut self, found: TrailSearch, arena: &SharedArenaState) -> TrailProgress {
        self.final_target = arena.clamp_to_arena(found.origin);
        self.informed = true;
        match found.index.checked_sub(1) {
            Some(i) => {
                self.target = arena.clamp_to_arena(found.waypoints[i]);
                TrailProgress::Departing(Some(TrailFollow {
                    waypoints: found.waypoints,
                    index: i,
                }))
            }
            None => {
                self.target = self.final_target;
                TrailProgress::Departing(None)
            }
        }
    }

    fn return_home(
        &mut self,
        position: Vec2,
        giving_up: bool,
        arena: &mut SharedArenaState,
        rng: &mut dyn RandomSource,
    ) -> Phase {
        self.check_food(position, arena);
        if self.holding_food || !arena.in_nest(position) {
            return Phase::Returning { giving_up };
        }

        let density = self.resource_density as f64;
        let lay_cdf = poisson_cdf(density, arena.params().rate_of_laying_pheromone);
        let fidelity_cdf = poisson_cdf(density, arena.params().rate_of_site_fidelity);
        let r1 = rng.uniform(0.0, 1.0);
        let r2 = rng.uniform(0.0, 1.0);

        if lay_cdf > r1 && !giving_up {
            self.lay_trail(arena);
        }
        self.trail_buffer.clear();

        let mut follow = None;
        let revisit = self
            .fidelity_position
            .filter(|_| self.using_site_fidelity && fidelity_cdf > r2);

        if let Some(site) = revisit {
            self.target = arena.clamp_to_arena(site);
            self.informed = true;
        } else if let Some((origin, waypoints)) = arena
            .pheromones()
            .select_weighted(rng)
            .map(|t| (t.origin(), t.waypoints().to_vec()))
        {
            let index = waypoints.len().saturating_sub(1);
            self.target = arena.clamp_to_arena(waypoints[index]);
            follow = Some(TrailFollow { waypoints, index });
            self.final_target = arena.clamp_to_arena(origin);
            self.informed = true;
            self.using_site_fidelity = false;
            arena.fidelity_mut().clear_for(self.id);
        } else {
            self.target = random_boundary_target(position, arena, rng);
            self.informed = false;
            self.using_site_fidelity = false;
            arena.fidelity_mut().clear_for(self.id);
        }
        if follow.is_none() {
            self.final_target = self.target;
        }

        Phase::Departing { follow }
    }

    fn lay_trail(&mut self, arena: &mut SharedArenaState) {
        let Some(origin) = self.fidelity_position else {
            return;
        };
        self.trail_buffer.push(arena.nest_position());
        let buffer = std::mem::take(&mut self.trail_buffer);
        let waypoint_count = buffer.waypoints.len();
        let trail = PheromoneTrail::with_strength(
            origin,
            buffer.waypoints,
            buffer.polarity,
            arena.tick(),
            arena.pheromone_decay_per_tick(),
            1.0,
            arena.pheromone_threshold(),
        );
        match trail {
            Ok(trail) => {
                arena.deposit_trail(trail);
                self.trails_laid += 1;
                debug!(
                    "[CPFA] Agent {} laid a {}-waypoint trail from ({:.2}, {:.2})",
                    self.id, waypoint_count, origin.x, origin.y
                );
            }
            Err(e) => warn!("[CPFA] Agent {} could not lay trail: {}", self.id, e),
        }
    }

    /// Pickup when empty-handed, drop-off when holding inside the nest, and
    /// trail recording while carrying.
    fn check_food(&mut self, position: Vec2, arena: &mut SharedArenaState) {
        if !self.holding_food {
            if arena.claim_food_near(position).is_some() {
                self.holding_food = true;
                self.resource_density = arena.count_food_within(position) + 1;
                self.fidelity_position = Some(position);
                self.using_site_fidelity = true;
                self.wait_until = arena.tick() + arena.seconds_to_ticks(4);
                debug!(
                    "[CPFA] Agent {} picked up food (density {})",
                    self.id, self.resource_density
                );
            }
        } else if arena.in_nest(position) {
            self.holding_food = false;
            self.food_delivered += 1;
            arena.record_delivery();
        }

        if self.holding_food && arena.is_scan_tick() && !arena.in_nest(position) {
            self.trail_buffer.push(position);
        }
    }
}

fn check_trail_index(len: usize, index: usize) -> Result<(), String> {
    if len == 0 {
        Err("followed trail has no waypoints".to_string())
    } else if index >= len {
        Err(format!("trail index {} out of range for {} waypoints", index, len))
    } else {
        Ok(())
    }
}

fn step_target(position: Vec2, heading: f64, arena: &SharedArenaState) -> Vec2 {
    let step = arena.controller().search_step_size;
    arena.clamp_to_arena(position + Vec2::from_polar(step, heading))
}

fn stop(io: &mut dyn RobotIo, arena: &SharedArenaState) {
    let (left, right) = MotorCommand::Stop.wheel_speeds(arena.controller());
    io.set_wheel_speeds(left, right);
}
