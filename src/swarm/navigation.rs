//! Navigation primitives and the robot capability seam.

use serde::Serialize;
use tracing::trace;

use super::arena::SharedArenaState;
use super::rng::RandomSource;
use crate::core::config::ControllerParams;
use crate::core::math::{signed_normalize, Vec2};

/// Sensor/actuator surface a controller needs from its robot.
pub trait RobotIo {
    fn position(&self) -> Vec2;
    /// Compass heading in radians, counter-clockwise from +x.
    fn heading(&self) -> f64;
    /// True when the proximity ring reports an obstacle inside the forward window.
    fn obstruction_detected(&self) -> bool;
    fn set_wheel_speeds(&mut self, left: f64, right: f64);
}

/// Motor decision issued once per control step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MotorCommand {
    Forward,
    TurnLeft,
    TurnRight,
    /// Rotate in place away from an obstruction.
    AvoidCollision,
    Stop,
}

impl MotorCommand {
    /// (left, right) wheel speeds.
    pub fn wheel_speeds(self, ctl: &ControllerParams) -> (f64, f64) {
        let rot = ctl.robot_rotation_speed;
        match self {
            MotorCommand::Forward => (ctl.robot_forward_speed, ctl.robot_forward_speed),
            MotorCommand::TurnLeft | MotorCommand::AvoidCollision => (-rot, rot),
            MotorCommand::TurnRight => (rot, -rot),
            MotorCommand::Stop => (0.0, 0.0),
        }
    }
}

/// Pure steering rule.
///
/// `heading_error = normalize(heading − angle_to_target)`: negative means the
/// target is to the left. While `cooling_down`, tolerance turns are suppressed.
pub fn steer(
    position: Vec2,
    heading: f64,
    target: Vec2,
    obstructed: bool,
    cooling_down: bool,
    angle_tolerance: f64,
) -> MotorCommand {
    let heading_error = signed_normalize(heading - (target - position).angle());

    if obstructed {
        MotorCommand::AvoidCollision
    } else if heading_error <= -angle_tolerance && !cooling_down {
        MotorCommand::TurnLeft
    } else if heading_error >= angle_tolerance && !cooling_down {
        MotorCommand::TurnRight
    } else {
        MotorCommand::Forward
    }
}

/// Steers `io` toward `target` and writes the wheel speeds.
///
/// An obstruction arms a two-second cooldown stored in `collision_until`.
pub fn move_toward(
    io: &mut dyn RobotIo,
    target: Vec2,
    arena: &SharedArenaState,
    collision_until: &mut u64,
) -> MotorCommand {
    let ctl = arena.controller();
    let tick = arena.tick();
    let obstructed = io.obstruction_detected();
    let command = steer(
        io.position(),
        io.heading(),
        target,
        obstructed,
        tick < *collision_until,
        ctl.angle_tolerance(),
    );

    if command == MotorCommand::AvoidCollision {
        *collision_until = tick + arena.seconds_to_ticks(2);
    }

    let (left, right) = command.wheel_speeds(ctl);
    io.set_wheel_speeds(left, right);
    trace!("[Nav] tick {} -> {:?} toward ({:.2}, {:.2})", tick, command, target.x, target.y);
    command
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Edge {
    MinX,
    MaxX,
    MinY,
    MaxY,
}

/// Picks a point on one of the four arena edges.
///
/// A robot already sitting on an edge heads for the opposite one; anywhere else
/// the edge is chosen uniformly. The point is uniform along the chosen edge.
pub fn random_boundary_target(
    position: Vec2,
    arena: &SharedArenaState,
    rng: &mut dyn RandomSource,
) -> Vec2 {
    let cfg = arena.config();
    let (min, max) = (cfg.forage_min, cfg.forage_max);
    let tol_sq = arena.controller().distance_tolerance.powi(2);
    let near = |a: f64, b: f64| (a - b) * (a - b) < tol_sq;

    let edge = if near(position.x, max.x) {
        Edge::MinX
    } else if near(position.x, min.x) {
        Edge::MaxX
    } else if near(position.y, max.y) {
        Edge::MinY
    } else if near(position.y, min.y) {
        Edge::MaxY
    } else {
        match rng.uniform(0.0, 4.0) as u32 {
            0 => Edge::MinX,
            1 => Edge::MaxX,
            2 => Edge::MinY,
            _ => Edge::MaxY,
        }
    };

    let point = match edge {
        Edge::MinX => Vec2::new(min.x, rng.uniform(min.y, max.y)),
        Edge::MaxX => Vec2::new(max.x, rng.uniform(min.y, max.y)),
        Edge::MinY => Vec2::new(rng.uniform(min.x, max.x), min.y),
        Edge::MaxY => Vec2::new(rng.uniform(min.x, max.x), max.y),
    };
    arena.clamp_to_arena(point)
}


#[cfg(test)]
mod tests {
    use super::testing::FakeRobot;
    use super::*;
    use crate::core::SimulationConfig;
    use crate::swarm::rng::testing::ScriptedRng;
    use crate::swarm::rng::SimRng;
    use std::f64::consts::PI;

    const TOL: f64 = 15.0 * PI / 180.0;

    #[test]
    fn steering_turns_toward_target_side() {
        let target_left = Vec2::new(0.0, 1.0);
        let target_right = Vec2::new(0.0, -1.0);
        assert_eq!(steer(Vec2::ZERO, 0.0, target_left, false, false, TOL), MotorCommand::TurnLeft);
        assert_eq!(steer(Vec2::ZERO, 0.0, target_right, false, false, TOL), MotorCommand::TurnRight);
        assert_eq!(
            steer(Vec2::ZERO, 0.0, Vec2::new(1.0, 0.05), false, false, TOL),
            MotorCommand::Forward
        );
    }

    #[test]
    fn cooldown_suppresses_turning_but_not_avoidance() {
        let target = Vec2::new(0.0, 1.0);
        assert_eq!(steer(Vec2::ZERO, 0.0, target, false, true, TOL), MotorCommand::Forward);
        assert_eq!(steer(Vec2::ZERO, 0.0, target, true, true, TOL), MotorCommand::AvoidCollision);
    }

    #[test]
    fn obstruction_arms_cooldown_and_spins_left() {
        let cfg = SimulationConfig::default();
        let arena = SharedArenaState::new(&cfg, Vec::new());
        let mut robot = FakeRobot::at(0.0, 0.0);
        robot.obstructed = true;
        let mut cooldown = 0;
        let cmd = move_toward(&mut robot, Vec2::new(1.0, 0.0), &arena, &mut cooldown);
        assert_eq!(cmd, MotorCommand::AvoidCollision);
        assert_eq!(cooldown, 32);
        assert_eq!(robot.wheels, (-13.3, 13.3));
    }

    #[test]
    fn boundary_target_lies_on_an_edge() {
        let cfg = SimulationConfig::default();
        let arena = SharedArenaState::new(&cfg, Vec::new());
        let mut rng = SimRng::seeded(8);
        for _ in 0..200 {
            let p = random_boundary_target(Vec2::new(0.3, -0.2), &arena, &mut rng);
            let on_edge = p.x == -9.5 || p.x == 9.5 || p.y == -9.5 || p.y == 9.5;
            assert!(on_edge, "{:?} is not on an edge", p);
        }
    }

    #[test]
    fn robot_on_an_edge_heads_for_the_opposite_one() {
        let cfg = SimulationConfig::default();
        let arena = SharedArenaState::new(&cfg, Vec::new());
        let mut rng = ScriptedRng::constant(0.5);
        let p = random_boundary_target(Vec2::new(9.48, 2.0), &arena, &mut rng);
        assert_eq!(p.x, -9.5);
        let p = random_boundary_target(Vec2::new(1.0, -9.5), &arena, &mut rng);
        assert_eq!(p.y, 9.5);
    }
}
