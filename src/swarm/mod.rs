//! Swarm Engine
//!
//! CPFA foraging swarm: per-robot controllers sharing a pheromone field, a
//! site fidelity registry and the arena's food set, driven by a headless
//! kinematic simulation.

pub mod agent;
pub mod arena;
pub mod fidelity;
pub mod navigation;
pub mod pheromone;
#[cfg(feature = "python")]
pub mod py_api;
pub mod rng;
pub mod scenario_test;
pub mod simulation;

pub use agent::{CpfaState, ForagingAgent, Phase};
pub use arena::SharedArenaState;
pub use fidelity::{SiteFidelityEntry, SiteFidelityRegistry};
pub use navigation::{MotorCommand, RobotIo};
pub use pheromone::{PheromoneField, PheromoneTrail};
pub use rng::{RandomSource, SimRng};
pub use simulation::{DifferentialDriveBody, ForagingSimulation, SimulationReport};
