//! Core primitives: geometry, configuration and errors.

pub mod config;
pub mod error;
pub mod math;

pub use config::{ArenaConfig, ControllerParams, CpfaParams, FoodDistribution, SimulationConfig};
pub use error::{CpfaError, CpfaResult};
pub use math::Vec2;

/// Robot identifier, stable for the lifetime of a simulation.
pub type AgentId = u32;
