use thiserror::Error;

use super::AgentId;

/// Errors surfaced by configuration loading and controller dispatch.
#[derive(Debug, Error)]
pub enum CpfaError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("pheromone decay rate must be positive, got {0}")]
    InvalidDecayRate(f64),

    /// The controller detected corrupted internal state and stopped dispatching.
    #[error("agent {agent_id} halted: {reason}")]
    AgentHalted { agent_id: AgentId, reason: String },
}

pub type CpfaResult<T> = Result<T, CpfaError>;
