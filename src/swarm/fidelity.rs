//! Site fidelity registry: each robot's most recent high-density discovery site.

use serde::Serialize;

use crate::core::{AgentId, Vec2};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SiteFidelityEntry {
    pub agent_id: AgentId,
    pub location: Vec2,
}

/// At most one live entry per agent; entries never decay.
#[derive(Clone, Debug, Default)]
pub struct SiteFidelityRegistry {
    entries: Vec<SiteFidelityEntry>,
}

impl SiteFidelityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing entry for `agent_id`.
    pub fn set_for(&mut self, agent_id: AgentId, location: Vec2) {
        self.clear_for(agent_id);
        self.entries.push(SiteFidelityEntry { agent_id, location });
    }

    pub fn clear_for(&mut self, agent_id: AgentId) -> Option<Vec2> {
        let idx = self.entries.iter().position(|e| e.agent_id == agent_id)?;
        Some(self.entries.remove(idx).location)
    }

    pub fn get(&self, agent_id: AgentId) -> Option<Vec2> {
        self.entries
            .iter()
            .find(|e| e.agent_id == agent_id)
            .map(|e| e.location)
    }

    pub fn snapshot(&self) -> Vec<SiteFidelityEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
