use agentcore::{Agent, AgentId, AgentRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Summary of a registered agent
#[derive(Debug, Clone)]
pub struct AgentInfo {
    pub id: AgentId,
    pub name: String,
    pub description: String,
    pub functions: Vec<String>,
    pub running: bool,
}

/// In-memory agent registry, built up front and shared behind an `Arc`
pub struct AgentManager {
    agents: HashMap<AgentId, Arc<dyn Agent>>,
    names: HashMap<String, AgentId>,
}

impl AgentManager {
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
            names: HashMap::new(),
        }
    }

    /// Register an agent. Re-registering a name replaces the previous agent.
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> AgentId {
        let name = agent.name().to_string();
        if let Some(previous) = self.names.remove(&name) {
            tracing::warn!("Replacing agent: {}", name);
            self.agents.remove(&previous);
        }

        let id = Uuid::new_v4();
        tracing::info!("Registering agent: {} ({})", name, id);
        self.names.insert(name, id);
        self.agents.insert(id, agent);
        id
    }

    /// Look up by agent id, falling back to the agent name
    pub fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        let id = match Uuid::parse_str(agent_id) {
            Ok(id) => id,
            Err(_) => *self.names.get(agent_id)?,
        };
        self.agents.get(&id).cloned()
    }

    /// Details for every registered agent, sorted by name
    pub fn describe(&self) -> Vec<AgentInfo> {
        let mut infos: Vec<AgentInfo> = self
            .names
            .iter()
            .filter_map(|(name, id)| {
                let agent = self.agents.get(id)?;
                Some(AgentInfo {
                    id: *id,
                    name: name.clone(),
                    description: agent.description().to_string(),
                    functions: agent.functions(),
                    running: agent.is_running(),
                })
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl AgentRegistry for AgentManager {
    fn resolve(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.get(agent_id)
    }

    fn list_agents(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for AgentManager {
    fn default() -> Self {
        Self::new()
    }
}
