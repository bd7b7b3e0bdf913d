use std::collections::HashMap;
use std::sync::Arc;

use ok_domain::agent::AgentProfile;
use parking_lot::RwLock;

/// Agent profiles keyed by VFS path. The kernel never parses agent
/// markdown itself — a host adapter populates this before activations
/// naming that path can be scheduled.
pub struct AgentRegistry {
    profiles: RwLock<HashMap<String, AgentProfile>>,
}

impl AgentRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { profiles: RwLock::new(HashMap::new()) })
    }

    pub fn register(&self, profile: AgentProfile) {
        self.profiles.write().insert(profile.path.clone(), profile);
    }

    pub fn get(&self, path: &str) -> Option<AgentProfile> {
        self.profiles.read().get(path).cloned()
    }

    pub fn all(&self) -> Vec<AgentProfile> {
        self.profiles.read().values().cloned().collect()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self { profiles: RwLock::new(HashMap::new()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ok_domain::policy::Policy;

    fn profile(path: &str) -> AgentProfile {
        AgentProfile {
            id: path.to_string(),
            path: path.to_string(),
            name: path.to_string(),
            model: None,
            system_prompt: "be helpful".to_string(),
            custom_tools: vec![],
            policy: Policy::balanced(),
        }
    }

    #[test]
    fn register_then_get_round_trips() {
        let registry = AgentRegistry::new();
        registry.register(profile("agents/writer.md"));
        assert!(registry.get("agents/writer.md").is_some());
        assert!(registry.get("agents/missing.md").is_none());
    }
}
