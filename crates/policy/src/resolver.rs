use ok_domain::policy::{Policy, PolicyMode};

/// Result of resolving a policy against one activation's input.
pub struct ResolvedPolicy {
    pub policy: Policy,
    pub escalated: bool,
    pub trigger: Option<String>,
}

/// Escalates a policy to `GlovesOff` when the activation input contains one
/// of its `gloves_off_triggers` as a case-insensitive substring. The base
/// policy otherwise passes through unchanged.
pub fn resolve(policy: &Policy, input: &str) -> ResolvedPolicy {
    let input_lower = input.to_lowercase();
    let trigger = policy
        .gloves_off_triggers
        .iter()
        .find(|t| input_lower.contains(&t.to_lowercase()))
        .cloned();

    match trigger {
        Some(trigger) => {
            let mut escalated = policy.clone();
            escalated.mode = PolicyMode::GlovesOff;
            ResolvedPolicy { policy: escalated, escalated: true, trigger: Some(trigger) }
        }
        None => ResolvedPolicy { policy: policy.clone(), escalated: false, trigger: None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ok_domain::policy::Policy;

    #[test]
    fn trigger_substring_escalates_to_gloves_off() {
        let mut policy = Policy::balanced();
        policy.gloves_off_triggers = vec!["YOLO MODE".into()];

        let resolved = resolve(&policy, "please enable yolo mode now");
        assert!(resolved.escalated);
        assert_eq!(resolved.policy.mode, PolicyMode::GlovesOff);
        assert_eq!(resolved.trigger.as_deref(), Some("YOLO MODE"));
    }

    #[test]
    fn no_trigger_passes_policy_through() {
        let policy = Policy::balanced();
        let resolved = resolve(&policy, "write the report");
        assert!(!resolved.escalated);
        assert_eq!(resolved.policy.mode, PolicyMode::Balanced);
    }
}
