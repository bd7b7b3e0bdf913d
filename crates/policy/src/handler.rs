use ok_domain::policy::{Policy, PolicyMode};

use crate::glob::matches_any;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    Blocked(String),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allowed)
    }
}

fn path_arg(args: &serde_json::Value) -> &str {
    args.get("path").and_then(|v| v.as_str()).unwrap_or("")
}

fn prefix_arg(args: &serde_json::Value) -> &str {
    args.get("prefix").and_then(|v| v.as_str()).unwrap_or("")
}

/// Handler-side access check for one tool invocation, in the short-circuit
/// order SPEC_FULL.md §4.8 specifies: blocked tool, then allowlist, then
/// custom-tool permission, then per-tool path/permission checks.
///
/// `is_custom` tells the resolver whether `tool` is a custom tool the agent
/// profile registered (as opposed to a built-in) — the tool registry, not
/// this crate, knows that distinction.
pub fn check(policy: &Policy, tool: &str, args: &serde_json::Value, is_custom: bool) -> PolicyDecision {
    if policy.mode == PolicyMode::GlovesOff {
        return PolicyDecision::Allowed;
    }

    if policy.blocked_tools.contains(tool) {
        return PolicyDecision::Blocked(format!("tool '{tool}' is blocked by policy"));
    }

    if !policy.allowed_tools.is_empty() && !policy.allowed_tools.contains(tool) {
        return PolicyDecision::Blocked(format!("tool '{tool}' is not in the allowed-tools list"));
    }

    if is_custom && !policy.permissions.custom_tools {
        return PolicyDecision::Blocked("custom tools are not permitted for this agent".to_string());
    }

    match tool {
        "spawn_agent" if !policy.permissions.spawn_agents => {
            PolicyDecision::Blocked("spawning agents is not permitted".to_string())
        }
        "signal_parent" if !policy.permissions.signal_parent => {
            PolicyDecision::Blocked("signaling the parent is not permitted".to_string())
        }
        "web_fetch" | "web_search" if !policy.permissions.web_access => {
            PolicyDecision::Blocked("web access is not permitted".to_string())
        }
        "vfs_delete" if !policy.permissions.delete_files => {
            PolicyDecision::Blocked("deleting files is not permitted".to_string())
        }
        "vfs_write" | "vfs_delete" if path_arg(args).trim_start_matches('/').starts_with("agents/") && !policy.permissions.edit_agents => {
            PolicyDecision::Blocked("editing agent files is not permitted".to_string())
        }
        "vfs_read" => {
            let path = path_arg(args);
            if path.is_empty() || matches_any(&policy.reads, path) {
                PolicyDecision::Allowed
            } else {
                PolicyDecision::Blocked(format!("path '{path}' is outside the allowed read scope"))
            }
        }
        "vfs_list" => {
            let prefix = prefix_arg(args);
            let allowed = policy.reads.iter().any(|p| {
                let base = p.literal_base();
                prefix.starts_with(base) || base.starts_with(prefix)
            });
            if allowed {
                PolicyDecision::Allowed
            } else {
                PolicyDecision::Blocked(format!("prefix '{prefix}' is outside the allowed read scope"))
            }
        }
        "vfs_write" | "vfs_delete" => {
            let path = path_arg(args);
            if matches_any(&policy.writes, path) {
                PolicyDecision::Allowed
            } else {
                PolicyDecision::Blocked(format!("path '{path}' is outside the allowed write scope"))
            }
        }
        _ => PolicyDecision::Allowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ok_domain::policy::Policy;
    use serde_json::json;

    #[test]
    fn gloves_off_allows_everything() {
        let mut policy = Policy::balanced();
        policy.mode = PolicyMode::GlovesOff;
        policy.blocked_tools.insert("vfs_delete".to_string());
        assert!(check(&policy, "vfs_delete", &json!({"path": "agents/x.md"}), false).is_allowed());
    }

    #[test]
    fn blocked_tool_short_circuits_before_per_tool_checks() {
        let mut policy = Policy::balanced();
        policy.blocked_tools.insert("spawn_agent".to_string());
        assert!(!check(&policy, "spawn_agent", &json!({}), false).is_allowed());
    }

    #[test]
    fn allowlist_rejects_tools_outside_it() {
        let mut policy = Policy::balanced();
        policy.allowed_tools.insert("vfs_read".to_string());
        assert!(check(&policy, "vfs_read", &json!({"path": "artifacts/x.md"}), false).is_allowed());
        assert!(!check(&policy, "vfs_write", &json!({"path": "artifacts/x.md"}), false).is_allowed());
    }

    #[test]
    fn writing_under_agents_requires_edit_agents_permission() {
        let mut policy = Policy::balanced();
        policy.permissions.edit_agents = false;
        let decision = check(&policy, "vfs_write", &json!({"path": "agents/child.md"}), false);
        assert!(!decision.is_allowed());

        policy.permissions.edit_agents = true;
        let decision = check(&policy, "vfs_write", &json!({"path": "agents/child.md"}), false);
        assert!(decision.is_allowed());
    }

    #[test]
    fn vfs_read_empty_path_bypasses_scope_check() {
        let mut policy = Policy::balanced();
        policy.reads = vec![];
        assert!(check(&policy, "vfs_read", &json!({"path": ""}), false).is_allowed());
        assert!(!check(&policy, "vfs_read", &json!({"path": "artifacts/x.md"}), false).is_allowed());
    }

    #[test]
    fn vfs_list_allows_prefix_or_prefix_of_a_glob_base() {
        let mut policy = Policy::balanced();
        policy.reads = vec!["artifacts/reports/**".into()];
        assert!(check(&policy, "vfs_list", &json!({"prefix": "artifacts/"}), false).is_allowed());
        assert!(check(&policy, "vfs_list", &json!({"prefix": "artifacts/reports/2026"}), false).is_allowed());
        assert!(!check(&policy, "vfs_list", &json!({"prefix": "memory/"}), false).is_allowed());
    }
}
