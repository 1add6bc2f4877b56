// governance.rs — Optional preflight that checks what an action touches
// before the review gate sees it.
//
// A *workstream* is the set of scope paths an action's tool calls name in
// their `path`, `paths`, `file` or `scope` inputs. A GovernanceValidator
// looks at the workstream and returns a verdict; anything but Pass blocks
// the run.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::IntendedAction;

const SCOPE_KEYS: [&str; 4] = ["path", "paths", "file", "scope"];

/// What an action claims to work on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Workstream {
    pub agent_id: String,
    pub permission: String,
    /// Scope paths from every tool call, deduplicated and sorted.
    pub scope_paths: Vec<String>,
}

impl Workstream {
    pub fn derive(agent_id: &str, action: &IntendedAction) -> Self {
        let mut paths = BTreeSet::new();
        for call in &action.tool_calls {
            for key in SCOPE_KEYS {
                collect_paths(call.input.get(key), &mut paths);
            }
        }
        Self {
            agent_id: agent_id.to_string(),
            permission: action.permission.clone(),
            scope_paths: paths.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scope_paths.is_empty()
    }
}

fn collect_paths(value: Option<&Value>, out: &mut BTreeSet<String>) {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            out.insert(s.trim().to_string());
        }
        Some(Value::Array(items)) => {
            for item in items {
                collect_paths(Some(item), out);
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GovernanceVerdict {
    Pass,
    /// The workstream is outside what the agent may touch.
    Blocked { detail: String },
    /// The workstream collides with something another party holds.
    Conflict { detail: String },
    /// The workstream is too vague to judge.
    ClarificationRequired { detail: String },
}

impl GovernanceVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, GovernanceVerdict::Pass)
    }
}

pub trait GovernanceValidator: Send + Sync {
    fn validate(&self, workstream: &Workstream) -> GovernanceVerdict;
}

/// Checks scope paths against allowed and locked glob patterns.
///
/// - a path containing `..` is blocked
/// - a path that is itself a glob (`*`, `?`, `[`) needs clarification
/// - a path matching a `locked` pattern is a conflict
/// - with a non-empty `allowed` list, a path matching none of it is blocked
///
/// `*` does not cross `/`; use `**` for subtrees. Invalid patterns never
/// match, so a typo in `allowed` blocks rather than opens.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScopeGlobValidator {
    #[serde(default)]
    pub allowed: Vec<String>,
    #[serde(default)]
    pub locked: Vec<String>,
}

impl ScopeGlobValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, pattern: impl Into<String>) -> Self {
        self.allowed.push(pattern.into());
        self
    }

    pub fn lock(mut self, pattern: impl Into<String>) -> Self {
        self.locked.push(pattern.into());
        self
    }
}

impl GovernanceValidator for ScopeGlobValidator {
    fn validate(&self, workstream: &Workstream) -> GovernanceVerdict {
        for path in &workstream.scope_paths {
            if path.contains("..") {
                return GovernanceVerdict::Blocked {
                    detail: format!("scope path '{}' escapes the project", path),
                };
            }
            if is_wildcard(path) {
                return GovernanceVerdict::ClarificationRequired {
                    detail: format!("scope path '{}' is a pattern; name the files", path),
                };
            }
        }
        for path in &workstream.scope_paths {
            if let Some(lock) = self.locked.iter().find(|p| glob_match(p, path)) {
                return GovernanceVerdict::Conflict {
                    detail: format!("scope path '{}' is locked by '{}'", path, lock),
                };
            }
            if !self.allowed.is_empty() && !self.allowed.iter().any(|p| glob_match(p, path)) {
                return GovernanceVerdict::Blocked {
                    detail: format!("scope path '{}' is outside the allowed scope", path),
                };
            }
        }
        GovernanceVerdict::Pass
    }
}

fn is_wildcard(path: &str) -> bool {
    path.contains(['*', '?', '['])
}

fn glob_match(pattern: &str, target: &str) -> bool {
    let opts = glob::MatchOptions {
        require_literal_separator: true,
        ..Default::default()
    };
    match glob::Pattern::new(pattern) {
        Ok(p) => p.matches_with(target, opts),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_gateway::ToolCall;

    fn ws(paths: &[&str]) -> Workstream {
        Workstream {
            agent_id: "a".into(),
            permission: "p".into(),
            scope_paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn workstream_collects_every_scope_key() {
        let action = IntendedAction::new(
            "docs.write",
            vec![
                ToolCall::new("t1", json!({"path": "docs/a.md", "file": "docs/b.md"})),
                ToolCall::new("t2", json!({"paths": ["src/x.rs", "docs/a.md"], "scope": " src/y.rs "})),
                ToolCall::new("t3", json!({"title": "no scope", "path": 7})),
            ],
        );
        let w = Workstream::derive("agent-1", &action);
        assert_eq!(w.scope_paths, vec!["docs/a.md", "docs/b.md", "src/x.rs", "src/y.rs"]);
        assert_eq!(w.permission, "docs.write");
    }

    #[test]
    fn empty_workstream_passes() {
        let v = ScopeGlobValidator::new().allow("docs/**");
        assert!(v.validate(&ws(&[])).is_pass());
    }

    #[test]
    fn allowed_scope_passes_and_outside_is_blocked() {
        let v = ScopeGlobValidator::new().allow("docs/**");
        assert!(v.validate(&ws(&["docs/guide/intro.md"])).is_pass());
        assert!(matches!(v.validate(&ws(&["src/main.rs"])), GovernanceVerdict::Blocked { .. }));
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let v = ScopeGlobValidator::new().allow("docs/*");
        assert!(v.validate(&ws(&["docs/a.md"])).is_pass());
        assert!(!v.validate(&ws(&["docs/sub/a.md"])).is_pass());
    }

    #[test]
    fn locked_path_is_conflict() {
        let v = ScopeGlobValidator::new().lock("release/**");
        assert!(matches!(
            v.validate(&ws(&["release/notes.md"])),
            GovernanceVerdict::Conflict { .. }
        ));
    }

    #[test]
    fn wildcard_scope_needs_clarification() {
        let v = ScopeGlobValidator::new();
        assert!(matches!(
            v.validate(&ws(&["src/**/*.rs"])),
            GovernanceVerdict::ClarificationRequired { .. }
        ));
    }

    #[test]
    fn traversal_is_blocked() {
        let v = ScopeGlobValidator::new();
        assert!(matches!(v.validate(&ws(&["../etc/passwd"])), GovernanceVerdict::Blocked { .. }));
    }

    #[test]
    fn invalid_allowed_pattern_fails_closed() {
        let v = ScopeGlobValidator::new().allow("docs/[");
        assert!(!v.validate(&ws(&["docs/a.md"])).is_pass());
    }

    #[test]
    fn loads_from_yaml_shape() {
        let v: ScopeGlobValidator =
            serde_json::from_value(json!({"allowed": ["docs/**"], "locked": ["docs/legal/**"]})).unwrap();
        assert!(matches!(v.validate(&ws(&["docs/legal/tos.md"])), GovernanceVerdict::Conflict { .. }));
    }
}
