// outcome.rs — Run state machine and the result handed back to callers.
//
//   Started → Preflighted → Authorized → Executing → Ok
//   any non-terminal state → Blocked

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use warden_gateway::{ToolCall, ToolResult};
use warden_policy::PolicyErrorCode;

use crate::error::OrchestratorError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Started,
    Preflighted,
    Authorized,
    Executing,
    Ok,
    Blocked,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Started => "started",
            RunState::Preflighted => "preflighted",
            RunState::Authorized => "authorized",
            RunState::Executing => "executing",
            RunState::Ok => "ok",
            RunState::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Ok | RunState::Blocked)
    }

    pub fn can_transition_to(&self, next: RunState) -> bool {
        if next == RunState::Blocked {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (RunState::Started, RunState::Preflighted)
                | (RunState::Preflighted, RunState::Authorized)
                // A run with no intended action finishes right after preflight.
                | (RunState::Preflighted, RunState::Ok)
                | (RunState::Authorized, RunState::Executing)
                | (RunState::Executing, RunState::Ok)
        )
    }

    pub(crate) fn advance(&mut self, next: RunState) -> Result<(), OrchestratorError> {
        if !self.can_transition_to(next) {
            return Err(OrchestratorError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

/// Why a run ended blocked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum BlockReason {
    ReviewRequired,
    InvalidCommitToken { detail: String },
    CommitMismatch,
    PayloadTamper,
    GovernanceBlocked { detail: String },
    GovernanceConflict { detail: String },
    ClarificationRequired { detail: String },
    PolicyViolation { policy_code: PolicyErrorCode, message: String },
}

impl BlockReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            BlockReason::ReviewRequired => "review_required",
            BlockReason::InvalidCommitToken { .. } => "invalid_commit_token",
            BlockReason::CommitMismatch => "commit_mismatch",
            BlockReason::PayloadTamper => "payload_tamper",
            BlockReason::GovernanceBlocked { .. } => "governance_blocked",
            BlockReason::GovernanceConflict { .. } => "governance_conflict",
            BlockReason::ClarificationRequired { .. } => "clarification_required",
            BlockReason::PolicyViolation { .. } => "policy_violation",
        }
    }
}

/// One executed tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallRecord {
    pub call: ToolCall,
    pub result: ToolResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<BlockReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<Uuid>,
    /// Calls executed, in order, including a failing last call.
    #[serde(default)]
    pub calls: Vec<CallRecord>,
    /// True when this run followed a long inactivity gap.
    pub fresh_session: bool,
    /// Human-readable note for no-op runs and partial executions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RunOutcome {
    pub fn is_ok(&self) -> bool {
        self.state == RunState::Ok
    }

    pub fn is_blocked(&self) -> bool {
        self.state == RunState::Blocked
    }

    pub fn reason_code(&self) -> Option<&'static str> {
        self.reason.as_ref().map(BlockReason::code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let mut s = RunState::Started;
        for next in [RunState::Preflighted, RunState::Authorized, RunState::Executing, RunState::Ok] {
            s.advance(next).unwrap();
        }
        assert!(s.is_terminal());
    }

    #[test]
    fn blocked_from_any_non_terminal() {
        for from in [RunState::Started, RunState::Preflighted, RunState::Authorized, RunState::Executing] {
            assert!(from.can_transition_to(RunState::Blocked));
        }
        assert!(!RunState::Ok.can_transition_to(RunState::Blocked));
        assert!(!RunState::Blocked.can_transition_to(RunState::Blocked));
    }

    #[test]
    fn skipping_steps_is_rejected() {
        let mut s = RunState::Started;
        assert!(s.advance(RunState::Executing).is_err());
        assert_eq!(s, RunState::Started);
    }

    #[test]
    fn block_reason_serializes_with_code_tag() {
        let v = serde_json::to_value(BlockReason::InvalidCommitToken {
            detail: "token_used".into(),
        })
        .unwrap();
        assert_eq!(v["code"], "invalid_commit_token");
        assert_eq!(BlockReason::PayloadTamper.code(), "payload_tamper");
    }
}
