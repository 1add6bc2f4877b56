// orchestrator.rs — One governed run of an agent's intended action.
//
// A run is a strictly sequential pipeline:
//
//   1. gap preflight        (best-effort; marks the session fresh)
//   2. `agent.run`          (always written)
//   3. permission check     (fatal)
//   4. governance preflight (optional validator)
//   5a. commit path         token → agent/permission → payload hash → execute
//   5b. gated/direct path   review policy → review request, or execute
//
// Every orchestrator append is mandatory. When one fails after tools already
// ran, the executed calls are compensated in reverse order and the error
// propagates. Blocks are outcomes, not errors.

use std::sync::Arc;

use chrono::Duration;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use warden_audit::entry::actions;
use warden_audit::{ActionLogger, AuditLogEntry};
use warden_clock::Clock;
use warden_gateway::{AgentProfile, GatewayState, ProfileStore, ReviewMode, ToolCall, ToolKind, ToolRouter};
use warden_policy::PolicyContext;
use warden_review::{ReviewError, ReviewRequest, ReviewStatus, ReviewStore, ReviewTransition};

use crate::action::{stored_payload_hash, IntendedAction, ReviewCommit, RunRequest};
use crate::activity::{ActivityStore, JsonFileActivityStore};
use crate::error::OrchestratorError;
use crate::governance::{GovernanceValidator, GovernanceVerdict, Workstream};
use crate::outcome::{BlockReason, CallRecord, RunOutcome, RunState};

/// Audit action names written by the orchestrator.
pub mod run_actions {
    pub const AGENT_RUN: &str = "agent.run";
    pub const TIME_GAP_DETECTED: &str = "TIME_GAP_DETECTED";
    pub const DRAFT_CREATED: &str = "agent.draft_created";
    pub const FINALIZED: &str = "agent.finalized";
    pub const EXECUTED: &str = "agent.executed";
    pub const EXECUTED_DRAFT_ONLY: &str = "agent.executed.draft_only";
    pub const EXECUTED_COMMIT: &str = "agent.executed.commit";

    /// `agent.blocked.<reason code>`
    pub fn blocked(code: &str) -> String {
        format!("agent.blocked.{}", code)
    }
}

pub const DEFAULT_GAP_THRESHOLD_MINUTES: i64 = 50;

/// Who withdraws a review whose block entry could not be written.
const SYSTEM_ACTOR: &str = "warden";

/// Per-run bookkeeping.
struct Run {
    run_id: Uuid,
    agent_id: String,
    context: PolicyContext,
    now: chrono::DateTime<chrono::Utc>,
    fresh_session: bool,
    state: RunState,
}

impl Run {
    fn outcome(&self) -> RunOutcome {
        RunOutcome {
            run_id: self.run_id,
            state: self.state,
            reason: None,
            review_id: None,
            calls: Vec::new(),
            fresh_session: self.fresh_session,
            message: None,
        }
    }
}

pub struct Orchestrator {
    profiles: Arc<dyn ProfileStore>,
    router: Arc<ToolRouter>,
    reviews: Arc<dyn ReviewStore>,
    logger: Arc<dyn ActionLogger>,
    activity: Arc<dyn ActivityStore>,
    clock: Arc<dyn Clock>,
    governance: Option<Arc<dyn GovernanceValidator>>,
    gap_threshold: Duration,
}

impl Orchestrator {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        router: Arc<ToolRouter>,
        reviews: Arc<dyn ReviewStore>,
        logger: Arc<dyn ActionLogger>,
        activity: Arc<dyn ActivityStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            profiles,
            router,
            reviews,
            logger,
            activity,
            clock,
            governance: None,
            gap_threshold: Duration::minutes(DEFAULT_GAP_THRESHOLD_MINUTES),
        }
    }

    /// Wire an orchestrator to a loaded gateway, with file-backed activity.
    pub fn from_gateway(state: &GatewayState) -> Self {
        let profiles: Arc<dyn ProfileStore> = state.profiles.clone();
        Self::new(
            profiles,
            state.router.clone(),
            state.reviews.clone(),
            state.logger.clone(),
            Arc::new(JsonFileActivityStore::new(&state.config.activity_file)),
            state.clock.clone(),
        )
        .with_gap_threshold_minutes(state.config.settings.gap_threshold_minutes)
    }

    pub fn with_governance(mut self, validator: Arc<dyn GovernanceValidator>) -> Self {
        self.governance = Some(validator);
        self
    }

    pub fn with_gap_threshold_minutes(mut self, minutes: i64) -> Self {
        self.gap_threshold = Duration::minutes(minutes.max(0));
        self
    }

    /// Execute one run to a terminal state.
    pub fn run(&self, request: &RunRequest) -> Result<RunOutcome, OrchestratorError> {
        let now = match request.timestamp.as_deref() {
            Some(ts) => self.clock.parse_iso(ts)?,
            None => self.clock.now(),
        };
        let mut context = request.context.clone();
        if context.agent_id.is_none() {
            context.agent_id = Some(request.agent_id.clone());
        }
        let mut run = Run {
            run_id: Uuid::new_v4(),
            agent_id: request.agent_id.clone(),
            context,
            now,
            fresh_session: false,
            state: RunState::Started,
        };

        self.preflight_gap(&mut run);
        run.state.advance(RunState::Preflighted)?;

        let action = request.action.as_ref();
        self.append(self.entry(
            &run,
            run_actions::AGENT_RUN,
            json!({
                "permission": action.map(|a| a.permission.as_str()),
                "tools": action.map(tool_names).unwrap_or_default(),
                "commit": action.is_some_and(|a| a.review_commit.is_some()),
            }),
        ))?;

        let Some(action) = action else {
            run.state.advance(RunState::Ok)?;
            tracing::debug!(run_id = %run.run_id, agent = %run.agent_id, "run had no intended action");
            let mut outcome = run.outcome();
            outcome.message = Some("no intended action; nothing to do".to_string());
            return Ok(outcome);
        };

        let profile = self
            .profiles
            .get(&run.agent_id)
            .ok_or_else(|| OrchestratorError::ProfileNotFound(run.agent_id.clone()))?;
        if !profile.has_permission(&action.permission) {
            tracing::warn!(
                agent = %run.agent_id,
                permission = %action.permission,
                "permission outside agent profile"
            );
            return Err(OrchestratorError::PermissionDenied {
                agent_id: run.agent_id.clone(),
                permission: action.permission.clone(),
            });
        }

        if let Some(blocked) = self.check_governance(&mut run, action)? {
            return Ok(blocked);
        }
        run.state.advance(RunState::Authorized)?;

        match &action.review_commit {
            Some(commit) => self.commit(&mut run, &profile, action, commit),
            None => self.gate_or_execute(&mut run, &profile, action),
        }
    }

    /// Never aborts the run. Failures are logged and the run goes on.
    fn preflight_gap(&self, run: &mut Run) {
        let last_seen = match self.activity.last_seen(&run.agent_id) {
            Ok(last) => last,
            Err(e) => {
                tracing::warn!(agent = %run.agent_id, error = %e, "could not read last activity");
                None
            }
        };
        if let Some(last) = last_seen {
            let gap = run.now - last;
            if gap > self.gap_threshold {
                run.fresh_session = true;
                let entry = self.entry(
                    run,
                    run_actions::TIME_GAP_DETECTED,
                    json!({
                        "lastSeen": last,
                        "gapMinutes": gap.num_minutes(),
                        "thresholdMinutes": self.gap_threshold.num_minutes(),
                    }),
                );
                if let Err(e) = self.logger.append(entry) {
                    tracing::warn!(agent = %run.agent_id, error = %e, "could not record time gap");
                }
                tracing::info!(agent = %run.agent_id, gap_minutes = gap.num_minutes(), "fresh session after inactivity");
            }
        }
        if let Err(e) = self.activity.record(&run.agent_id, run.now) {
            tracing::warn!(agent = %run.agent_id, error = %e, "could not record activity");
        }
    }

    fn check_governance(
        &self,
        run: &mut Run,
        action: &IntendedAction,
    ) -> Result<Option<RunOutcome>, OrchestratorError> {
        let Some(validator) = &self.governance else {
            return Ok(None);
        };
        let workstream = Workstream::derive(&run.agent_id, action);
        let (reason, escalate) = match validator.validate(&workstream) {
            GovernanceVerdict::Pass => return Ok(None),
            GovernanceVerdict::Blocked { detail } => (BlockReason::GovernanceBlocked { detail }, true),
            GovernanceVerdict::Conflict { detail } => (BlockReason::GovernanceConflict { detail }, true),
            GovernanceVerdict::ClarificationRequired { detail } => {
                (BlockReason::ClarificationRequired { detail }, false)
            }
        };
        let input = json!({ "workstream": workstream });
        self.block(run, reason, input, escalate, None).map(Some)
    }

    fn commit(
        &self,
        run: &mut Run,
        profile: &AgentProfile,
        action: &IntendedAction,
        commit: &ReviewCommit,
    ) -> Result<RunOutcome, OrchestratorError> {
        let review_id = commit.review_id;
        let lookup = self.reviews.get_approved_for_commit(review_id, &commit.commit_token)?;
        if !lookup.ok {
            let detail = lookup.reason.map(|r| r.as_str()).unwrap_or("rejected").to_string();
            let input = json!({ "reviewId": review_id, "lookup": detail });
            return self.block(run, BlockReason::InvalidCommitToken { detail }, input, true, Some(review_id));
        }

        let agent_matches = lookup.agent_id.as_deref() == Some(run.agent_id.as_str());
        let permission_matches = lookup.permission.as_deref() == Some(action.permission.as_str());
        let tenant_matches = lookup.tenant_id == run.context.client_id;
        if !agent_matches || !permission_matches || !tenant_matches {
            let input = json!({
                "reviewId": review_id,
                "approvedAgentId": lookup.agent_id,
                "approvedPermission": lookup.permission,
                "approvedTenant": lookup.tenant_id,
                "permission": action.permission,
                "clientId": run.context.client_id,
            });
            return self.block(run, BlockReason::CommitMismatch, input, true, Some(review_id));
        }

        let presented_hash = action.payload_hash()?;
        let approved_hash = lookup.payload.as_ref().map(stored_payload_hash);
        if approved_hash.as_deref() != Some(presented_hash.as_str()) {
            let input = json!({
                "reviewId": review_id,
                "approvedHash": approved_hash,
                "presentedHash": presented_hash,
            });
            return self.block(run, BlockReason::PayloadTamper, input, true, Some(review_id));
        }

        // Consumed before execution: a partial failure cannot be retried
        // with the same token.
        match self.reviews.mark_token_used(review_id) {
            Ok(()) => {}
            Err(ReviewError::TokenAlreadyUsed(_)) => {
                let detail = "token_used".to_string();
                let input = json!({ "reviewId": review_id, "lookup": detail });
                return self.block(run, BlockReason::InvalidCommitToken { detail }, input, true, Some(review_id));
            }
            Err(e) => return Err(e.into()),
        }

        run.state.advance(RunState::Executing)?;
        let records = self.execute(run, profile, &action.tool_calls)?;
        self.finish(run, records, run_actions::EXECUTED_COMMIT, Some(review_id))
    }

    fn gate_or_execute(
        &self,
        run: &mut Run,
        profile: &AgentProfile,
        action: &IntendedAction,
    ) -> Result<RunOutcome, OrchestratorError> {
        if self.needs_review(profile, action) {
            return self.request_review(run, profile, action);
        }
        run.state.advance(RunState::Executing)?;
        let records = self.execute(run, profile, &action.tool_calls)?;
        let summary = if profile.review.mode == ReviewMode::DraftOnly {
            run_actions::EXECUTED_DRAFT_ONLY
        } else {
            run_actions::EXECUTED
        };
        self.finish(run, records, summary, None)
    }

    /// `none` runs directly, `required` always reviews, `draft_only` reviews
    /// only actions that finalize something.
    fn needs_review(&self, profile: &AgentProfile, action: &IntendedAction) -> bool {
        match profile.review.mode {
            ReviewMode::None => false,
            ReviewMode::Required => true,
            ReviewMode::DraftOnly => action
                .tool_calls
                .iter()
                .any(|c| self.router.kind_of(&c.tool) == Some(ToolKind::Finalize)),
        }
    }

    fn request_review(
        &self,
        run: &mut Run,
        profile: &AgentProfile,
        action: &IntendedAction,
    ) -> Result<RunOutcome, OrchestratorError> {
        let request = ReviewRequest::new(
            &run.agent_id,
            &action.permission,
            serde_json::to_value(action)?,
            profile.review.reviewer_roles.clone(),
            run.now,
        )
        .with_user(&run.context.user_id)
        .with_tenant_opt(run.context.client_id.as_deref())
        .with_project_opt(run.context.project_id.as_deref());
        let review_id = request.review_id;
        self.reviews.create(request)?;

        let input = json!({ "reviewId": review_id, "permission": action.permission });
        let blocked = self.block(run, BlockReason::ReviewRequired, input, false, Some(review_id));
        if blocked.is_err() {
            self.withdraw_review(review_id, run);
        }
        blocked
    }

    /// Cancel a review nobody was told about.
    fn withdraw_review(&self, review_id: Uuid, run: &Run) {
        let transition = ReviewTransition::resolve(
            ReviewStatus::Cancelled,
            SYSTEM_ACTOR,
            run.now,
            Some("block entry could not be recorded"),
        );
        match self.reviews.compare_and_set(review_id, ReviewStatus::Pending, transition) {
            Ok(true) => {}
            Ok(false) => tracing::warn!(review_id = %review_id, "review resolved before it could be withdrawn"),
            Err(e) => tracing::warn!(review_id = %review_id, error = %e, "could not withdraw review"),
        }
    }

    /// Run calls in order, stopping after the first failed one.
    ///
    /// A router violation is fatal: calls that already ran are compensated.
    fn execute(
        &self,
        run: &Run,
        profile: &AgentProfile,
        calls: &[ToolCall],
    ) -> Result<Vec<CallRecord>, OrchestratorError> {
        let mut records = Vec::with_capacity(calls.len());
        for call in calls {
            let result = match self.router.execute(profile, &run.context, call) {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(run_id = %run.run_id, tool = %call.tool, error = %e, "tool call refused");
                    self.compensate(run, &records);
                    return Err(e.into());
                }
            };
            let ok = result.ok;
            records.push(CallRecord {
                call: call.clone(),
                result,
            });
            if !ok {
                break;
            }
        }
        Ok(records)
    }

    /// Record what executed and close the run. Any failed append rolls the
    /// executed calls back.
    fn finish(
        &self,
        run: &mut Run,
        records: Vec<CallRecord>,
        summary: &str,
        review_id: Option<Uuid>,
    ) -> Result<RunOutcome, OrchestratorError> {
        let outcome = self
            .record_effects(run, &records, review_id)
            .and_then(|()| self.close(run, &records, summary, review_id));
        match outcome {
            Ok(mut outcome) => {
                outcome.calls = records;
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(run_id = %run.run_id, error = %e, "run could not be recorded; compensating");
                self.compensate(run, &records);
                Err(e)
            }
        }
    }

    fn record_effects(
        &self,
        run: &Run,
        records: &[CallRecord],
        review_id: Option<Uuid>,
    ) -> Result<(), OrchestratorError> {
        for record in records.iter().filter(|r| r.result.ok) {
            let action = match self.router.kind_of(&record.call.tool) {
                Some(ToolKind::Draft) => run_actions::DRAFT_CREATED,
                Some(ToolKind::Finalize) => run_actions::FINALIZED,
                _ => continue,
            };
            let entry = self
                .entry(run, action, json!({ "tool": record.call.tool, "reviewId": review_id }))
                .with_output(record.result.output.clone().unwrap_or(Value::Null));
            self.append(entry)?;
        }
        Ok(())
    }

    fn close(
        &self,
        run: &mut Run,
        records: &[CallRecord],
        summary: &str,
        review_id: Option<Uuid>,
    ) -> Result<RunOutcome, OrchestratorError> {
        let failed = records.last().filter(|r| !r.result.ok);
        let executed = records.iter().filter(|r| r.result.ok).count();

        if let Some(record) = failed {
            if let Some(code) = record.result.policy_code() {
                let message = record
                    .result
                    .error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_default();
                let input = json!({ "tool": record.call.tool, "executed": executed, "reviewId": review_id });
                return self.block(
                    run,
                    BlockReason::PolicyViolation {
                        policy_code: code,
                        message,
                    },
                    input,
                    false,
                    review_id,
                );
            }
        }

        let results: Vec<Value> = records
            .iter()
            .map(|r| json!({ "tool": r.call.tool, "ok": r.result.ok, "error": r.result.error }))
            .collect();
        let entry = self
            .entry(
                run,
                summary,
                json!({
                    "reviewId": review_id,
                    "tools": records.iter().map(|r| r.call.tool.as_str()).collect::<Vec<_>>(),
                    "executed": executed,
                    "stoppedAt": failed.map(|r| r.call.tool.as_str()),
                }),
            )
            .with_output(json!({ "results": results }));
        self.append(entry)?;
        run.state.advance(RunState::Ok)?;

        tracing::info!(run_id = %run.run_id, agent = %run.agent_id, executed, summary, "run finished");
        let mut outcome = run.outcome();
        outcome.review_id = review_id;
        if let Some(record) = failed {
            let message = record.result.error.as_ref().map(|e| e.message.as_str()).unwrap_or("failed");
            outcome.message = Some(format!("stopped at '{}': {}", record.call.tool, message));
        }
        Ok(outcome)
    }

    /// Undo successful calls, newest first. Failures are logged, not raised.
    fn compensate(&self, run: &Run, records: &[CallRecord]) {
        for record in records.iter().rev().filter(|r| r.result.ok) {
            if let Err(e) = self.router.compensate(&run.context, &record.call, &record.result) {
                tracing::warn!(run_id = %run.run_id, tool = %record.call.tool, error = %e, "compensation failed");
            }
        }
    }

    /// Write the block entry (plus an escalation when asked) and end the run.
    fn block(
        &self,
        run: &mut Run,
        reason: BlockReason,
        input: Value,
        escalate: bool,
        review_id: Option<Uuid>,
    ) -> Result<RunOutcome, OrchestratorError> {
        let code = reason.code();
        let mut input = object(input);
        input.insert("reason".to_string(), serde_json::to_value(&reason)?);
        let input = Value::Object(input);

        self.append(
            self.entry(run, &run_actions::blocked(code), input.clone())
                .blocked(code),
        )?;
        if escalate {
            self.append(self.entry(run, actions::ESCALATION, input).blocked(code))?;
        }
        run.state.advance(RunState::Blocked)?;

        tracing::info!(run_id = %run.run_id, agent = %run.agent_id, reason = code, "run blocked");
        let mut outcome = run.outcome();
        outcome.reason = Some(reason);
        outcome.review_id = review_id;
        Ok(outcome)
    }

    fn entry(&self, run: &Run, action: &str, input: Value) -> AuditLogEntry {
        let mut input = object(input);
        input.insert("runId".to_string(), json!(run.run_id));
        input.insert("freshSession".to_string(), json!(run.fresh_session));
        AuditLogEntry::new(&run.agent_id, &run.context.user_id, action, run.now)
            .with_input(Value::Object(input))
            .with_tenant_opt(run.context.client_id.as_deref())
            .with_project_opt(run.context.project_id.as_deref())
    }

    fn append(&self, entry: AuditLogEntry) -> Result<(), OrchestratorError> {
        self.logger.append(entry)?;
        Ok(())
    }
}

fn tool_names(action: &IntendedAction) -> Vec<&str> {
    action.tool_calls.iter().map(|c| c.tool.as_str()).collect()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}
