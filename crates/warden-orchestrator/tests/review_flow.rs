// review_flow.rs — Gated actions end to end: review request, approval,
// commit, and every way a commit attempt can be refused.
//
// Flow under test:
//   1. agent run hits the review gate → blocked(review_required, reviewId)
//   2. reviewer approves → one-time commit token
//   3. agent re-runs the same action with {reviewId, commitToken} → executed
//   4. reuse, tampering and impersonation are blocked with an escalation

mod common;

use serde_json::json;

use warden_audit::entry::actions;
use warden_gateway::tools::DraftStatus;
use warden_gateway::ToolCall;
use warden_orchestrator::{run_actions, IntendedAction, OrchestratorError, RunRequest, RunState};
use warden_policy::PolicyContext;
use warden_review::{ReviewError, ReviewStatus, ReviewStore};

use common::{finalize, harness, log_message, reviewer, run, user};

#[test]
fn gated_finalize_review_approve_commit() {
    let h = harness();
    let draft_id = h.seed_draft("Q2 summary");

    // =========================================================
    // 1. Finalizing under draft_only review is gated
    // =========================================================
    let gated = run(&h, "drafter", finalize(draft_id));
    assert_eq!(gated.state, RunState::Blocked);
    assert_eq!(gated.reason_code(), Some("review_required"));
    let review_id = gated.review_id.expect("gated run carries a review id");
    assert!(gated.calls.is_empty());
    assert_eq!(h.drafts.get(draft_id).unwrap().status, DraftStatus::Draft);

    let stored = h.reviews.get(review_id).unwrap().unwrap();
    assert_eq!(stored.status, ReviewStatus::Pending);
    assert_eq!(stored.agent_id, "drafter");
    assert_eq!(stored.permission, "draft.finalize");
    assert_eq!(stored.reviewer_roles, vec!["reviewer"]);
    assert_eq!(stored.payload["toolCalls"][0]["tool"], "drafts.finalize");
    assert_eq!(stored.tenant_id.as_deref(), Some("client-a"));

    let block = h.logger.entries_for("agent.blocked.review_required");
    assert_eq!(block.len(), 1);
    assert!(block[0].blocked);
    assert_eq!(block[0].input["reviewId"], json!(review_id));
    assert!(h.logger.entries_for(actions::ESCALATION).is_empty());

    // =========================================================
    // 2. Reviewer approves
    // =========================================================
    let approval = h.review_service().approve(review_id, &reviewer(), Some("ok")).unwrap();
    assert_eq!(approval.review.status, ReviewStatus::Approved);

    // =========================================================
    // 3. Commit executes the approved payload
    // =========================================================
    let committed = run(
        &h,
        "drafter",
        finalize(draft_id).committing(review_id, &approval.commit_token),
    );
    assert!(committed.is_ok(), "{:?}", committed.reason);
    assert_eq!(committed.review_id, Some(review_id));
    assert_eq!(h.drafts.get(draft_id).unwrap().status, DraftStatus::Final);
    assert_eq!(h.logger.entries_for(run_actions::FINALIZED).len(), 1);
    let summary = h.logger.entries_for(run_actions::EXECUTED_COMMIT);
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].input["reviewId"], json!(review_id));
    assert!(h.reviews.get(review_id).unwrap().unwrap().token_used);

    // =========================================================
    // 4. The token is single-use
    // =========================================================
    let replay = run(
        &h,
        "drafter",
        finalize(draft_id).committing(review_id, &approval.commit_token),
    );
    assert_eq!(replay.reason_code(), Some("invalid_commit_token"));
    assert_eq!(
        h.logger.entries_for("agent.blocked.invalid_commit_token")[0].input["lookup"],
        "token_used"
    );
    assert_eq!(h.logger.entries_for(actions::ESCALATION).len(), 1);
    assert_eq!(h.logger.entries_for(run_actions::EXECUTED_COMMIT).len(), 1);
}

#[test]
fn changed_input_after_approval_is_payload_tamper() {
    let h = harness();
    let draft_id = h.seed_draft("Terms");
    let other_id = h.seed_draft("Other");
    let review_id = run(&h, "publisher", finalize(draft_id)).review_id.unwrap();
    let approval = h.review_service().approve(review_id, &reviewer(), None).unwrap();

    let tampered = run(
        &h,
        "publisher",
        finalize(other_id).committing(review_id, &approval.commit_token),
    );
    assert_eq!(tampered.state, RunState::Blocked);
    assert_eq!(tampered.reason_code(), Some("payload_tamper"));
    assert!(tampered.calls.is_empty());
    assert_eq!(h.drafts.get(other_id).unwrap().status, DraftStatus::Draft);

    let escalations = h.logger.entries_for(actions::ESCALATION);
    assert_eq!(escalations.len(), 1);
    assert_eq!(escalations[0].reason.as_deref(), Some("payload_tamper"));
    assert_eq!(h.logger.entries_for("agent.blocked.payload_tamper").len(), 1);

    // Tampering does not burn the token: the approved payload still commits.
    let honest = run(
        &h,
        "publisher",
        finalize(draft_id).committing(review_id, &approval.commit_token),
    );
    assert!(honest.is_ok());
    assert_eq!(h.drafts.get(draft_id).unwrap().status, DraftStatus::Final);
}

#[test]
fn extra_tool_call_is_payload_tamper() {
    let h = harness();
    let draft_id = h.seed_draft("Notes");
    let review_id = run(&h, "publisher", finalize(draft_id)).review_id.unwrap();
    let approval = h.review_service().approve(review_id, &reviewer(), None).unwrap();

    let mut action = finalize(draft_id).committing(review_id, &approval.commit_token);
    action
        .tool_calls
        .push(ToolCall::new("drafts.finalize", json!({"draftId": draft_id})));
    let outcome = run(&h, "publisher", action);
    assert_eq!(outcome.reason_code(), Some("payload_tamper"));
}

#[test]
fn other_agent_presenting_token_is_commit_mismatch() {
    let h = harness();
    let draft_id = h.seed_draft("Memo");
    let review_id = run(&h, "drafter", finalize(draft_id)).review_id.unwrap();
    let approval = h.review_service().approve(review_id, &reviewer(), None).unwrap();

    let outcome = run(
        &h,
        "publisher",
        finalize(draft_id).committing(review_id, &approval.commit_token),
    );
    assert_eq!(outcome.reason_code(), Some("commit_mismatch"));
    assert_eq!(h.logger.entries_for("agent.blocked.commit_mismatch").len(), 1);
    assert_eq!(h.logger.entries_for(actions::ESCALATION).len(), 1);
    assert_eq!(h.drafts.get(draft_id).unwrap().status, DraftStatus::Draft);
    assert!(!h.reviews.get(review_id).unwrap().unwrap().token_used);
}

#[test]
fn approved_log_message_changed_before_commit_is_tamper() {
    let h = harness();
    let gated = run(&h, "notifier", log_message("A"));
    assert_eq!(gated.reason_code(), Some("review_required"));
    let review_id = gated.review_id.unwrap();
    let approval = h.review_service().approve(review_id, &reviewer(), None).unwrap();

    let tampered = run(
        &h,
        "notifier",
        log_message("B").committing(review_id, &approval.commit_token),
    );
    assert_eq!(tampered.state, RunState::Blocked);
    assert_eq!(tampered.reason_code(), Some("payload_tamper"));
    assert_eq!(h.logger.entries_for("agent.blocked.payload_tamper").len(), 1);
    assert_eq!(h.logger.entries_for(actions::ESCALATION).len(), 1);
    assert!(h.logger.entries_for("agent.log").is_empty());

    let committed = run(
        &h,
        "notifier",
        log_message("A").committing(review_id, &approval.commit_token),
    );
    assert!(committed.is_ok());
    let logged = h.logger.entries_for("agent.log");
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].input["message"], "A");
}

#[test]
fn approval_committed_from_another_tenant_is_commit_mismatch() {
    let h = harness();
    let review_id = run(&h, "notifier", log_message("A")).review_id.unwrap();
    let approval = h.review_service().approve(review_id, &reviewer(), None).unwrap();

    let foreign = h
        .orchestrator
        .run(
            &RunRequest::new("notifier", PolicyContext::new("u-1").with_client("client-b"))
                .with_action(log_message("A").committing(review_id, &approval.commit_token)),
        )
        .unwrap();
    assert_eq!(foreign.reason_code(), Some("commit_mismatch"));
    let blocked = h.logger.entries_for("agent.blocked.commit_mismatch");
    assert_eq!(blocked[0].input["approvedTenant"], "client-a");
    assert_eq!(h.logger.entries_for(actions::ESCALATION).len(), 1);
    assert!(h.logger.entries_for("agent.log").is_empty());
    assert!(!h.reviews.get(review_id).unwrap().unwrap().token_used);
}

#[test]
fn commit_before_approval_or_with_wrong_token_is_refused() {
    let h = harness();
    let draft_id = h.seed_draft("Plan");
    let review_id = run(&h, "publisher", finalize(draft_id)).review_id.unwrap();

    let early = run(&h, "publisher", finalize(draft_id).committing(review_id, "guess"));
    assert_eq!(early.reason_code(), Some("invalid_commit_token"));

    h.review_service().approve(review_id, &reviewer(), None).unwrap();
    let wrong = run(&h, "publisher", finalize(draft_id).committing(review_id, "guess"));
    assert_eq!(wrong.reason_code(), Some("invalid_commit_token"));

    let details: Vec<_> = h
        .logger
        .entries_for("agent.blocked.invalid_commit_token")
        .into_iter()
        .map(|e| e.input["lookup"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(details, vec!["not_approved", "token_mismatch"]);
    assert_eq!(h.logger.entries_for(actions::ESCALATION).len(), 2);
}

#[test]
fn rejected_review_cannot_be_committed() {
    let h = harness();
    let draft_id = h.seed_draft("Draft");
    let review_id = run(&h, "publisher", finalize(draft_id)).review_id.unwrap();
    h.review_service().reject(review_id, &reviewer(), Some("no")).unwrap();

    let outcome = run(&h, "publisher", finalize(draft_id).committing(review_id, "anything"));
    assert_eq!(outcome.reason_code(), Some("invalid_commit_token"));
}

#[test]
fn drafting_under_draft_only_runs_directly() {
    let h = harness();
    let action = IntendedAction::new(
        "draft.write",
        vec![ToolCall::new("drafts.create", json!({"title": "t", "body": "b"}))],
    );
    let outcome = run(&h, "drafter", action);
    assert!(outcome.is_ok());
    assert!(outcome.review_id.is_none());
    assert_eq!(
        h.logger.actions(),
        vec!["agent.run", "agent.draft_created", "agent.executed.draft_only"]
    );
    assert_eq!(h.drafts.list().len(), 1);
}

#[test]
fn permission_outside_profile_never_executes() {
    let h = harness();
    let action = IntendedAction::new(
        "draft.write",
        vec![ToolCall::new("drafts.create", json!({"title": "sneaky"}))],
    );
    let err = h
        .orchestrator
        .run(&RunRequest::new("scribe", user()).with_action(action))
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::PermissionDenied { ref agent_id, ref permission }
            if agent_id == "scribe" && permission == "draft.write"
    ));
    assert!(h.drafts.list().is_empty());
    assert_eq!(h.logger.actions(), vec!["agent.run"]);
}

#[test]
fn tool_whose_permission_is_missing_never_executes() {
    let h = harness();
    // scribe holds log.write and lists drafts.create, but not draft.write.
    let action = IntendedAction::new(
        "log.write",
        vec![
            ToolCall::new("logs.append", json!({"message": "first"})),
            ToolCall::new("drafts.create", json!({"title": "sneaky"})),
        ],
    );
    let err = h
        .orchestrator
        .run(&RunRequest::new("scribe", user()).with_action(action))
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Router(_)));
    assert!(h.drafts.list().is_empty());
    assert!(h.logger.entries_for(run_actions::EXECUTED).is_empty());
}

#[test]
fn no_action_still_logs_agent_run() {
    let h = harness();
    let outcome = h
        .orchestrator
        .run(&RunRequest::new("drafter", user()))
        .unwrap();
    assert!(outcome.is_ok());
    assert!(outcome.message.is_some());
    assert_eq!(h.logger.actions(), vec!["agent.run"]);
}

#[test]
fn concurrent_approvals_resolve_exactly_once() {
    let h = harness();
    let draft_id = h.seed_draft("Race");
    let review_id = run(&h, "publisher", finalize(draft_id)).review_id.unwrap();
    let service = h.review_service();

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| service.approve(review_id, &reviewer(), None)))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, ReviewError::AlreadyResolved { .. })));
    assert_eq!(h.logger.entries_for(actions::REVIEW_APPROVED).len(), 1);
}
