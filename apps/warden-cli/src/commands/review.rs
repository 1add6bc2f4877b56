// review.rs — Review subcommands: list, show, approve, reject, cancel.

use clap::Subcommand;
use uuid::Uuid;
use warden_gateway::GatewayState;
use warden_policy::PolicyContext;
use warden_review::{ReviewRequest, ReviewStatus};

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// List review requests, newest first.
    List {
        /// Filter by status (pending, approved, rejected, cancelled).
        #[arg(long)]
        status: Option<ReviewStatus>,
    },
    /// Show one review request, including the gated action.
    Show {
        /// Review ID.
        id: Uuid,
    },
    /// Approve a pending request and print its one-time commit token.
    Approve {
        /// Review ID.
        id: Uuid,
        /// Reviewer's user id (roles come from .warden/access.yaml).
        #[arg(long)]
        user: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Reject a pending request.
    Reject {
        /// Review ID.
        id: Uuid,
        #[arg(long)]
        user: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Withdraw a pending request (requester or admin).
    Cancel {
        /// Review ID.
        id: Uuid,
        #[arg(long)]
        user: String,
        #[arg(long)]
        note: Option<String>,
    },
}

pub fn execute(cmd: &ReviewCommands, state: &GatewayState) -> anyhow::Result<()> {
    match cmd {
        ReviewCommands::List { status } => list_reviews(state, *status),
        ReviewCommands::Show { id } => show_review(state, *id),
        ReviewCommands::Approve { id, user, note } => {
            let reviewer = actor(state, *id, user)?;
            let approval = state.review_service().approve(*id, &reviewer, note.as_deref())?;
            println!("Approved review {}.", approval.review.review_id);
            println!();
            println!("Commit token (shown once, hand it to the agent):");
            println!("  {}", approval.commit_token);
            println!();
            println!(
                "Commit with: warden run --agent {} --user <user> --action <file> --review {} --commit-token <token>",
                approval.review.agent_id, approval.review.review_id
            );
            Ok(())
        }
        ReviewCommands::Reject { id, user, note } => {
            let reviewer = actor(state, *id, user)?;
            let review = state.review_service().reject(*id, &reviewer, note.as_deref())?;
            println!("Rejected review {}.", review.review_id);
            Ok(())
        }
        ReviewCommands::Cancel { id, user, note } => {
            let requester = actor(state, *id, user)?;
            let review = state.review_service().cancel(*id, &requester, note.as_deref())?;
            println!("Cancelled review {}.", review.review_id);
            Ok(())
        }
    }
}

/// Resolve `user` in the review's tenant and project.
fn actor(state: &GatewayState, id: Uuid, user: &str) -> anyhow::Result<PolicyContext> {
    let review = load(state, id)?;
    tracing::debug!(review_id = %id, user, tenant = ?review.tenant_id, "resolving review actor");
    Ok(state.policy.resolve_context(
        user,
        review.tenant_id.as_deref(),
        review.project_id.as_deref(),
        None,
    ))
}

fn load(state: &GatewayState, id: Uuid) -> anyhow::Result<ReviewRequest> {
    state
        .reviews
        .get(id)?
        .ok_or_else(|| anyhow::anyhow!("Review {} not found", id))
}

fn list_reviews(state: &GatewayState, status: Option<ReviewStatus>) -> anyhow::Result<()> {
    let reviews = state.reviews.list(status)?;
    if reviews.is_empty() {
        println!("No review requests.");
        return Ok(());
    }

    println!(
        "{:<38} {:<12} {:<16} {:<20} CREATED",
        "ID", "STATUS", "AGENT", "PERMISSION"
    );
    println!("{}", "-".repeat(104));
    for review in &reviews {
        println!(
            "{:<38} {:<12} {:<16} {:<20} {}",
            review.review_id,
            review.status,
            review.agent_id,
            review.permission,
            review.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    println!();
    println!("{} review(s) total.", reviews.len());
    Ok(())
}

fn show_review(state: &GatewayState, id: Uuid) -> anyhow::Result<()> {
    let review = load(state, id)?;
    println!("Review:      {}", review.review_id);
    println!("Status:      {}", review.status);
    println!("Agent:       {}", review.agent_id);
    println!("Permission:  {}", review.permission);
    println!("Requested:   {}", review.user_id.as_deref().unwrap_or("-"));
    println!("Tenant:      {}", review.tenant_id.as_deref().unwrap_or("-"));
    println!("Created:     {}", review.created_at.to_rfc3339());
    if !review.reviewer_roles.is_empty() {
        println!("Reviewers:   {}", review.reviewer_roles.join(", "));
    }
    if let Some(by) = &review.resolved_by {
        let at = review.resolved_at.map(|t| t.to_rfc3339()).unwrap_or_default();
        println!("Resolved:    by {} at {}", by, at);
    }
    if let Some(note) = &review.note {
        println!("Note:        {}", note);
    }
    if review.status == ReviewStatus::Approved {
        println!("Token used:  {}", review.token_used);
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&review.payload)?);
    Ok(())
}
