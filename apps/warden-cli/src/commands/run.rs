// run.rs — `warden run`: one orchestrator run from the command line.
//
// The intended action is a JSON file (or `-` for stdin):
//
// ```json
// {"permission": "draft.finalize",
//  "toolCalls": [{"tool": "drafts.finalize", "input": {"draftId": "..."}}]}
// ```
//
// To commit an approved review, pass the same file again with
// `--review <id> --commit-token <token>`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use uuid::Uuid;
use warden_gateway::GatewayState;
use warden_orchestrator::{IntendedAction, Orchestrator, RunOutcome, RunRequest, ScopeGlobValidator};

#[derive(Args)]
pub struct RunArgs {
    /// Agent id (a key in .warden/profiles.yaml).
    #[arg(long)]
    pub agent: String,
    /// User the agent acts for.
    #[arg(long)]
    pub user: String,
    /// Tenant (client) to act in.
    #[arg(long)]
    pub client: Option<String>,
    /// Project to act in.
    #[arg(long)]
    pub project: Option<String>,
    /// Intended action as JSON; "-" reads stdin. Without it the run only
    /// records activity.
    #[arg(long)]
    pub action: Option<PathBuf>,
    /// Approved review to commit.
    #[arg(long, requires = "commit_token", requires = "action")]
    pub review: Option<Uuid>,
    /// Commit token issued when the review was approved.
    #[arg(long, requires = "review")]
    pub commit_token: Option<String>,
    /// Run time as ISO-8601 (defaults to now).
    #[arg(long)]
    pub timestamp: Option<String>,
}

pub fn execute(args: &RunArgs, state: &GatewayState) -> anyhow::Result<()> {
    let mut orchestrator = Orchestrator::from_gateway(state);
    if let Some(validator) = load_governance(&state.config.governance_file)? {
        tracing::debug!(path = %state.config.governance_file.display(), "governance scope loaded");
        orchestrator = orchestrator.with_governance(Arc::new(validator));
    }

    let context = state.policy.resolve_context(
        &args.user,
        args.client.as_deref(),
        args.project.as_deref(),
        Some(&args.agent),
    );
    let mut request = RunRequest::new(&args.agent, context);
    if let Some(path) = &args.action {
        let mut action = read_action(path)?;
        if let (Some(review_id), Some(token)) = (args.review, &args.commit_token) {
            action = action.committing(review_id, token.clone());
        }
        request = request.with_action(action);
    }
    if let Some(ts) = &args.timestamp {
        request = request.at(ts.clone());
    }

    let outcome = orchestrator.run(&request)?;
    tracing::info!(
        agent = %args.agent,
        run_id = %outcome.run_id,
        state = %outcome.state,
        reason = outcome.reason_code().unwrap_or("-"),
        "run finished"
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    print_hint(&outcome);
    Ok(())
}

fn read_action(path: &Path) -> anyhow::Result<IntendedAction> {
    let json = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading action from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    serde_json::from_str(&json).with_context(|| format!("parsing intended action from {}", path.display()))
}

fn load_governance(path: &Path) -> anyhow::Result<Option<ScopeGlobValidator>> {
    if !path.exists() {
        return Ok(None);
    }
    let yaml = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let validator = serde_yaml::from_str(&yaml).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(validator))
}

fn print_hint(outcome: &RunOutcome) {
    match (outcome.reason_code(), outcome.review_id) {
        (Some("review_required"), Some(review_id)) => {
            eprintln!("Review required. A reviewer can run:");
            eprintln!("  warden review approve {} --user <reviewer>", review_id);
        }
        (Some(code), _) => eprintln!("Run blocked: {}", code),
        (None, _) => {
            if let Some(message) = &outcome.message {
                eprintln!("{}", message);
            }
        }
    }
}
