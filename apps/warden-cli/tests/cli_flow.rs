// cli_flow.rs — Drives the `warden` binary through a gated action:
// run → blocked for review → approve → commit → audit verify.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn warden(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_warden"))
        .arg("--project-root")
        .arg(root)
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn setup() -> TempDir {
    let dir = TempDir::new().unwrap();
    let warden_dir = dir.path().join(".warden");
    write(
        &warden_dir.join("profiles.yaml"),
        "notifier:\n  tools: [logs.append]\n  permissions: [log.write]\n  review:\n    mode: required\n",
    );
    write(&warden_dir.join("access.yaml"), "users:\n  rev:\n    roles: [reviewer]\n");
    write(
        &dir.path().join("action.json"),
        r#"{"permission": "log.write", "toolCalls": [{"tool": "logs.append", "input": {"message": "deploy done"}}]}"#,
    );
    dir
}

#[test]
fn gated_action_round_trip() {
    let dir = setup();
    let root = dir.path();
    let action = root.join("action.json");
    let action = action.to_str().unwrap();

    // 1. The first run is gated.
    let gated = warden(root, &["run", "--agent", "notifier", "--user", "ana", "--action", action]);
    assert!(gated.status.success(), "{}", String::from_utf8_lossy(&gated.stderr));
    let outcome: Value = serde_json::from_str(&stdout(&gated)).unwrap();
    assert_eq!(outcome["state"], "blocked");
    assert_eq!(outcome["reason"]["code"], "review_required");
    let review_id = outcome["review_id"].as_str().unwrap().to_string();

    let listed = warden(root, &["review", "list", "--status", "pending"]);
    assert!(stdout(&listed).contains(&review_id));

    // 2. A reviewer approves and receives the token.
    let approved = warden(root, &["review", "approve", &review_id, "--user", "rev"]);
    assert!(approved.status.success(), "{}", String::from_utf8_lossy(&approved.stderr));
    let text = stdout(&approved);
    let token = text
        .lines()
        .skip_while(|l| !l.starts_with("Commit token"))
        .nth(1)
        .unwrap()
        .trim()
        .to_string();
    assert!(!token.is_empty());

    // 3. The commit executes.
    let committed = warden(
        root,
        &[
            "run", "--agent", "notifier", "--user", "ana", "--action", action, "--review", &review_id,
            "--commit-token", &token,
        ],
    );
    let outcome: Value = serde_json::from_str(&stdout(&committed)).unwrap();
    assert_eq!(outcome["state"], "ok");
    assert_eq!(outcome["calls"][0]["result"]["ok"], true);

    // 4. The log verifies and shows the commit.
    let verified = warden(root, &["audit", "verify"]);
    assert!(verified.status.success());
    assert!(stdout(&verified).contains("hash chain intact"));
    let tail = warden(root, &["audit", "tail", "-n", "20"]);
    assert!(stdout(&tail).contains("agent.executed.commit"));
}

#[test]
fn reviewer_without_role_cannot_approve() {
    let dir = setup();
    let root = dir.path();
    let action = root.join("action.json");
    let gated = warden(
        root,
        &["run", "--agent", "notifier", "--user", "ana", "--action", action.to_str().unwrap()],
    );
    let outcome: Value = serde_json::from_str(&stdout(&gated)).unwrap();
    let review_id = outcome["review_id"].as_str().unwrap();

    let denied = warden(root, &["review", "approve", review_id, "--user", "ana"]);
    assert!(!denied.status.success());
    assert!(String::from_utf8_lossy(&denied.stderr).contains("requires one of the roles"));
}

#[test]
fn verify_detects_tampering() {
    let dir = setup();
    let root = dir.path();
    warden(root, &["run", "--agent", "notifier", "--user", "ana"]);
    warden(root, &["run", "--agent", "notifier", "--user", "ana"]);

    let log = root.join(".warden").join("audit.jsonl");
    let content = fs::read_to_string(&log).unwrap();
    fs::write(&log, content.replacen("\"ana\"", "\"eve\"", 1)).unwrap();

    let verified = warden(root, &["audit", "verify"]);
    assert!(!verified.status.success());
    assert!(stdout(&verified).contains("INTEGRITY VIOLATION"));
}
