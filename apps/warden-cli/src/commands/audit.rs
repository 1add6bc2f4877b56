// audit.rs — Audit subcommands: verify, tail.

use std::path::PathBuf;

use clap::Subcommand;
use warden_audit::{AuditError, JsonlActionLogger};
use warden_gateway::WardenConfig;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Verify the audit log hash chain integrity.
    Verify {
        /// Path to audit log (defaults to .warden/audit.jsonl).
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Show recent audit entries.
    Tail {
        /// Path to audit log (defaults to .warden/audit.jsonl).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Number of entries to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
}

pub fn execute(cmd: &AuditCommands, config: &WardenConfig) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Verify { log } => {
            let path = log.clone().unwrap_or_else(|| config.audit_log.clone());
            if !path.exists() {
                println!("No audit log found at {}", path.display());
                return Ok(());
            }

            match JsonlActionLogger::verify_chain(&path) {
                Ok(count) => {
                    println!("Audit log verified: {} entries, hash chain intact.", count);
                }
                Err(AuditError::IntegrityViolation {
                    line,
                    expected,
                    actual,
                }) => {
                    tracing::warn!(path = %path.display(), line, "audit hash chain broken");
                    println!("INTEGRITY VIOLATION at line {}:", line);
                    println!("  Expected previous_hash: {}", expected);
                    println!("  Actual previous_hash:   {}", actual);
                    println!();
                    println!("The audit log may have been tampered with.");
                    anyhow::bail!("Audit log integrity check failed");
                }
                Err(e) => return Err(e.into()),
            }
        }

        AuditCommands::Tail { log, n } => {
            let path = log.clone().unwrap_or_else(|| config.audit_log.clone());
            if !path.exists() {
                println!("No audit log found at {}", path.display());
                return Ok(());
            }

            let recent = JsonlActionLogger::tail(&path, *n)?;
            if recent.is_empty() {
                println!("No audit entries.");
                return Ok(());
            }

            println!(
                "{:<20} {:<14} {:<12} {:<36} REASON",
                "TIMESTAMP", "AGENT", "USER", "ACTION"
            );
            println!("{}", "-".repeat(100));
            for entry in &recent {
                println!(
                    "{:<20} {:<14} {:<12} {:<36} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.agent_id,
                    entry.user_id,
                    entry.action,
                    entry.reason.as_deref().unwrap_or("-"),
                );
            }
        }
    }

    Ok(())
}
