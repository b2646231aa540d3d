//! Terminal approval prompt

use async_trait::async_trait;
use autofix_core::actions::{ApprovalDecision, ApprovalHandler, ApprovalRequest};
use std::io::Write;
use tracing::warn;

/// Asks on stderr and reads `y`/`yes` from stdin; anything else rejects
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalApproval;

#[async_trait]
impl ApprovalHandler for TerminalApproval {
    async fn decide(&self, request: &ApprovalRequest) -> ApprovalDecision {
        let question = format!("\nApprove {}?\n  reason: {}\n  [y/N] ", request.description, request.reason);
        let answer = tokio::task::spawn_blocking(move || {
            let mut stderr = std::io::stderr();
            let _ = stderr.write_all(question.as_bytes());
            let _ = stderr.flush();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => parse_answer(&line),
            Ok(Err(e)) => {
                warn!("Could not read approval answer: {}", e);
                ApprovalDecision::Reject
            }
            Err(e) => {
                warn!("Approval prompt failed: {}", e);
                ApprovalDecision::Reject
            }
        }
    }
}

fn parse_answer(line: &str) -> ApprovalDecision {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => ApprovalDecision::Approve,
        _ => ApprovalDecision::Reject,
    }
}
