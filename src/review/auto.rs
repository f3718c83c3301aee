use async_trait::async_trait;

use crate::config::AutoDecision;
use crate::error::Result;
use crate::review::{Breakpoint, Checkpoint, ReviewDecision, Reviewer};

/// Non-interactive reviewer for CI: answers every breakpoint the same way.
pub struct AutoReviewer {
    decision: AutoDecision,
}

impl AutoReviewer {
    pub fn new(decision: AutoDecision) -> Self {
        Self { decision }
    }
}

#[async_trait]
impl Reviewer for AutoReviewer {
    async fn breakpoint(&self, breakpoint: &Breakpoint) -> Result<ReviewDecision> {
        let decision = match self.decision {
            AutoDecision::Approve => ReviewDecision::Approve,
            AutoDecision::Reject => ReviewDecision::Reject {
                reason: Some("Automatically rejected".to_string()),
            },
        };
        tracing::info!(
            title = %breakpoint.title,
            decision = ?decision,
            "Breakpoint resolved automatically"
        );
        Ok(decision)
    }

    async fn checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        tracing::info!(title = %checkpoint.title, message = %checkpoint.message, "Checkpoint");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn breakpoint() -> Breakpoint {
        Breakpoint {
            title: "Pass Rate".to_string(),
            question: "Continue?".to_string(),
            context: json!({ "passRate": 39 }),
            artifacts: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_auto_approve() {
        let reviewer = AutoReviewer::new(AutoDecision::Approve);
        let decision = reviewer.breakpoint(&breakpoint()).await.unwrap();
        assert_eq!(decision, ReviewDecision::Approve);
    }

    #[tokio::test]
    async fn test_auto_reject() {
        let reviewer = AutoReviewer::new(AutoDecision::Reject);
        let decision = reviewer.breakpoint(&breakpoint()).await.unwrap();
        assert!(matches!(decision, ReviewDecision::Reject { .. }));
    }
}
