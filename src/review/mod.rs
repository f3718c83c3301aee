//! Human-in-the-loop boundary: breakpoints and checkpoints.

pub mod auto;
pub mod console;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::workflow::types::Artifact;

pub use auto::AutoReviewer;
pub use console::ConsoleReviewer;

/// A question surfaced to a reviewer; the run is suspended until answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub title: String,
    pub question: String,
    pub context: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

/// An informational pause; acknowledged, never answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub title: String,
    pub message: String,
    pub context: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Modify {
        feedback: String,
    },
}

#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Present a breakpoint and wait for the reviewer's decision.
    async fn breakpoint(&self, breakpoint: &Breakpoint) -> Result<ReviewDecision>;

    /// Present a checkpoint. Returns once it has been surfaced.
    async fn checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decision_wire_format() {
        assert_eq!(
            serde_json::to_value(ReviewDecision::Approve).unwrap(),
            json!({ "decision": "approve" })
        );
        assert_eq!(
            serde_json::to_value(ReviewDecision::Modify {
                feedback: "add tablet layouts".to_string()
            })
            .unwrap(),
            json!({ "decision": "modify", "feedback": "add tablet layouts" })
        );

        let rejected: ReviewDecision =
            serde_json::from_value(json!({ "decision": "reject" })).unwrap();
        assert_eq!(rejected, ReviewDecision::Reject { reason: None });
    }
}
