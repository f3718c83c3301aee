use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::review::ReviewDecision;

/// Reference to a file-like output produced by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Append-only artifact accumulator threaded through a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArtifactLog(Vec<Artifact>);

impl ArtifactLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `artifacts` onto the end of the log.
    pub fn extended<'a, I>(mut self, artifacts: I) -> Self
    where
        I: IntoIterator<Item = &'a Artifact>,
    {
        self.0.extend(artifacts.into_iter().cloned());
        self
    }

    pub fn as_slice(&self) -> &[Artifact] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Artifact> {
        self.0
    }
}

/// Output of one task invocation. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct PhaseResult<T> {
    pub task: String,
    pub effect_id: String,
    /// `success` as reported by the task, when its schema declares one.
    pub success: Option<bool>,
    pub payload: T,
    pub artifacts: Vec<Artifact>,
    pub raw: Value,
}

/// Lifecycle of a run. `AwaitingApproval` always returns to `Running`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running { phase: usize, name: String },
    AwaitingApproval { phase: usize, title: String },
    Completed,
    Failed,
}

/// One breakpoint raised during the run and how it was answered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointRecord {
    pub phase: usize,
    pub title: String,
    pub decision: ReviewDecision,
    pub at: DateTime<Utc>,
}

/// Final record returned by a run, successful or not.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub success: bool,
    pub process_id: String,
    pub run_id: String,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Deliverables directory named by the process inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    pub artifacts: Vec<Artifact>,
    pub breakpoints: Vec<BreakpointRecord>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(path: &str) -> Artifact {
        Artifact {
            path: path.to_string(),
            format: None,
            label: None,
        }
    }

    #[test]
    fn test_log_is_append_only_in_order() {
        let first = [artifact("a.md"), artifact("b.md")];
        let second = [artifact("c.json")];

        let log = ArtifactLog::new().extended(&first).extended(&second);
        let paths: Vec<_> = log.as_slice().iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, ["a.md", "b.md", "c.json"]);
    }

    #[test]
    fn test_artifact_optional_fields() {
        let parsed: Artifact = serde_json::from_str(r#"{"path":"report.html"}"#).unwrap();
        assert_eq!(parsed, artifact("report.html"));
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"{"path":"report.html"}"#
        );
    }
}
