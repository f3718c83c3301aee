//! Helpers for folding phase results into a process output record.
//!
//! Nothing here recomputes a quality score: derived fields are counts and
//! sums of upstream counts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::workflow::run::WorkflowRun;
use crate::workflow::types::PhaseResult;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub process_id: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

pub fn metadata(run: &WorkflowRun) -> RunMetadata {
    RunMetadata {
        process_id: run.process_id().to_string(),
        run_id: run.run_id().to_string(),
        started_at: run.started_at(),
        timestamp: run.now(),
    }
}

/// Sum a count reported by each branch of a fan-out, saturating at `u64::MAX`.
pub fn total<T, F>(results: &[PhaseResult<T>], count: F) -> u64
where
    F: Fn(&T) -> u64,
{
    saturating_sum(results.iter().map(|r| count(&r.payload)))
}

/// Sum agent-reported counts without overflowing.
pub fn saturating_sum<I>(counts: I) -> u64
where
    I: IntoIterator<Item = u64>,
{
    counts.into_iter().fold(0, u64::saturating_add)
}

/// Artifact paths reported by `results`, in declaration order.
pub fn artifact_paths<T>(results: &[PhaseResult<T>]) -> Vec<String> {
    results
        .iter()
        .flat_map(|r| r.artifacts.iter().map(|a| a.path.clone()))
        .collect()
}
