use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::TaskExecutor;
use crate::error::{AppError, Result};
use crate::task::TaskSpec;

/// Replays canned task outputs from `<dir>/<task name>.json` for offline runs.
///
/// Lookup order is `<effect id>.json`, then `<task name>.json`, then
/// `<agent name>.json`. The effect id pins one invocation of a task, the
/// agent name answers every task that shares that agent.
pub struct FixtureExecutor {
    dir: PathBuf,
}

impl FixtureExecutor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn candidates(&self, spec: &TaskSpec) -> Vec<PathBuf> {
        let mut names = Vec::with_capacity(3);
        if let Some(effect_id) = spec.io.output_json_path.split('/').nth(1) {
            names.push(effect_id);
            if let Some((_, task)) = effect_id.split_once('-') {
                names.push(task);
            }
        }
        names.push(spec.agent.name.as_str());
        names.dedup();

        names
            .into_iter()
            .map(|name| self.dir.join(format!("{name}.json")))
            .collect()
    }
}

#[async_trait]
impl TaskExecutor for FixtureExecutor {
    async fn execute(&self, spec: &TaskSpec, _input: &Value) -> Result<Value> {
        for path in self.candidates(spec) {
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    tracing::debug!(path = %path.display(), "Using fixture");
                    return Ok(serde_json::from_slice(&bytes)?);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Executor(format!(
            "No fixture for task {} in {}",
            spec.io.output_json_path.split('/').nth(1).unwrap_or(spec.agent.name.as_str()),
            self.dir.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutoDecision;
    use crate::processes::mobile_testing::MobileTesting;
    use crate::review::AutoReviewer;
    use crate::task::TaskContext;
    use crate::workflow::{execute, WorkflowRun};
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;

    fn spec(effect_id: &str) -> TaskSpec {
        spec_for_agent("baseline-capture", effect_id)
    }

    fn spec_for_agent(agent: &str, effect_id: &str) -> TaskSpec {
        let ctx = TaskContext {
            process_id: "visual-regression".to_string(),
            effect_id: effect_id.to_string(),
            reviewer_feedback: Vec::new(),
        };
        TaskSpec::agent(agent, "Baseline capture", &ctx).build()
    }

    #[tokio::test]
    async fn test_effect_fixture_overrides_agent_fixture() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("baseline-capture.json"), r#"{"screenshots": 4}"#).unwrap();
        fs::write(tmp.path().join("005-baseline-capture.json"), r#"{"screenshots": 9}"#).unwrap();

        let executor = FixtureExecutor::new(tmp.path());
        let shared = executor.execute(&spec("004-baseline-capture"), &json!({})).await.unwrap();
        let specific = executor.execute(&spec("005-baseline-capture"), &json!({})).await.unwrap();

        assert_eq!(shared["screenshots"], 4);
        assert_eq!(specific["screenshots"], 9);
    }

    #[tokio::test]
    async fn test_task_name_fixture_separates_shared_agents() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("mobile-test-developer.json"), r#"{"testsCreated": 1}"#).unwrap();
        fs::write(tmp.path().join("functional-tests.json"), r#"{"testsCreated": 20}"#).unwrap();
        fs::write(tmp.path().join("ui-tests.json"), r#"{"testsCreated": 12}"#).unwrap();

        let executor = FixtureExecutor::new(tmp.path());
        let functional = executor
            .execute(&spec_for_agent("mobile-test-developer", "004-functional-tests"), &json!({}))
            .await
            .unwrap();
        let ui = executor
            .execute(&spec_for_agent("mobile-test-developer", "005-ui-tests"), &json!({}))
            .await
            .unwrap();
        let performance = executor
            .execute(&spec_for_agent("mobile-test-developer", "006-performance-tests"), &json!({}))
            .await
            .unwrap();

        assert_eq!(functional["testsCreated"], 20);
        assert_eq!(ui["testsCreated"], 12);
        assert_eq!(performance["testsCreated"], 1);
    }

    #[tokio::test]
    async fn test_replays_whole_process_from_task_named_fixtures() {
        let tmp = tempfile::tempdir().unwrap();
        let fixtures = [
            ("mobile-environment-setup", json!({ "success": true })),
            (
                "scenario-planning",
                json!({ "scenarios": (0..12).map(|i| json!({ "title": format!("S{i}") })).collect::<Vec<_>>() }),
            ),
            ("device-matrix", json!({ "devices": [{ "name": "Pixel 8", "platform": "Android" }] })),
            ("functional-tests", json!({ "testsCreated": 20 })),
            ("ui-tests", json!({ "testsCreated": 12 })),
            ("performance-tests", json!({ "testsCreated": 3 })),
            ("test-execution", json!({ "totalTests": 35, "passRate": 97.0 })),
            ("compatibility-analysis", json!({ "compatibilityScore": 90.0 })),
            ("mobile-report", json!({ "reportPath": "out/report.md" })),
        ];
        for (name, body) in fixtures {
            fs::write(tmp.path().join(format!("{name}.json")), body.to_string()).unwrap();
        }

        let run = WorkflowRun::new(
            "mobile-testing",
            Arc::new(FixtureExecutor::new(tmp.path())),
            Arc::new(AutoReviewer::new(AutoDecision::Approve)),
        );
        let record = execute(&MobileTesting, json!({ "appName": "Shop" }), run)
            .await
            .unwrap();

        assert!(record.success, "{:?}", record.error);
        assert_eq!(record.output.unwrap()["testsImplemented"], 35);
    }

    #[tokio::test]
    async fn test_missing_fixture_is_executor_error() {
        let tmp = tempfile::tempdir().unwrap();
        let executor = FixtureExecutor::new(tmp.path());
        let err = executor.execute(&spec("001-baseline-capture"), &json!({})).await.unwrap_err();
        assert!(matches!(err, AppError::Executor(_)));
    }
}
