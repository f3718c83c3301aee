use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::agent::TaskExecutor;
use crate::error::{AppError, Result};
use crate::review::{Breakpoint, Checkpoint, ReviewDecision, Reviewer};
use crate::task::validate::{decode, validate_output};
use crate::task::{TaskContext, TaskDef, TaskSpec};
use crate::workflow::gate::QualityGate;
use crate::workflow::types::{
    Artifact, ArtifactLog, BreakpointRecord, PhaseResult, RunRecord, RunState,
};
use crate::workspace::RunStore;

/// One execution of a process. Owned exclusively by the sequencer.
pub struct WorkflowRun {
    process_id: String,
    run_id: String,
    started_at: DateTime<Utc>,
    state: RunState,
    phase: usize,
    next_effect: usize,
    artifacts: ArtifactLog,
    breakpoints: Vec<BreakpointRecord>,
    feedback: Vec<String>,
    executor: Arc<dyn TaskExecutor>,
    reviewer: Arc<dyn Reviewer>,
    store: Option<RunStore>,
    output_dir: Option<String>,
}

/// A task whose descriptor and input are fixed, ready to run concurrently
/// with its siblings. Holds no borrow of the run.
pub struct PreparedTask<O> {
    name: &'static str,
    failure: String,
    ctx: TaskContext,
    spec: TaskSpec,
    input: Value,
    executor: Arc<dyn TaskExecutor>,
    store: Option<RunStore>,
    _output: PhantomData<fn() -> O>,
}

impl<O: DeserializeOwned> PreparedTask<O> {
    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    /// Run the task and validate its output. A reported `success: false`
    /// becomes [`AppError::TaskFailed`].
    pub async fn execute(self) -> Result<PhaseResult<O>> {
        tracing::info!(task = self.name, effect_id = %self.ctx.effect_id, "Executing task");

        if let Some(store) = &self.store {
            store
                .write_task_json(&self.spec.io.input_json_path, &self.input)
                .await?;
        }

        let raw = self.executor.execute(&self.spec, &self.input).await?;

        if let Some(store) = &self.store {
            store
                .write_task_json(&self.spec.io.output_json_path, &raw)
                .await?;
        }

        validate_output(self.name, self.spec.output_schema(), &raw)?;

        let success = raw.get("success").and_then(Value::as_bool);
        if success == Some(false) {
            tracing::warn!(task = self.name, "Task reported failure");
            return Err(AppError::TaskFailed {
                task: self.name.to_string(),
                error: self.failure,
                details: raw,
            });
        }

        let artifacts: Vec<Artifact> = match raw.get("artifacts") {
            Some(value) => decode(self.name, value)?,
            None => Vec::new(),
        };
        let payload: O = decode(self.name, &raw)?;

        tracing::debug!(task = self.name, artifacts = artifacts.len(), "Task completed");

        Ok(PhaseResult {
            task: self.name.to_string(),
            effect_id: self.ctx.effect_id,
            success,
            payload,
            artifacts,
            raw,
        })
    }
}

impl WorkflowRun {
    pub fn new(
        process_id: &str,
        executor: Arc<dyn TaskExecutor>,
        reviewer: Arc<dyn Reviewer>,
    ) -> Self {
        Self {
            process_id: process_id.to_string(),
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            state: RunState::NotStarted,
            phase: 0,
            next_effect: 0,
            artifacts: ArtifactLog::new(),
            breakpoints: Vec::new(),
            feedback: Vec::new(),
            executor,
            reviewer,
            store: None,
            output_dir: None,
        }
    }

    /// Persist task I/O and the final record under `store`.
    pub fn with_store(mut self, store: RunStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn artifacts(&self) -> &[Artifact] {
        self.artifacts.as_slice()
    }

    pub fn breakpoints(&self) -> &[BreakpointRecord] {
        &self.breakpoints
    }

    pub fn feedback(&self) -> &[String] {
        &self.feedback
    }

    pub fn store(&self) -> Option<&RunStore> {
        self.store.as_ref()
    }

    /// Directory the process writes its deliverables to. Reported in the
    /// record next to the run's own bookkeeping under the store root.
    pub fn set_output_dir(&mut self, dir: &str) {
        self.output_dir = Some(dir.to_string());
    }

    /// Enter the next phase.
    pub fn phase(&mut self, name: &str) {
        self.phase += 1;
        tracing::info!(phase = self.phase, name, "Phase started");
        self.state = RunState::Running {
            phase: self.phase,
            name: name.to_string(),
        };
    }

    /// Build a task's descriptor and input without running it. Effect ids
    /// are allocated here, so preparation order fixes declaration order.
    pub fn prepare<A, O>(&mut self, def: &TaskDef<A, O>, args: &A) -> Result<PreparedTask<O>>
    where
        A: Serialize,
    {
        self.next_effect += 1;
        let ctx = TaskContext {
            process_id: self.process_id.clone(),
            effect_id: format!("{:03}-{}", self.next_effect, def.name),
            reviewer_feedback: self.feedback.clone(),
        };
        let spec = def.build(args, &ctx);
        let input = serde_json::to_value(args)?;

        Ok(PreparedTask {
            name: def.name,
            failure: def.failure_message(),
            ctx,
            spec,
            input,
            executor: Arc::clone(&self.executor),
            store: self.store.clone(),
            _output: PhantomData,
        })
    }

    /// Run a single task and fold its artifacts into the run.
    pub async fn task<A, O>(&mut self, def: &TaskDef<A, O>, args: &A) -> Result<PhaseResult<O>>
    where
        A: Serialize,
        O: DeserializeOwned,
    {
        let prepared = self.prepare(def, args)?;
        let result = prepared.execute().await;
        self.settle(result)
    }

    /// Run homogeneous branches concurrently and wait for all of them.
    /// Results and artifacts keep the order of `tasks`.
    pub async fn all<O>(&mut self, tasks: Vec<PreparedTask<O>>) -> Result<Vec<PhaseResult<O>>>
    where
        O: DeserializeOwned,
    {
        tracing::info!(branches = tasks.len(), "Fan-out started");
        let results =
            futures::future::join_all(tasks.into_iter().map(PreparedTask::execute)).await;

        results
            .into_iter()
            .map(|result| self.settle(result))
            .collect()
    }

    /// Fold a finished task into the run. Call in declaration order after a
    /// join so the artifact list does not depend on completion timing.
    pub fn settle<O>(&mut self, result: Result<PhaseResult<O>>) -> Result<PhaseResult<O>> {
        let result = result?;
        self.artifacts = std::mem::take(&mut self.artifacts).extended(&result.artifacts);
        Ok(result)
    }

    /// Suspend for a reviewer decision and branch on it.
    pub async fn breakpoint(&mut self, mut breakpoint: Breakpoint) -> Result<ReviewDecision> {
        if breakpoint.artifacts.is_empty() {
            breakpoint.artifacts = self.artifacts.as_slice().to_vec();
        }

        let resume = std::mem::replace(
            &mut self.state,
            RunState::AwaitingApproval {
                phase: self.phase,
                title: breakpoint.title.clone(),
            },
        );
        tracing::info!(phase = self.phase, title = %breakpoint.title, "Awaiting approval");

        let decision = self.reviewer.breakpoint(&breakpoint).await?;

        self.breakpoints.push(BreakpointRecord {
            phase: self.phase,
            title: breakpoint.title.clone(),
            decision: decision.clone(),
            at: Utc::now(),
        });
        self.state = resume;

        match &decision {
            ReviewDecision::Approve => {
                tracing::info!(title = %breakpoint.title, "Breakpoint approved");
            }
            ReviewDecision::Modify { feedback } => {
                tracing::info!(title = %breakpoint.title, feedback = %feedback, "Breakpoint approved with changes");
                self.feedback.push(feedback.clone());
            }
            ReviewDecision::Reject { reason } => {
                tracing::warn!(title = %breakpoint.title, reason = ?reason, "Breakpoint rejected");
                return Err(AppError::ReviewRejected {
                    title: breakpoint.title,
                    reason: reason.clone(),
                });
            }
        }

        Ok(decision)
    }

    /// Raise `breakpoint` only when `condition` holds.
    pub async fn breakpoint_if(
        &mut self,
        condition: bool,
        breakpoint: Breakpoint,
    ) -> Result<Option<ReviewDecision>> {
        if !condition {
            return Ok(None);
        }
        self.breakpoint(breakpoint).await.map(Some)
    }

    /// Evaluate `gate`; when it fires, raise `breakpoint`. Returns whether the
    /// gate passed.
    pub async fn gate(&mut self, gate: &QualityGate, breakpoint: Breakpoint) -> Result<bool> {
        if gate.passes() {
            tracing::debug!(metric = gate.metric, value = gate.value, threshold = gate.threshold, "Gate passed");
            return Ok(true);
        }

        tracing::warn!(
            metric = gate.metric,
            value = gate.value,
            threshold = gate.threshold,
            "Gate missed"
        );
        self.breakpoint(breakpoint).await?;
        Ok(false)
    }

    pub async fn checkpoint(&mut self, checkpoint: Checkpoint) -> Result<()> {
        tracing::info!(phase = self.phase, title = %checkpoint.title, "Checkpoint");
        self.reviewer.checkpoint(&checkpoint).await
    }

    pub(crate) fn start(&mut self) {
        self.started_at = Utc::now();
        self.state = RunState::Running {
            phase: 0,
            name: "start".to_string(),
        };
    }

    /// Close a run that reached its last phase.
    pub fn complete(mut self, output: Value) -> RunRecord {
        self.state = RunState::Completed;
        let success = output
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        self.into_record(success, Some(output), None, None)
    }

    /// Close a run that short-circuited.
    pub fn fail(mut self, error: AppError) -> RunRecord {
        self.state = RunState::Failed;
        let details = match &error {
            AppError::TaskFailed { task, details, .. } => Some(serde_json::json!({
                "task": task,
                "output": details,
            })),
            AppError::ReviewRejected { title, reason } => Some(serde_json::json!({
                "breakpoint": title,
                "reason": reason,
            })),
            _ => None,
        };
        self.into_record(false, None, Some(error.to_string()), details)
    }

    fn into_record(
        self,
        success: bool,
        output: Option<Value>,
        error: Option<String>,
        details: Option<Value>,
    ) -> RunRecord {
        let duration_ms = (Utc::now() - self.started_at).num_milliseconds();
        RunRecord {
            success,
            process_id: self.process_id,
            run_id: self.run_id,
            state: self.state,
            output,
            error,
            details,
            output_dir: self.output_dir,
            artifacts: self.artifacts.into_vec(),
            breakpoints: self.breakpoints,
            started_at: self.started_at,
            duration_ms,
        }
    }
}
