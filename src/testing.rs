//! Scripted collaborators shared by the sequencer and process tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::TaskExecutor;
use crate::error::{AppError, Result};
use crate::review::{Breakpoint, Checkpoint, ReviewDecision, Reviewer};
use crate::task::TaskSpec;
use crate::workflow::WorkflowRun;

/// Answers tasks by name with canned JSON, optionally after a delay.
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: HashMap<String, Value>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
    specs: Mutex<Vec<TaskSpec>>,
}

/// `001-api-discovery` -> `api-discovery`
fn task_name(spec: &TaskSpec) -> (String, String) {
    let effect_id = spec
        .io
        .output_json_path
        .split('/')
        .nth(1)
        .unwrap_or_default()
        .to_string();
    let name = effect_id
        .split_once('-')
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| effect_id.clone());
    (effect_id, name)
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to every invocation of `task` (or of one effect id) with `output`.
    pub fn respond(mut self, task: &str, output: Value) -> Self {
        self.responses.insert(task.to_string(), output);
        self
    }

    pub fn delay(mut self, task: &str, delay: Duration) -> Self {
        self.delays.insert(task.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn specs(&self) -> Vec<TaskSpec> {
        self.specs.lock().unwrap().clone()
    }

    pub fn called(&self, task: &str) -> bool {
        self.calls().iter().any(|c| c == task)
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute(&self, spec: &TaskSpec, _input: &Value) -> Result<Value> {
        let (effect_id, name) = task_name(spec);
        self.calls.lock().unwrap().push(name.clone());
        self.specs.lock().unwrap().push(spec.clone());

        let delay = self
            .delays
            .get(&effect_id)
            .or_else(|| self.delays.get(&name))
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .get(&effect_id)
            .or_else(|| self.responses.get(&name))
            .cloned()
            .ok_or_else(|| AppError::Executor(format!("No scripted response for {name}")))
    }
}

/// Records every breakpoint and answers from a queue (approve when empty).
#[derive(Default)]
pub struct RecordingReviewer {
    decisions: Mutex<VecDeque<ReviewDecision>>,
    breakpoints: Mutex<Vec<Breakpoint>>,
    checkpoints: Mutex<Vec<Checkpoint>>,
}

impl RecordingReviewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answering(decisions: Vec<ReviewDecision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
            ..Self::default()
        }
    }

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.breakpoints().into_iter().map(|b| b.title).collect()
    }

    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.checkpoints.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reviewer for RecordingReviewer {
    async fn breakpoint(&self, breakpoint: &Breakpoint) -> Result<ReviewDecision> {
        self.breakpoints.lock().unwrap().push(breakpoint.clone());
        Ok(self
            .decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ReviewDecision::Approve))
    }

    async fn checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.checkpoints.lock().unwrap().push(checkpoint.clone());
        Ok(())
    }
}

pub fn run_with(
    process_id: &str,
    executor: &Arc<ScriptedExecutor>,
    reviewer: &Arc<RecordingReviewer>,
) -> WorkflowRun {
    WorkflowRun::new(process_id, executor.clone(), reviewer.clone())
}
