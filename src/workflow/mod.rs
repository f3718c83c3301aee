//! Phase sequencing for QA processes.
//!
//! A [`Process`] drives a [`WorkflowRun`] through a fixed order of phases.
//! [`execute`] owns the run's lifecycle: it starts the run, maps a task
//! failure or a rejected breakpoint to a failure record, and persists the
//! final [`RunRecord`].

pub mod aggregate;
pub mod gate;
pub mod run;
pub mod types;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::Instrument;

use crate::error::{AppError, Result};

pub use gate::QualityGate;
pub use run::{PreparedTask, WorkflowRun};
pub use types::{Artifact, PhaseResult, RunRecord, RunState};

#[async_trait]
pub trait Process: Send + Sync {
    /// Stable identifier, e.g. `api-testing`.
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Run every phase and return the process's output record.
    async fn run(&self, inputs: Value, run: &mut WorkflowRun) -> Result<Value>;
}

/// Execute `process` to completion or short-circuit.
///
/// Infrastructure errors (executor, schema, I/O) are returned as `Err`;
/// task-reported failures and rejections produce a `success: false` record.
pub async fn execute(process: &dyn Process, inputs: Value, run: WorkflowRun) -> Result<RunRecord> {
    let span = tracing::info_span!("run", run_id = %run.run_id(), process = process.id());

    async move {
        let mut run = run;
        let store = run.store().cloned();

        run.start();
        tracing::info!("Run started");

        let record = match process.run(inputs, &mut run).await {
            Ok(output) => run.complete(output),
            Err(e) if e.is_run_failure() => {
                tracing::warn!(error = %e, "Run failed");
                run.fail(e)
            }
            Err(e) => {
                tracing::error!(error = %e, "Run aborted");
                return Err(e);
            }
        };

        tracing::info!(
            success = record.success,
            artifacts = record.artifacts.len(),
            breakpoints = record.breakpoints.len(),
            duration_ms = record.duration_ms,
            "Run finished"
        );

        if let Some(store) = store {
            store.write_record(&record).await?;
        }

        Ok(record)
    }
    .instrument(span)
    .await
}

/// Decode loosely-typed process inputs, applying the process's defaults.
pub fn parse_inputs<T: DeserializeOwned>(inputs: Value) -> Result<T> {
    let inputs = if inputs.is_null() {
        Value::Object(Default::default())
    } else {
        inputs
    };
    serde_json::from_value(inputs).map_err(|e| AppError::InvalidInputs(e.to_string()))
}
