pub mod claude;
pub mod engine;
pub mod fixtures;
pub mod prompt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::task::TaskSpec;

pub use engine::ClaudeExecutor;
pub use fixtures::FixtureExecutor;

/// The external agent runtime that turns a task descriptor into output JSON.
///
/// Implementations return the agent's raw answer; schema validation happens
/// in the sequencer.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, spec: &TaskSpec, input: &Value) -> Result<Value>;
}
