//! Declarative task descriptors handed to the agent executor.
//!
//! A task is described by a [`TaskDef`]: a name plus a pure builder
//! `(args, ctx) -> TaskSpec`. Building never performs I/O and never reads
//! hidden state, so identical arguments and context always yield an identical
//! descriptor.

pub mod schema;
pub mod validate;

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Per-invocation context supplied by the sequencer to a task builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskContext {
    pub process_id: String,
    /// Stable within a run: `<seq>-<task name>`, allocated in declaration order.
    pub effect_id: String,
    /// Reviewer feedback gathered from earlier `Modify` decisions.
    pub reviewer_feedback: Vec<String>,
}

impl TaskContext {
    pub fn input_json_path(&self) -> String {
        format!("tasks/{}/input.json", self.effect_id)
    }

    pub fn output_json_path(&self) -> String {
        format!("tasks/{}/output.json", self.effect_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub kind: String,
    pub title: String,
    pub agent: AgentSpec,
    pub io: IoSpec,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub prompt: PromptSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSpec {
    pub role: String,
    pub task: String,
    pub context: Value,
    pub instructions: Vec<String>,
    pub output_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoSpec {
    pub input_json_path: String,
    pub output_json_path: String,
}

impl TaskSpec {
    /// Start an agent task descriptor bound to `ctx`'s io paths.
    pub fn agent(name: &str, title: &str, ctx: &TaskContext) -> TaskSpecBuilder {
        TaskSpecBuilder {
            name: name.to_string(),
            title: title.to_string(),
            role: String::new(),
            task: String::new(),
            context: json!({}),
            instructions: Vec::new(),
            output_schema: json!({ "type": "object" }),
            labels: Vec::new(),
            ctx: ctx.clone(),
        }
    }

    pub fn output_schema(&self) -> &Value {
        &self.agent.prompt.output_schema
    }
}

pub struct TaskSpecBuilder {
    name: String,
    title: String,
    role: String,
    task: String,
    context: Value,
    instructions: Vec<String>,
    output_schema: Value,
    labels: Vec<String>,
    ctx: TaskContext,
}

impl TaskSpecBuilder {
    pub fn role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }

    pub fn context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn instructions<I, S>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions
            .extend(instructions.into_iter().map(Into::into));
        self
    }

    /// Declare the output schema. `artifacts` is always accepted.
    pub fn output(mut self, required: &[&str], properties: Value) -> Self {
        self.output_schema = schema::object(required, properties);
        self
    }

    pub fn labels(mut self, labels: &[&str]) -> Self {
        self.labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn build(self) -> TaskSpec {
        let mut context = self.context;
        if !self.ctx.reviewer_feedback.is_empty() {
            if let Value::Object(map) = &mut context {
                map.insert(
                    "reviewerFeedback".to_string(),
                    json!(self.ctx.reviewer_feedback),
                );
            }
        }

        TaskSpec {
            kind: "agent".to_string(),
            title: self.title,
            agent: AgentSpec {
                name: self.name,
                prompt: PromptSpec {
                    role: self.role,
                    task: self.task,
                    context,
                    instructions: self.instructions,
                    output_schema: self.output_schema,
                },
            },
            io: IoSpec {
                input_json_path: self.ctx.input_json_path(),
                output_json_path: self.ctx.output_json_path(),
            },
            labels: self.labels,
        }
    }
}

/// A named task whose builder takes `A` and whose validated output decodes to `O`.
pub struct TaskDef<A, O> {
    pub name: &'static str,
    /// Error reported in the failure record when the task returns `success: false`.
    pub failure: Option<&'static str>,
    build: fn(&A, &TaskContext) -> TaskSpec,
    _output: PhantomData<fn() -> O>,
}

impl<A, O> TaskDef<A, O> {
    pub const fn new(name: &'static str, build: fn(&A, &TaskContext) -> TaskSpec) -> Self {
        Self {
            name,
            failure: None,
            build,
            _output: PhantomData,
        }
    }

    /// A task whose `success: false` aborts the run with `failure` as the error.
    pub const fn fatal(
        name: &'static str,
        failure: &'static str,
        build: fn(&A, &TaskContext) -> TaskSpec,
    ) -> Self {
        Self {
            name,
            failure: Some(failure),
            build,
            _output: PhantomData,
        }
    }

    pub fn build(&self, args: &A, ctx: &TaskContext) -> TaskSpec {
        (self.build)(args, ctx)
    }

    pub fn failure_message(&self) -> String {
        match self.failure {
            Some(message) => message.to_string(),
            None => format!("Task {} reported failure", self.name),
        }
    }
}
