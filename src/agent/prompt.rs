use serde_json::Value;

use crate::task::TaskSpec;

pub const SUBMIT_TOOL: &str = "submit_result";

/// System prompt for an agent task: the role and the numbered instructions.
pub fn system_prompt(spec: &TaskSpec) -> String {
    let prompt = &spec.agent.prompt;
    let instructions = prompt
        .instructions
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{}. {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are {role}.

## Task
{title}

## Instructions
{instructions}

## Output
When you are done, call the `{SUBMIT_TOOL}` tool exactly once. Its input must satisfy the declared schema. Report artifacts you produced as objects with a `path` and optional `format` and `label`. If the task cannot be completed, submit `"success": false` with an explanation when the schema has a `success` field."#,
        role = prompt.role,
        title = spec.title,
    )
}

/// First user message: the task statement, its context and its input.
pub fn initial_message(spec: &TaskSpec, input: &Value) -> String {
    let prompt = &spec.agent.prompt;
    let context = serde_json::to_string_pretty(&prompt.context).unwrap_or_default();
    let input = serde_json::to_string_pretty(input).unwrap_or_default();

    format!(
        "{task}\n\n## Context\n```json\n{context}\n```\n\n## Input ({path})\n```json\n{input}\n```",
        task = prompt.task,
        path = spec.io.input_json_path,
    )
}

pub const NUDGE: &str =
    "You did not call the submit_result tool. Submit your final result now by calling it.";
