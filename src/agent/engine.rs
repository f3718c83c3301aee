use async_trait::async_trait;
use serde_json::Value;

use crate::agent::claude::{
    ClaudeClient, ContentBlock, Message, MessageContent, MessagesRequest, ToolChoice,
    ToolDefinition,
};
use crate::agent::prompt::{self, NUDGE, SUBMIT_TOOL};
use crate::agent::TaskExecutor;
use crate::error::{AppError, Result};
use crate::task::TaskSpec;

/// Runs agent tasks against the Claude Messages API.
///
/// The task's output schema becomes the input schema of a single forced
/// `submit_result` tool, so the agent's answer arrives as structured JSON.
pub struct ClaudeExecutor {
    client: ClaudeClient,
    max_turns: u32,
}

impl ClaudeExecutor {
    pub fn new(client: ClaudeClient, max_turns: u32) -> Self {
        Self {
            client,
            max_turns: max_turns.max(1),
        }
    }

    fn submit_tool(spec: &TaskSpec) -> ToolDefinition {
        ToolDefinition {
            name: SUBMIT_TOOL.to_string(),
            description: format!("Submit the final result of the task \"{}\".", spec.title),
            input_schema: spec.output_schema().clone(),
        }
    }
}

#[async_trait]
impl TaskExecutor for ClaudeExecutor {
    async fn execute(&self, spec: &TaskSpec, input: &Value) -> Result<Value> {
        let system = prompt::system_prompt(spec);
        let tools = vec![Self::submit_tool(spec)];

        let mut messages = vec![Message {
            role: "user".to_string(),
            content: MessageContent::Text(prompt::initial_message(spec, input)),
        }];

        for turn in 0..self.max_turns {
            tracing::debug!(agent = %spec.agent.name, turn, "Agent turn");

            let request = MessagesRequest {
                model: self.client.model().to_string(),
                max_tokens: self.client.max_tokens(),
                system: system.clone(),
                messages: messages.clone(),
                tools: tools.clone(),
                tool_choice: Some(ToolChoice::Tool {
                    name: SUBMIT_TOOL.to_string(),
                }),
            };

            let response = self.client.send_message(&request).await?;

            tracing::info!(
                agent = %spec.agent.name,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                stop_reason = ?response.stop_reason,
                "Claude response"
            );

            let submitted = response.content.iter().find_map(|block| match block {
                ContentBlock::ToolUse { name, input, .. } if name == SUBMIT_TOOL => {
                    Some(input.clone())
                }
                _ => None,
            });

            if let Some(output) = submitted {
                if response.stop_reason.as_deref() != Some("max_tokens") {
                    return Ok(output);
                }
                tracing::warn!(agent = %spec.agent.name, "Submission truncated by max_tokens");
            }

            let text = extract_text(&response.content);
            if !text.is_empty() {
                tracing::debug!(agent = %spec.agent.name, text = %text, "Agent replied without submitting");
            }

            // The API requires every tool_use to be answered before the next turn.
            let answers: Vec<ContentBlock> = response
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, .. } => Some(ContentBlock::ToolResult {
                        tool_use_id: id.clone(),
                        content: "Submission incomplete; submit the full result again.".to_string(),
                        is_error: Some(true),
                    }),
                    _ => None,
                })
                .collect();

            messages.push(Message {
                role: "assistant".to_string(),
                content: MessageContent::Blocks(response.content),
            });
            messages.push(Message {
                role: "user".to_string(),
                content: if answers.is_empty() {
                    MessageContent::Text(NUDGE.to_string())
                } else {
                    MessageContent::Blocks(answers)
                },
            });
        }

        Err(AppError::Executor(format!(
            "Agent {} did not submit a result within {} turns",
            spec.agent.name, self.max_turns
        )))
    }
}

fn extract_text(content: &[ContentBlock]) -> String {
    content
        .iter()
        .filter_map(|block| {
            if let ContentBlock::Text { text } = block {
                Some(text.as_str())
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskContext;
    use serde_json::json;

    #[test]
    fn test_submit_tool_uses_output_schema() {
        let ctx = TaskContext {
            process_id: "api-testing".to_string(),
            effect_id: "001-api-discovery".to_string(),
            reviewer_feedback: Vec::new(),
        };
        let spec = TaskSpec::agent("api-analyst", "API discovery", &ctx)
            .output(&["success"], json!({ "success": { "type": "boolean" } }))
            .build();

        let tool = ClaudeExecutor::submit_tool(&spec);
        assert_eq!(tool.name, SUBMIT_TOOL);
        assert_eq!(tool.input_schema["required"], json!(["success"]));
    }

    #[test]
    fn test_extract_text_skips_tool_blocks() {
        let content = vec![
            ContentBlock::Text {
                text: "one".to_string(),
            },
            ContentBlock::ToolUse {
                id: "tu".to_string(),
                name: SUBMIT_TOOL.to_string(),
                input: json!({}),
            },
            ContentBlock::Text {
                text: "two".to_string(),
            },
        ];
        assert_eq!(extract_text(&content), "one\ntwo");
    }
}
