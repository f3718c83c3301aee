//! Boundary adapter between untyped agent output and typed phase payloads.

use jsonschema::JSONSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, Result};

/// Check `output` against the task's declared output schema.
pub fn validate_output(task: &str, schema: &Value, output: &Value) -> Result<()> {
    let compiled = JSONSchema::compile(schema).map_err(|e| AppError::SchemaViolation {
        task: task.to_string(),
        message: format!("invalid output schema: {e}"),
    })?;

    if let Err(errors) = compiled.validate(output) {
        let message = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{e} (at {path})")
                }
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(AppError::SchemaViolation {
            task: task.to_string(),
            message,
        });
    }

    Ok(())
}

/// Decode validated output into the phase's payload type.
pub fn decode<O: DeserializeOwned>(task: &str, output: &Value) -> Result<O> {
    serde_json::from_value(output.clone()).map_err(|e| AppError::SchemaViolation {
        task: task.to_string(),
        message: e.to_string(),
    })
}
