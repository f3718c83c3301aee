//! Helpers for the JSON schema literals task builders declare.

use serde_json::{json, Map, Value};

/// The schema every task accepts for its `artifacts` list.
pub fn artifacts() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "format": { "type": "string" },
                "label": { "type": "string" }
            },
            "required": ["path"]
        }
    })
}

/// Object schema with `required` fields; adds `artifacts` unless declared.
pub fn object(required: &[&str], properties: Value) -> Value {
    let mut properties = match properties {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    properties
        .entry("artifacts".to_string())
        .or_insert_with(artifacts);

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

pub fn string() -> Value {
    json!({ "type": "string" })
}

pub fn number() -> Value {
    json!({ "type": "number" })
}

pub fn integer() -> Value {
    json!({ "type": "integer" })
}

pub fn boolean() -> Value {
    json!({ "type": "boolean" })
}

pub fn strings() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

pub fn array_of(items: Value) -> Value {
    json!({ "type": "array", "items": items })
}

/// Loose object: fields are not checked beyond being an object.
pub fn any_object() -> Value {
    json!({ "type": "object" })
}
