use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-schema-wrapped description of a tool's `<arguments>` shape,
/// surfaced to the model alongside the tool's name and description
/// (spec §3: "Tool (capability set)").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputSchema(Value);

impl InputSchema {
    pub fn new(schema: Value) -> Self {
        Self(schema)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn object(properties: serde_json::Map<String, Value>, required: Vec<String>) -> Self {
        let mut schema = serde_json::Map::new();
        schema.insert("type".to_string(), Value::String("object".to_string()));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            let required_values = required.into_iter().map(Value::String).collect();
            schema.insert("required".to_string(), Value::Array(required_values));
        }
        Self(Value::Object(schema))
    }

    pub fn empty_object() -> Self {
        Self::object(Default::default(), Vec::new())
    }
}

impl From<Value> for InputSchema {
    fn from(schema: Value) -> Self {
        Self(schema)
    }
}

/// Lets a tool derive its schema from a `#[derive(schemars::JsonSchema)]`
/// params struct via `schemars::schema_for!` instead of hand-building the
/// `serde_json::Value` object field by field.
impl From<schemars::Schema> for InputSchema {
    fn from(schema: schemars::Schema) -> Self {
        let value = serde_json::to_value(&schema).unwrap_or(Value::Null);
        Self(ensure_object_properties(value))
    }
}

/// `schemars` omits `"properties": {}` for a struct with no fields; the
/// model-facing schema is clearer with it present than absent.
fn ensure_object_properties(schema: Value) -> Value {
    let mut schema = schema;
    if let Value::Object(obj) = &mut schema {
        let is_object = obj.get("type").and_then(Value::as_str).is_some_and(|t| t == "object");
        if is_object && !obj.contains_key("properties") {
            obj.insert("properties".to_string(), Value::Object(serde_json::Map::new()));
        }
    }
    schema
}

/// Description of a registered tool handed to the LLM provider as part of
/// the system prompt (spec §4.9.a: "tool schemas").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}
