// src/mcp/schema.rs
// JSON-Schema-subset validation (SPEC_FULL §4.H): object/array/string/
// integer/number/boolean, `required`, nested arrays with `items`. Grounded
// in the teacher's `schemars`-derived request structs (`mcp/mod.rs`,
// `mcp/requests.rs`) — rather than deriving schemas from Rust types via
// `schemars` (which assumes compile-time-known tool shapes), tools here are
// registered at runtime with a schema value, so validation walks the JSON
// Schema document directly.

use serde_json::Value;

/// Validate `value` against a JSON-Schema-subset document. Returns a
/// human-readable reason on the first mismatch found.
pub fn validate(value: &Value, schema: &Value) -> Result<(), String> {
    validate_inner(value, schema, "$")
}

fn validate_inner(value: &Value, schema: &Value, path: &str) -> Result<(), String> {
    let Some(schema_type) = schema.get("type").and_then(Value::as_str) else {
        // No type constraint: anything validates. Matches a permissive
        // subset rather than rejecting schemas that only narrow structure.
        return Ok(());
    };

    match schema_type {
        "object" => {
            let Value::Object(obj) = value else {
                return Err(format!("{path}: expected object, got {}", type_name(value)));
            };
            if let Some(required) = schema.get("required").and_then(Value::as_array) {
                for req in required {
                    let Some(key) = req.as_str() else { continue };
                    if !obj.contains_key(key) {
                        return Err(format!("{path}: missing required field '{key}'"));
                    }
                }
            }
            if let Some(Value::Object(props)) = schema.get("properties") {
                for (key, prop_schema) in props {
                    if let Some(field_value) = obj.get(key) {
                        validate_inner(field_value, prop_schema, &format!("{path}.{key}"))?;
                    }
                }
            }
            Ok(())
        }
        "array" => {
            let Value::Array(items) = value else {
                return Err(format!("{path}: expected array, got {}", type_name(value)));
            };
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    validate_inner(item, item_schema, &format!("{path}[{i}]"))?;
                }
            }
            Ok(())
        }
        "string" => {
            if value.is_string() {
                Ok(())
            } else {
                Err(format!("{path}: expected string, got {}", type_name(value)))
            }
        }
        "integer" => {
            if value.is_i64() || value.is_u64() {
                Ok(())
            } else {
                Err(format!("{path}: expected integer, got {}", type_name(value)))
            }
        }
        "number" => {
            if value.is_number() {
                Ok(())
            } else {
                Err(format!("{path}: expected number, got {}", type_name(value)))
            }
        }
        "boolean" => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(format!("{path}: expected boolean, got {}", type_name(value)))
            }
        }
        other => Err(format!("{path}: unsupported schema type '{other}'")),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_required_fields() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": { "type": "string" } }
        });
        assert!(validate(&json!({"name": "x"}), &schema).is_ok());
        assert!(validate(&json!({}), &schema).is_err());
    }

    #[test]
    fn validates_nested_arrays_with_items() {
        let schema = json!({
            "type": "object",
            "properties": {
                "tags": { "type": "array", "items": { "type": "string" } }
            }
        });
        assert!(validate(&json!({"tags": ["a", "b"]}), &schema).is_ok());
        let err = validate(&json!({"tags": ["a", 1]}), &schema).unwrap_err();
        assert!(err.contains("tags[1]"));
    }

    #[test]
    fn rejects_wrong_primitive_types() {
        let schema = json!({ "type": "integer" });
        assert!(validate(&json!(5), &schema).is_ok());
        assert!(validate(&json!("5"), &schema).is_err());
    }

    #[test]
    fn schema_with_no_type_is_permissive() {
        let schema = json!({});
        assert!(validate(&json!({"anything": true}), &schema).is_ok());
    }

    #[test]
    fn unsupported_type_is_rejected() {
        let schema = json!({ "type": "null" });
        assert!(validate(&json!(null), &schema).is_err());
    }
}
