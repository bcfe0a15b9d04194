//! Argument checks against a tool's `inputSchema`.
//!
//! Only the subset of JSON Schema the tool definitions use is understood:
//! `type` (on the root and on each property), `required`, `minimum` and
//! `maximum`. Unknown keywords and undeclared properties are ignored.

use serde_json::{Map, Value};

/// Check `args` against `schema`, returning a readable reason on failure.
pub fn validate(schema: &Value, args: &Value) -> Result<(), String> {
    let Some(object) = args.as_object() else {
        return Err(format!("arguments must be an object, got {}", type_name(args)));
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            match object.get(name) {
                None | Some(Value::Null) => {
                    return Err(format!("missing required argument '{}'", name))
                }
                Some(_) => {}
            }
        }
    }

    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    check_properties(&properties, object)
}

fn check_properties(properties: &Map<String, Value>, args: &Map<String, Value>) -> Result<(), String> {
    for (name, value) in args {
        let Some(property) = properties.get(name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        if let Some(expected) = property.get("type").and_then(Value::as_str) {
            if !matches_type(expected, value) {
                return Err(format!(
                    "argument '{}' must be {} {}, got {}",
                    name,
                    article(expected),
                    expected,
                    type_name(value)
                ));
            }
        }

        if let Some(number) = value.as_f64() {
            if let Some(minimum) = property.get("minimum").and_then(Value::as_f64) {
                if number < minimum {
                    return Err(format!("argument '{}' must be at least {}", name, minimum));
                }
            }
            if let Some(maximum) = property.get("maximum").and_then(Value::as_f64) {
                if number > maximum {
                    return Err(format!("argument '{}' must be at most {}", name, maximum));
                }
            }
        }
    }
    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn article(word: &str) -> &'static str {
    if word.starts_with(['a', 'e', 'i', 'o', 'u']) {
        "an"
    } else {
        "a"
    }
}
