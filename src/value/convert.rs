//! Conversions between the engine's `Value` and `serde_json::Value`.

use super::data_value::Value;
use super::number::Number;
use serde_json::Value as JsonValue;

/// Converts a `serde_json::Value` into the engine's own `Value`.
pub trait FromJson {
    fn from_json(json: &JsonValue) -> Self;
}

/// Converts the engine's `Value` back into a `serde_json::Value`.
pub trait ToJson {
    fn to_json(&self) -> JsonValue;
}

impl FromJson for Value {
    fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => Value::Number(Number::from(n.clone())),
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl ToJson for Value {
    fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Number(n) => JsonValue::Number((*n).into()),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Array(items) => JsonValue::Array(items.iter().map(|v| v.to_json()).collect()),
            Value::Object(entries) => {
                let mut map = serde_json::Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), v.to_json());
                }
                JsonValue::Object(map)
            }
        }
    }
}

impl From<&JsonValue> for Value {
    fn from(json: &JsonValue) -> Self {
        Value::from_json(json)
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Value::from_json(&json)
    }
}

impl From<&Value> for JsonValue {
    fn from(value: &Value) -> Self {
        value.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let json = json!({"a": 1, "b": [true, null, "x"], "c": 3.5});
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_integer_preserved_not_float() {
        let value = Value::from_json(&json!(5));
        assert_eq!(value, Value::integer(5));
        assert_eq!(value.to_json(), json!(5));
    }
}
