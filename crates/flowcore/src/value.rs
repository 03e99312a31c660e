use serde_json::{Map, Value};

/// Convenience accessors over the JSON payloads that flow between nodes.
pub trait ValueExt {
    /// Render the value as plain text: strings without quotes, everything else as JSON.
    fn to_plain_string(&self) -> String;

    /// Numeric view of the value, accepting numeric strings.
    fn to_f64_lenient(&self) -> Option<f64>;

    /// Look up `key` when the value is an object.
    fn field(&self, key: &str) -> Option<&Value>;

    /// Shallow merge of two objects, keys from `overlay` winning.
    ///
    /// A non-object receiver yields `overlay` unchanged.
    fn merged_with(&self, overlay: &Value) -> Value;
}

impl ValueExt for Value {
    fn to_plain_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn to_f64_lenient(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn field(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    fn merged_with(&self, overlay: &Value) -> Value {
        match (self, overlay) {
            (Value::Object(base), Value::Object(extra)) => {
                let mut merged: Map<String, Value> = base.clone();
                for (key, value) in extra {
                    merged.insert(key.clone(), value.clone());
                }
                Value::Object(merged)
            }
            (Value::Object(base), Value::Null) => Value::Object(base.clone()),
            _ => overlay.clone(),
        }
    }
}
