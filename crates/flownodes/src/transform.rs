use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeSpec, Value, ValueExt};
use flowruntime::{NodeFactory, NodeMetadata};
use regex::{Captures, Regex};
use serde_json::json;

/// Reshape the incoming payload according to `parameters.operation`
pub struct TransformNode;

#[async_trait]
impl Node for TransformNode {
    fn node_type(&self) -> &str {
        "transform"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let operation = ctx.parameter_str("operation", "pass_through");
        let input = ctx.input.clone();

        match operation.as_str() {
            "extract_json" => Ok(extract_json(&ctx)),
            "to_json" => Ok(Value::String(input.to_string())),
            "merge" => {
                let merge_data = ctx.parameter_or("merge_data", json!({}));
                Ok(input.merged_with(&merge_data))
            }
            "filter" => Ok(filter(&ctx, input)),
            "map" => Ok(map(&ctx.parameter_str("map_key", ""), &input)),
            "format_string" => {
                format_string(&ctx.parameter_str("template", "{data}"), &input).map(Value::String)
            }
            _ => Ok(input),
        }
    }
}

fn extract_json(ctx: &NodeContext) -> Value {
    let mut source = ctx.parameter_str("json_string", "");
    if source.is_empty() {
        source = match &ctx.input {
            Value::String(s) => s.clone(),
            Value::Object(_) => ctx.input.to_string(),
            _ => String::new(),
        };
    }

    serde_json::from_str(&source).unwrap_or_else(|_| json!({"error": "Invalid JSON"}))
}

fn filter(ctx: &NodeContext, input: Value) -> Value {
    if !input.is_object() {
        return input;
    }

    let key = ctx.parameter_str("filter_key", "");
    let expected = ctx.parameter_or("filter_value", json!(""));
    if input.field(&key) == Some(&expected) {
        input
    } else {
        json!({})
    }
}

fn map(key: &str, input: &Value) -> Value {
    match input {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter(|item| item.is_object())
                .map(|item| item.field(key).cloned().unwrap_or(Value::Null))
                .collect(),
        ),
        Value::Object(_) => input.field(key).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Fill `{name}` placeholders from an object input, or `{data}` from any other input
fn format_string(template: &str, input: &Value) -> Result<String, NodeError> {
    let placeholder = Regex::new(r"\{([A-Za-z0-9_]+)\}")
        .map_err(|e| NodeError::ExecutionFailed(format!("Template pattern error: {}", e)))?;

    let mut missing = None;
    let rendered = placeholder.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        let value = match input {
            Value::Object(obj) => obj.get(name),
            other if name == "data" => Some(other),
            _ => None,
        };
        match value {
            Some(v) => v.to_plain_string(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(NodeError::MissingInput(name)),
        None => Ok(rendered.into_owned()),
    }
}

pub struct TransformNodeFactory;

impl NodeFactory for TransformNodeFactory {
    fn create(&self, _spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(TransformNode))
    }

    fn node_type(&self) -> &str {
        "transform"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new(
            "Merge, filter, map, format or (de)serialize the incoming data",
            "transform",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_string_uses_object_fields() {
        let out = format_string("Hello {name}, you are {age}", &json!({"name": "Ada", "age": 36}));
        assert_eq!(out.unwrap(), "Hello Ada, you are 36");
    }

    #[test]
    fn format_string_wraps_scalars_as_data() {
        assert_eq!(format_string("got {data}", &json!(5)).unwrap(), "got 5");
    }

    #[test]
    fn format_string_reports_missing_fields() {
        let err = format_string("{nope}", &json!({"a": 1})).unwrap_err();
        assert!(matches!(err, NodeError::MissingInput(name) if name == "nope"));
    }

    #[test]
    fn map_over_arrays_and_objects() {
        let items = json!([{"k": 1}, {"k": 2}, "skip", {"other": 3}]);
        assert_eq!(map("k", &items), json!([1, 2, null]));
        assert_eq!(map("k", &json!({"k": "v"})), json!("v"));
        assert_eq!(map("k", &json!(3)), Value::Null);
    }
}
