use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeSpec, Value, ValueExt};
use flowruntime::{NodeFactory, NodeMetadata};
use serde_json::json;

/// Evaluate a comparison against one field of the input
pub struct ConditionNode;

#[async_trait]
impl Node for ConditionNode {
    fn node_type(&self) -> &str {
        "condition"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let condition_type = ctx.parameter_str("condition_type", "equals");
        let field = ctx.parameter_str("field", "");
        let expected = ctx.parameter_or("value", json!(""));

        let field_value = if field.is_empty() {
            Value::Null
        } else if ctx.input.is_object() {
            ctx.input.field(&field).cloned().unwrap_or(Value::Null)
        } else {
            ctx.input.clone()
        };

        let result = evaluate(&condition_type, &field_value, &expected);

        Ok(json!({
            "condition_result": result,
            "field": field,
            "field_value": field_value,
            "expected_value": expected,
            "condition_type": condition_type,
            "data": ctx.input,
        }))
    }
}

fn evaluate(condition_type: &str, actual: &Value, expected: &Value) -> bool {
    let numeric = |cmp: fn(f64, f64) -> bool| match (actual.to_f64_lenient(), expected.to_f64_lenient()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    };

    match condition_type {
        "equals" => actual.to_plain_string() == expected.to_plain_string(),
        "not_equals" => actual.to_plain_string() != expected.to_plain_string(),
        "greater_than" => numeric(|a, b| a > b),
        "less_than" => numeric(|a, b| a < b),
        "contains" => actual.to_plain_string().contains(&expected.to_plain_string()),
        "not_contains" => !actual.to_plain_string().contains(&expected.to_plain_string()),
        "exists" => !actual.is_null(),
        "not_exists" => actual.is_null(),
        _ => false,
    }
}

pub struct ConditionNodeFactory;

impl NodeFactory for ConditionNodeFactory {
    fn create(&self, _spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(ConditionNode))
    }

    fn node_type(&self) -> &str {
        "condition"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new("Compare an input field against a value", "logic")
    }
}
