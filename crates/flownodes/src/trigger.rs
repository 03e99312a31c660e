use async_trait::async_trait;
use chrono::Local;
use flowcore::{Node, NodeContext, NodeError, NodeSpec, Value};
use flowruntime::{NodeFactory, NodeMetadata};
use serde_json::json;

/// Workflow entry point
pub struct TriggerNode;

#[async_trait]
impl Node for TriggerNode {
    fn node_type(&self) -> &str {
        "trigger"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let trigger_type = ctx.parameter_str("trigger_type", "manual");
        let triggered_at = Local::now().to_rfc3339();

        let output = match trigger_type.as_str() {
            "schedule" => json!({
                "triggered_at": triggered_at,
                "trigger_type": "schedule",
            }),
            "event" => json!({
                "event": ctx.parameter_str("event_name", "default"),
                "triggered_at": triggered_at,
                "data": ctx.input,
            }),
            // manual, webhook and anything unrecognised forward the input
            _ => pass_through(ctx.input),
        };

        Ok(output)
    }
}

fn pass_through(input: Value) -> Value {
    if input.is_null() {
        json!({})
    } else {
        input
    }
}

pub struct TriggerNodeFactory;

impl NodeFactory for TriggerNodeFactory {
    fn create(&self, _spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(TriggerNode))
    }

    fn node_type(&self) -> &str {
        "trigger"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new("Workflow entry point (manual, webhook, schedule, event)", "trigger")
    }
}
