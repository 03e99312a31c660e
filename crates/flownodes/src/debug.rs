use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeSpec, Value};
use flowruntime::{NodeFactory, NodeMetadata};

/// Simple debug node that logs its input
pub struct DebugNode;

#[async_trait]
impl Node for DebugNode {
    fn node_type(&self) -> &str {
        "debug"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let label = ctx.parameter("message").and_then(Value::as_str).unwrap_or("(no message)");
        tracing::info!("DEBUG [{}] {}: {}", ctx.node_id(), label, ctx.input);
        Ok(ctx.input)
    }
}

pub struct DebugNodeFactory;

impl NodeFactory for DebugNodeFactory {
    fn create(&self, _spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(DebugNode))
    }

    fn node_type(&self) -> &str {
        "debug"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new("Logs input values for debugging", "debug")
    }
}
