use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeSpec, Value, ValueExt};
use flowruntime::{NodeFactory, NodeMetadata};
use tokio::time::{sleep, Duration};

/// Delay execution for a specified duration
pub struct DelayNode;

#[async_trait]
impl Node for DelayNode {
    fn node_type(&self) -> &str {
        "delay"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let delay_ms = ctx
            .parameter("delay_ms")
            .and_then(ValueExt::to_f64_lenient)
            .unwrap_or(1000.0)
            .max(0.0) as u64;

        tracing::debug!("Delaying node {} for {}ms", ctx.node_id(), delay_ms);

        let cancellation = ctx.cancellation.clone();
        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms)) => Ok(ctx.input),
            _ = cancellation.cancelled() => Err(NodeError::Cancelled),
        }
    }
}

pub struct DelayNodeFactory;

impl NodeFactory for DelayNodeFactory {
    fn create(&self, _spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(DelayNode))
    }

    fn node_type(&self) -> &str {
        "delay"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new("Delay execution for specified milliseconds", "time")
    }
}
