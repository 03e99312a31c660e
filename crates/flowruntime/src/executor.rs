use crate::registry::NodeRegistry;
use crate::store::ExecutionStore;
use flowcore::{
    CredentialProvider, FlowError, NodeContext, NodeError, NodeId, NodeResult, NodeSpec, Value,
    WorkflowDefinition,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

/// Node type designated as a graph entry point
pub const DEFAULT_ENTRY_NODE_TYPE: &str = "trigger";

/// Per-run handles the executor writes through
#[derive(Clone)]
pub struct RunContext {
    pub execution_id: String,
    pub store: ExecutionStore,
    pub credentials: Option<Arc<dyn CredentialProvider>>,
    pub cancellation: CancellationToken,
}

/// Walks a workflow graph breadth-first, executing one node at a time
pub struct WorkflowExecutor {
    entry_node_type: String,
}

impl WorkflowExecutor {
    pub fn new(entry_node_type: impl Into<String>) -> Self {
        Self {
            entry_node_type: entry_node_type.into(),
        }
    }

    /// Execute a workflow run to completion, writing every node outcome to the store.
    ///
    /// Entry nodes run first in declaration order with `initial`. Successors are
    /// then reached FIFO along connections; a node already executed in this run
    /// is never executed again, so a shared successor is fed by whichever
    /// branch arrives first. Failed nodes end their branch.
    pub async fn run(
        &self,
        workflow: &WorkflowDefinition,
        registry: &RwLock<NodeRegistry>,
        run: &RunContext,
        initial: Value,
    ) -> Result<(), FlowError> {
        let start_time = Instant::now();
        tracing::info!(
            "Starting execution {} of workflow '{}'",
            run.execution_id,
            workflow.name
        );

        let mut executed: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<(NodeId, Value)> = VecDeque::new();

        for entry in workflow.entry_nodes(&self.entry_node_type) {
            executed.insert(entry.id.clone());
            if let Some(output) = self.execute_node(entry, initial.clone(), registry, run).await {
                queue.push_back((entry.id.clone(), output));
            }
        }

        let mut visited: HashSet<NodeId> = HashSet::new();
        while let Some((node_id, payload)) = queue.pop_front() {
            if !visited.insert(node_id.clone()) {
                continue;
            }

            for successor_id in workflow.successors(&node_id) {
                if visited.contains(successor_id) || executed.contains(successor_id) {
                    continue;
                }
                let Some(spec) = workflow.find_node(successor_id) else {
                    tracing::debug!(
                        "Skipping undeclared successor {} of node {}",
                        successor_id,
                        node_id
                    );
                    continue;
                };

                executed.insert(successor_id.clone());
                if let Some(output) = self.execute_node(spec, payload.clone(), registry, run).await
                {
                    queue.push_back((successor_id.clone(), output));
                }
            }
        }

        tracing::info!(
            "Execution {} finished: {} nodes executed in {}ms",
            run.execution_id,
            executed.len(),
            start_time.elapsed().as_millis()
        );
        Ok(())
    }

    /// Execute a single node, record its outcome, and return its output on success.
    ///
    /// The node runs in its own task so a panic becomes that node's failure.
    /// Once the run is cancelled the node is abandoned and nothing is recorded.
    async fn execute_node(
        &self,
        spec: &NodeSpec,
        input: Value,
        registry: &RwLock<NodeRegistry>,
        run: &RunContext,
    ) -> Option<Value> {
        tracing::info!("Executing node: {} (type: {})", spec.id, spec.node_type);
        let start = Instant::now();

        let created = registry.read().await.create_node(spec);
        let outcome = match created {
            Ok(node) => {
                let ctx = NodeContext::new(run.execution_id.clone(), Arc::new(spec.clone()), input)
                    .with_credentials(run.credentials.clone())
                    .with_cancellation(run.cancellation.clone());
                let task = AbortOnDropHandle::new(tokio::spawn(async move { node.execute(ctx).await }));

                tokio::select! {
                    biased;
                    _ = run.cancellation.cancelled() => None,
                    joined = task => Some(match joined {
                        Ok(result) => result.map_err(FlowError::from),
                        Err(e) => Err(FlowError::from(NodeError::ExecutionFailed(format!(
                            "Node task failed: {}",
                            e
                        )))),
                    }),
                }
            }
            Err(e) => Some(Err(e)),
        };

        let Some(outcome) = outcome else {
            tracing::info!("Node {} abandoned, execution {} was stopped", spec.id, run.execution_id);
            return None;
        };

        let (result, output) = match outcome {
            Ok(output) => {
                tracing::info!(
                    "Node {} completed in {}ms",
                    spec.id,
                    start.elapsed().as_millis()
                );
                (NodeResult::success(&spec.id, output.clone()), Some(output))
            }
            Err(e) => {
                tracing::error!("Error executing node {}: {}", spec.id, e);
                (NodeResult::failure(&spec.id, e.to_string()), None)
            }
        };

        if !run
            .store
            .record_result(&run.execution_id, result, &run.cancellation)
            .await
        {
            return None;
        }
        output
    }
}

impl Default for WorkflowExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRY_NODE_TYPE)
    }
}
