use flowcore::{ExecutionId, ExecutionRecord, NodeResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// In-memory table of execution records, shared between the engine and its runs
#[derive(Clone, Default)]
pub struct ExecutionStore {
    records: Arc<RwLock<HashMap<ExecutionId, ExecutionRecord>>>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: ExecutionRecord) {
        self.records.write().await.insert(record.id.clone(), record);
    }

    pub async fn get(&self, execution_id: &str) -> Option<ExecutionRecord> {
        self.records.read().await.get(execution_id).cloned()
    }

    pub async fn contains(&self, execution_id: &str) -> bool {
        self.records.read().await.contains_key(execution_id)
    }

    /// Append a node outcome unless its run has been stopped; returns whether
    /// it was recorded
    pub async fn record_result(
        &self,
        execution_id: &str,
        result: NodeResult,
        cancellation: &CancellationToken,
    ) -> bool {
        let mut records = self.records.write().await;
        if cancellation.is_cancelled() {
            return false;
        }
        match records.get_mut(execution_id) {
            Some(record) => {
                record.record(result);
                true
            }
            None => {
                tracing::warn!("Execution {} not found in store", execution_id);
                false
            }
        }
    }

    pub async fn complete(&self, execution_id: &str) {
        self.update(execution_id, ExecutionRecord::complete).await;
    }

    pub async fn fail(&self, execution_id: &str, message: impl Into<String>) {
        let message = message.into();
        self.update(execution_id, |record| record.fail(message)).await;
    }

    /// Apply `f` to the record if it exists; returns whether it did
    pub async fn update<F>(&self, execution_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut ExecutionRecord),
    {
        match self.records.write().await.get_mut(execution_id) {
            Some(record) => {
                f(record);
                true
            }
            None => {
                tracing::warn!("Execution {} not found in store", execution_id);
                false
            }
        }
    }
}
