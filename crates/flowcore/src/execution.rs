use crate::{NodeId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub type ExecutionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Error,
}

impl ExecutionStatus {
    pub fn is_finished(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

/// Outcome of a single node within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub node_id: NodeId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl NodeResult {
    pub fn success(node_id: impl Into<NodeId>, data: Value) -> Self {
        Self {
            node_id: node_id.into(),
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(node_id: impl Into<NodeId>, error: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// State of one run of a workflow, as returned by status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub results: HashMap<NodeId, NodeResult>,
    pub errors: Vec<String>,
}

impl ExecutionRecord {
    pub fn new(id: impl Into<ExecutionId>, workflow_id: impl Into<WorkflowId>) -> Self {
        Self {
            id: id.into(),
            workflow_id: workflow_id.into(),
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            results: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// Store a node outcome. Only the first failure of the run is copied
    /// into `errors`.
    pub fn record(&mut self, result: NodeResult) {
        if !result.success && self.errors.is_empty() {
            if let Some(error) = &result.error {
                self.errors.push(format!("Node {} failed: {}", result.node_id, error));
            }
        }
        self.results.insert(result.node_id.clone(), result);
    }

    pub fn complete(&mut self) {
        self.finish(ExecutionStatus::Completed);
    }

    /// Mark the whole run as faulted
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.status.is_finished() {
            return;
        }
        self.errors.push(message.into());
        self.finish(ExecutionStatus::Error);
    }

    pub fn result(&self, node_id: &str) -> Option<&NodeResult> {
        self.results.get(node_id)
    }

    fn finish(&mut self, status: ExecutionStatus) {
        if self.status.is_finished() {
            return;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_first_node_failure_is_listed() {
        let mut record = ExecutionRecord::new("wf_1", "wf");
        record.record(NodeResult::failure("a", "boom"));
        record.record(NodeResult::failure("b", "bang"));
        assert_eq!(record.errors, vec!["Node a failed: boom".to_string()]);
        assert_eq!(record.results.len(), 2);
    }

    #[test]
    fn finished_record_is_not_reopened() {
        let mut record = ExecutionRecord::new("wf_1", "wf");
        record.complete();
        let completed_at = record.completed_at;
        record.fail("late");
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.completed_at, completed_at);
    }

    #[test]
    fn node_result_document_shape() {
        let doc = serde_json::to_value(NodeResult::success("t", json!({"y": 2}))).unwrap();
        assert_eq!(doc["node_id"], "t");
        assert_eq!(doc["success"], true);
        assert_eq!(doc["data"], json!({"y": 2}));
        assert!(doc.get("error").is_none());
        assert!(doc["timestamp"].is_string());

        let record = serde_json::to_value(ExecutionRecord::new("x", "wf")).unwrap();
        assert_eq!(record["status"], "running");
    }
}
