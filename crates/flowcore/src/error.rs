use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure raised by a node capability.
///
/// The executor converts every one of these into a failed `NodeResult`;
/// they never escape a run.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Engine-level errors surfaced synchronously to callers of the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Invalid workflow: {0}")]
    Validation(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Workflow '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),
}

impl WorkflowError {
    /// True for every failure that rejects a definition at load time.
    pub fn is_validation(&self) -> bool {
        matches!(self, WorkflowError::Validation(_) | WorkflowError::UnknownNodeType(_))
    }
}
