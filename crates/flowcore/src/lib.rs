//! Core abstractions for the flow engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on. It has no runtime dependencies.

mod credentials;
mod error;
mod execution;
mod node;
mod value;
mod workflow;

pub use credentials::{CredentialProvider, StaticCredentials};
pub use error::{FlowError, NodeError, WorkflowError};
pub use execution::{ExecutionId, ExecutionRecord, ExecutionStatus, NodeResult};
pub use node::{Node, NodeContext};
pub use serde_json::Value;
pub use value::ValueExt;
pub use workflow::{NodeId, NodeSpec, WorkflowDefinition, WorkflowId};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
