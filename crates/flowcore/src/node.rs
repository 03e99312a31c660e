use crate::{CredentialProvider, NodeError, NodeSpec};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Core trait that all executable nodes implement
#[async_trait]
pub trait Node: Send + Sync {
    /// Type tag this node is registered under (e.g. "http", "transform")
    fn node_type(&self) -> &str;

    /// Execute the node against `ctx.input`, producing the payload handed to successors
    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError>;
}

/// Everything a node sees for one execution call
#[derive(Clone)]
pub struct NodeContext {
    /// Run this call belongs to
    pub execution_id: String,

    /// Declared spec of the node being executed
    pub spec: Arc<NodeSpec>,

    /// Output of the predecessor (or the run's initial data for entry nodes)
    pub input: Value,

    /// Credential collaborator, if the engine was given one
    pub credentials: Option<Arc<dyn CredentialProvider>>,

    /// Cancelled when the run is stopped
    pub cancellation: CancellationToken,
}

impl NodeContext {
    pub fn new(execution_id: impl Into<String>, spec: Arc<NodeSpec>, input: Value) -> Self {
        Self {
            execution_id: execution_id.into(),
            spec,
            input,
            credentials: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Arc<dyn CredentialProvider>>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn node_id(&self) -> &str {
        &self.spec.id
    }

    /// Declared parameter, if present
    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.spec.parameters.get(key)
    }

    /// Declared parameter or `default`
    pub fn parameter_or(&self, key: &str, default: Value) -> Value {
        self.parameter(key).cloned().unwrap_or(default)
    }

    /// String parameter or `default`; non-string values are ignored
    pub fn parameter_str(&self, key: &str, default: &str) -> String {
        self.parameter(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// Get required parameter or return error
    pub fn require_parameter(&self, key: &str) -> Result<&Value, NodeError> {
        self.parameter(key)
            .ok_or_else(|| NodeError::Configuration(format!("Missing parameter: {}", key)))
    }

    /// Credential from the injected provider, or `default` when the
    /// provider is absent or the key is unset
    pub fn credential(&self, key: &str, default: Option<&str>) -> Option<String> {
        self.credentials
            .as_ref()
            .and_then(|c| c.credential(key))
            .or_else(|| default.map(str::to_string))
    }

    /// Credential first, then a string parameter of the given name
    pub fn credential_or_parameter(&self, credential_key: &str, parameter_key: &str) -> Option<String> {
        self.credential(credential_key, None).or_else(|| {
            self.parameter(parameter_key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    }
}
