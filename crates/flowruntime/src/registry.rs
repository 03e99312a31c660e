use flowcore::{FlowError, Node, NodeError, NodeSpec, WorkflowError};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory trait for creating node instances
pub trait NodeFactory: Send + Sync {
    /// Create a fresh instance bound to the given node spec
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError>;

    /// Get node type identifier
    fn node_type(&self) -> &str;

    /// Optional: Get node metadata (description, category)
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }
}

/// Metadata about a node type
#[derive(Debug, Clone)]
pub struct NodeMetadata {
    pub description: String,
    pub category: String,
}

impl NodeMetadata {
    pub fn new(description: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            category: category.into(),
        }
    }
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}

/// Factory backed by a plain constructor function
pub struct FnFactory<F> {
    node_type: String,
    constructor: F,
}

impl<F> FnFactory<F>
where
    F: Fn(&NodeSpec) -> Result<Box<dyn Node>, NodeError> + Send + Sync,
{
    pub fn new(node_type: impl Into<String>, constructor: F) -> Self {
        Self {
            node_type: node_type.into(),
            constructor,
        }
    }
}

impl<F> NodeFactory for FnFactory<F>
where
    F: Fn(&NodeSpec) -> Result<Box<dyn Node>, NodeError> + Send + Sync,
{
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        (self.constructor)(spec)
    }

    fn node_type(&self) -> &str {
        &self.node_type
    }
}

/// Registry of available node types
pub struct NodeRegistry {
    factories: HashMap<String, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a node factory under its own type tag
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        let node_type = factory.node_type().to_string();
        self.register_as(node_type, factory);
    }

    /// Register a factory under an explicit tag; a later registration for
    /// the same tag replaces the earlier one
    pub fn register_as(&mut self, node_type: impl Into<String>, factory: Arc<dyn NodeFactory>) {
        let node_type = node_type.into();
        tracing::info!("Registering node type: {}", node_type);
        if self.factories.insert(node_type.clone(), factory).is_some() {
            tracing::debug!("Node type {} was already registered, replaced", node_type);
        }
    }

    /// Register a constructor function as a node type
    pub fn register_fn<F>(&mut self, node_type: impl Into<String>, constructor: F)
    where
        F: Fn(&NodeSpec) -> Result<Box<dyn Node>, NodeError> + Send + Sync + 'static,
    {
        let node_type = node_type.into();
        let factory = Arc::new(FnFactory::new(node_type.clone(), constructor));
        self.register_as(node_type, factory);
    }

    /// Look up the factory for a type tag
    pub fn resolve(&self, node_type: &str) -> Result<Arc<dyn NodeFactory>, WorkflowError> {
        self.factories
            .get(node_type)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownNodeType(node_type.to_string()))
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    /// Create a node instance for the given spec
    pub fn create_node(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, FlowError> {
        let factory = self.resolve(&spec.node_type)?;
        Ok(factory.create(spec)?)
    }

    /// Get all registered node types, sorted
    pub fn list_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Get metadata for a node type
    pub fn get_metadata(&self, node_type: &str) -> Option<NodeMetadata> {
        self.factories.get(node_type).map(|f| f.metadata())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowcore::{NodeContext, Value};

    struct Constant(&'static str);

    #[async_trait]
    impl Node for Constant {
        fn node_type(&self) -> &str {
            "constant"
        }

        async fn execute(&self, _ctx: NodeContext) -> Result<Value, NodeError> {
            Ok(Value::String(self.0.to_string()))
        }
    }

    #[test]
    fn unknown_type_fails_to_resolve() {
        let registry = NodeRegistry::new();
        assert_eq!(
            registry.resolve("nope").err(),
            Some(WorkflowError::UnknownNodeType("nope".to_string()))
        );
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let mut registry = NodeRegistry::new();
        registry.register_fn("constant", |_| Ok(Box::new(Constant("first")) as Box<dyn Node>));
        registry.register_fn("constant", |_| Ok(Box::new(Constant("second")) as Box<dyn Node>));

        let spec = NodeSpec::new("c", "constant");
        let node = registry.create_node(&spec).unwrap();
        let ctx = NodeContext::new("exec", std::sync::Arc::new(spec), Value::Null);
        assert_eq!(node.execute(ctx).await.unwrap(), Value::String("second".into()));
        assert_eq!(registry.list_node_types(), vec!["constant".to_string()]);
    }
}
