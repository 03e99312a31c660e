use crate::WorkflowError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

pub type WorkflowId = String;
pub type NodeId = String;

/// A loaded workflow graph: declared nodes plus their adjacency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<NodeSpec>,
    pub connections: BTreeMap<NodeId, Vec<NodeId>>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            connections: BTreeMap::new(),
        }
    }

    /// Parse and structurally validate a raw definition document.
    ///
    /// Node types are not checked here; resolving them needs a registry.
    pub fn from_value(document: Value) -> Result<Self, WorkflowError> {
        let root = document
            .as_object()
            .ok_or_else(|| invalid("Workflow definition must be a JSON object"))?;

        let nodes = match root.get("nodes") {
            Some(Value::Array(nodes)) => nodes,
            Some(_) => return Err(invalid("'nodes' must be an array")),
            None => return Err(invalid("Workflow must have 'nodes' array")),
        };
        let connections = match root.get("connections") {
            Some(Value::Object(connections)) => connections,
            Some(_) => return Err(invalid("'connections' must be an object")),
            None => return Err(invalid("Workflow must have 'connections' object")),
        };

        let mut definition = WorkflowDefinition::new(
            root.get("name").and_then(Value::as_str).unwrap_or_default(),
        );

        for raw in nodes {
            definition.nodes.push(NodeSpec::from_value(raw)?);
        }

        for (from, targets) in connections {
            let targets = targets
                .as_array()
                .ok_or_else(|| invalid(format!("Connections of '{}' must be an array", from)))?;
            let targets = targets
                .iter()
                .map(|t| {
                    t.as_str().map(str::to_string).ok_or_else(|| {
                        invalid(format!("Connections of '{}' must be node id strings", from))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            definition.connections.insert(from.clone(), targets);
        }

        definition.check_unique_ids()?;
        Ok(definition)
    }

    /// Reject duplicate node ids.
    pub fn check_unique_ids(&self) -> Result<(), WorkflowError> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(invalid(format!("Duplicate node id: {}", node.id)));
            }
        }
        Ok(())
    }

    pub fn add_node(&mut self, node: NodeSpec) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Append `to` to the ordered successors of `from`.
    pub fn connect(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) {
        self.connections.entry(from.into()).or_default().push(to.into());
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Successors of `id` in declared order.
    pub fn successors(&self, id: &str) -> &[NodeId] {
        self.connections.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes of the entry type in declaration order, or the first declared
    /// node when there are none.
    pub fn entry_nodes(&self, entry_type: &str) -> Vec<&NodeSpec> {
        let entries: Vec<&NodeSpec> = self
            .nodes
            .iter()
            .filter(|n| n.node_type == entry_type)
            .collect();

        if entries.is_empty() {
            self.nodes.first().into_iter().collect()
        } else {
            entries
        }
    }

    /// `(from, to)` pairs of connections naming an undeclared node on either end.
    pub fn dangling_connections(&self) -> Vec<(NodeId, NodeId)> {
        let declared: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.connections
            .iter()
            .flat_map(|(from, targets)| targets.iter().map(move |to| (from, to)))
            .filter(|(from, to)| {
                !declared.contains(from.as_str()) || !declared.contains(to.as_str())
            })
            .map(|(from, to)| (from.clone(), to.clone()))
            .collect()
    }
}

/// A single vertex of a workflow graph as declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl NodeSpec {
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            node_type: node_type.into(),
            parameters: Map::new(),
        }
    }

    fn from_value(raw: &Value) -> Result<Self, WorkflowError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| invalid("Each node must be a JSON object"))?;
        let id = obj.get("id").and_then(Value::as_str);
        let label = id.unwrap_or("unknown");

        let node_type = match obj.get("type") {
            Some(Value::String(t)) => t.clone(),
            Some(_) => return Err(invalid(format!("Node {} has a non-string 'type'", label))),
            None => return Err(invalid(format!("Node {} missing 'type'", label))),
        };
        let id = id.ok_or_else(|| invalid("Node missing 'id'"))?.to_string();

        let parameters = match obj.get("parameters") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(p)) => p.clone(),
            Some(_) => return Err(invalid(format!("Parameters of node {} must be an object", id))),
        };

        Ok(Self {
            name: obj
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| id.clone()),
            id,
            node_type,
            parameters,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

fn invalid(message: impl Into<String>) -> WorkflowError {
    WorkflowError::Validation(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_sections_are_rejected() {
        let no_nodes = WorkflowDefinition::from_value(json!({"connections": {}}));
        assert!(matches!(no_nodes, Err(WorkflowError::Validation(_))));

        let no_connections = WorkflowDefinition::from_value(json!({"nodes": []}));
        assert!(matches!(no_connections, Err(WorkflowError::Validation(_))));
    }

    #[test]
    fn empty_graph_is_legal() {
        let def = WorkflowDefinition::from_value(json!({"nodes": [], "connections": {}})).unwrap();
        assert!(def.nodes.is_empty());
        assert!(def.entry_nodes("trigger").is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = WorkflowDefinition::from_value(json!({
            "nodes": [{"id": "a", "type": "x"}, {"id": "a", "type": "y"}],
            "connections": {}
        }));
        assert!(matches!(result, Err(WorkflowError::Validation(_))));
    }

    #[test]
    fn entry_nodes_fall_back_to_first_declared() {
        let mut def = WorkflowDefinition::new("wf");
        def.add_node(NodeSpec::new("a", "transform"));
        def.add_node(NodeSpec::new("b", "transform"));
        let entries: Vec<_> = def.entry_nodes("trigger").iter().map(|n| n.id.clone()).collect();
        assert_eq!(entries, vec!["a"]);

        def.add_node(NodeSpec::new("t1", "trigger"));
        def.add_node(NodeSpec::new("t2", "trigger"));
        let entries: Vec<_> = def.entry_nodes("trigger").iter().map(|n| n.id.clone()).collect();
        assert_eq!(entries, vec!["t1", "t2"]);
    }

    #[test]
    fn dangling_connections_are_reported() {
        let def = WorkflowDefinition::from_value(json!({
            "nodes": [{"id": "a", "type": "x"}],
            "connections": {"a": ["ghost"]}
        }))
        .unwrap();
        assert_eq!(def.dangling_connections(), vec![("a".to_string(), "ghost".to_string())]);
        assert_eq!(def.successors("a"), ["ghost".to_string()]);
    }

    #[test]
    fn name_defaults_to_id() {
        let def = WorkflowDefinition::from_value(json!({
            "nodes": [{"id": "a", "type": "x", "parameters": {"k": 1}}],
            "connections": {}
        }))
        .unwrap();
        assert_eq!(def.nodes[0].name, "a");
        assert_eq!(def.nodes[0].parameters["k"], json!(1));
    }
}
