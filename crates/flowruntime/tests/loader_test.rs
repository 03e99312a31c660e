// crates/flowruntime/tests/loader_test.rs

use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, Value, WorkflowError};
use flowruntime::{NodeRegistry, RuntimeConfig, WorkflowEngine};
use serde_json::json;
use tempfile::tempdir;

struct PassThrough;

#[async_trait]
impl Node for PassThrough {
    fn node_type(&self) -> &str {
        "trigger"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        Ok(ctx.input)
    }
}

fn engine() -> WorkflowEngine {
    let mut registry = NodeRegistry::new();
    registry.register_fn("trigger", |_| Ok(Box::new(PassThrough) as Box<dyn Node>));
    WorkflowEngine::with_registry(registry, RuntimeConfig::default())
}

fn valid_definition() -> Value {
    json!({
        "name": "From disk",
        "nodes": [{"id": "start", "name": "Start", "type": "trigger", "parameters": {}}],
        "connections": {}
    })
}

#[tokio::test]
async fn test_load_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("disk.json");
    std::fs::write(&path, valid_definition().to_string()).unwrap();

    let engine = engine();
    engine.load_from_file("disk", &path).await.unwrap();

    let workflow = engine.get_workflow("disk").await.unwrap();
    assert_eq!(workflow.name, "From disk");
    assert_eq!(workflow.nodes[0].id, "start");
}

#[tokio::test]
async fn test_unreadable_or_unparsable_file_is_a_validation_error() {
    let dir = tempdir().unwrap();
    let engine = engine();

    let missing = engine
        .load_from_file("missing", dir.path().join("nope.json"))
        .await
        .unwrap_err();
    assert!(matches!(missing, WorkflowError::Validation(_)));

    let garbage = dir.path().join("garbage.json");
    std::fs::write(&garbage, "{\"nodes\": [").unwrap();
    let parse = engine.load_from_file("garbage", &garbage).await.unwrap_err();
    assert!(matches!(parse, WorkflowError::Validation(_)));

    assert!(engine.list().await.is_empty());
}

#[tokio::test]
async fn test_load_dir_skips_invalid_files() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("alpha.json"), valid_definition().to_string()).unwrap();
    std::fs::write(dir.path().join("beta.json"), valid_definition().to_string()).unwrap();
    std::fs::write(
        dir.path().join("broken.json"),
        json!({"nodes": [{"id": "x", "type": "unknown"}], "connections": {}}).to_string(),
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let engine = engine();
    let loaded = engine.load_dir(dir.path()).await.unwrap();

    assert_eq!(loaded, vec!["alpha".to_string(), "beta".to_string()]);
    assert_eq!(engine.list().await, loaded);
}
