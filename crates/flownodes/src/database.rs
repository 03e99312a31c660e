use async_trait::async_trait;
use chrono::Local;
use flowcore::{Node, NodeContext, NodeError, NodeSpec, Value, ValueExt};
use flowruntime::{NodeFactory, NodeMetadata};
use serde_json::json;
use std::path::{Path, PathBuf};

const UPSERT_KEYS: [&str; 3] = ["id", "video_id", "url"];

/// Flat-file record store: one JSON array per table
pub struct DatabaseNode {
    storage_path: PathBuf,
}

impl DatabaseNode {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
        }
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.storage_path.join(format!("{}.json", table))
    }
}

#[async_trait]
impl Node for DatabaseNode {
    fn node_type(&self) -> &str {
        "database"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let operation = ctx.parameter_str("operation", "read");
        let table = ctx.parameter_str("table", "default");
        let path = self.table_path(&table);

        match operation.as_str() {
            "read" => {
                let records = read_table(&path).await?;
                Ok(json!({"count": records.len(), "records": records}))
            }
            "read_one" => {
                let key = ctx.parameter_str("filter_key", "id");
                let expected = ctx.parameter_or("filter_value", Value::Null);
                let found = read_table(&path)
                    .await?
                    .into_iter()
                    .find(|r| r.field(&key) == Some(&expected));
                Ok(json!({"found": found.is_some(), "record": found}))
            }
            "write" => write_record(&self.storage_path, &path, &ctx.input).await,
            "check_exists" => {
                let key = ctx.parameter_str("check_key", "url");
                let probe = [key.as_str(), "url"]
                    .iter()
                    .find_map(|k| ctx.input.field(k).filter(|v| is_truthy(v)).cloned())
                    .unwrap_or_else(|| Value::String(ctx.input.to_plain_string()));

                let existing = read_table(&path).await?.into_iter().find(|r| {
                    r.field(&key) == Some(&probe) || r.field("url") == Some(&probe)
                });
                Ok(match existing {
                    Some(record) => json!({"exists": true, "record": record}),
                    None => json!({"exists": false}),
                })
            }
            "filter" => {
                let key = ctx.parameter_str("filter_key", "status");
                let expected = ctx.parameter_or("filter_value", json!("pending"));
                let records: Vec<Value> = read_table(&path)
                    .await?
                    .into_iter()
                    .filter(|r| r.field(&key) == Some(&expected))
                    .collect();
                Ok(json!({"count": records.len(), "records": records}))
            }
            _ => Ok(ctx.input),
        }
    }
}

/// Upsert `input.record` (or the input itself) keyed by id, video_id or url
async fn write_record(dir: &Path, path: &Path, input: &Value) -> Result<Value, NodeError> {
    let mut record = match input.field("record").unwrap_or(input) {
        Value::Object(obj) => obj.clone(),
        other => {
            return Err(NodeError::InvalidInputType {
                field: "record".to_string(),
                expected: "object".to_string(),
                actual: type_name(other).to_string(),
            });
        }
    };

    let record_id = UPSERT_KEYS
        .iter()
        .find_map(|k| record.get(*k).filter(|v| is_truthy(v)).cloned())
        .unwrap_or(Value::Null);

    let mut records = read_table(path).await?;
    let now = Value::String(Local::now().to_rfc3339());

    let existing = records.iter_mut().find(|r| {
        UPSERT_KEYS
            .iter()
            .any(|k| r.field(k) == Some(&record_id))
    });

    let updated = match existing {
        Some(slot) => {
            let mut merged = slot.merged_with(&Value::Object(record.clone()));
            merged["id"] = record_id.clone();
            merged["updated_at"] = now;
            *slot = merged;
            true
        }
        None => {
            record.insert("id".to_string(), record_id);
            record.insert("created_at".to_string(), now);
            records.push(Value::Object(record.clone()));
            false
        }
    };

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| NodeError::ExecutionFailed(format!("Cannot create storage dir: {}", e)))?;
    let contents = serde_json::to_string_pretty(&records)
        .map_err(|e| NodeError::ExecutionFailed(e.to_string()))?;
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| NodeError::ExecutionFailed(format!("Cannot write {}: {}", path.display(), e)))?;

    Ok(json!({"success": true, "record": record, "updated": updated}))
}

async fn read_table(path: &Path) -> Result<Vec<Value>, NodeError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(NodeError::ExecutionFailed(format!(
                "Cannot read {}: {}",
                path.display(),
                e
            )));
        }
    };

    serde_json::from_str(&contents).map_err(|e| {
        NodeError::ExecutionFailed(format!("Corrupt table {}: {}", path.display(), e))
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub struct DatabaseNodeFactory {
    storage_path: PathBuf,
}

impl DatabaseNodeFactory {
    pub fn new(storage_path: PathBuf) -> Self {
        Self { storage_path }
    }
}

impl NodeFactory for DatabaseNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        let storage_path = spec
            .parameters
            .get("storage_path")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.storage_path.clone());
        Ok(Box::new(DatabaseNode::new(storage_path)))
    }

    fn node_type(&self) -> &str {
        "database"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new("Read and upsert records in JSON table files", "storage")
    }
}
