use flowcore::{FlowError, Value, WorkflowError};
use std::path::{Path, PathBuf};

/// Read a workflow definition document from disk.
///
/// I/O and parse failures are reported as validation errors, the same as a
/// malformed definition.
pub async fn read_definition(path: &Path) -> Result<Value, WorkflowError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        WorkflowError::Validation(format!("Cannot read {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&raw).map_err(|e| {
        WorkflowError::Validation(format!("Cannot parse {}: {}", path.display(), e))
    })
}

/// All `*.json` files directly inside `dir`, sorted by path
pub async fn definition_files(dir: &Path) -> Result<Vec<PathBuf>, FlowError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && path.extension() == Some("json".as_ref()) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Workflow id derived from a definition file name
pub fn workflow_id_for(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}
