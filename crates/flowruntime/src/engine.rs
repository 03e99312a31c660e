use crate::config::RuntimeConfig;
use crate::executor::{RunContext, WorkflowExecutor};
use crate::loader;
use crate::registry::{NodeFactory, NodeMetadata, NodeRegistry};
use crate::store::ExecutionStore;
use chrono::Local;
use flowcore::{
    CredentialProvider, ExecutionId, ExecutionRecord, FlowError, Value, WorkflowDefinition,
    WorkflowError, WorkflowId,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Tracking entry for a run that is still in flight
struct RunHandle {
    execution_id: ExecutionId,
    cancellation: CancellationToken,
}

type RunTable = Arc<Mutex<HashMap<WorkflowId, RunHandle>>>;

/// Loads workflow definitions, runs them in the background and tracks their state
pub struct WorkflowEngine {
    registry: Arc<RwLock<NodeRegistry>>,
    executor: Arc<WorkflowExecutor>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    workflows: Arc<RwLock<HashMap<WorkflowId, Arc<WorkflowDefinition>>>>,
    executions: ExecutionStore,
    running: RunTable,
}

impl WorkflowEngine {
    /// Create an engine with an empty registry and default settings
    pub fn new() -> Self {
        Self::with_registry(NodeRegistry::new(), RuntimeConfig::default())
    }

    /// Create an engine with a pre-configured registry
    pub fn with_registry(registry: NodeRegistry, config: RuntimeConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            executor: Arc::new(WorkflowExecutor::new(config.entry_node_type)),
            credentials: None,
            workflows: Arc::new(RwLock::new(HashMap::new())),
            executions: ExecutionStore::new(),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Attach the credential collaborator handed to every node
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Register (or replace) a node type
    pub async fn register_node_type(&self, node_type: impl Into<String>, factory: Arc<dyn NodeFactory>) {
        self.registry.write().await.register_as(node_type, factory);
    }

    /// Registered node types with their metadata, sorted by tag
    pub async fn node_types(&self) -> Vec<(String, NodeMetadata)> {
        let registry = self.registry.read().await;
        registry
            .list_node_types()
            .into_iter()
            .map(|node_type| {
                let metadata = registry.get_metadata(&node_type).unwrap_or_default();
                (node_type, metadata)
            })
            .collect()
    }

    /// Validate a raw definition document and store it under `workflow_id`,
    /// replacing any previous definition
    pub async fn load(&self, workflow_id: &str, definition: Value) -> Result<(), WorkflowError> {
        let result = match WorkflowDefinition::from_value(definition) {
            Ok(parsed) => self.load_definition(workflow_id, parsed).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            tracing::error!("Error loading workflow '{}': {}", workflow_id, e);
        }
        result
    }

    /// Validate an already-parsed definition and store it
    pub async fn load_definition(
        &self,
        workflow_id: &str,
        definition: WorkflowDefinition,
    ) -> Result<(), WorkflowError> {
        definition.check_unique_ids()?;
        {
            let registry = self.registry.read().await;
            for node in &definition.nodes {
                registry.resolve(&node.node_type)?;
            }
        }

        for (from, to) in definition.dangling_connections() {
            tracing::warn!(
                "Workflow '{}' connects {} -> {} but one end is not a declared node",
                workflow_id,
                from,
                to
            );
        }

        self.workflows
            .write()
            .await
            .insert(workflow_id.to_string(), Arc::new(definition));
        tracing::info!("Workflow '{}' loaded successfully", workflow_id);
        Ok(())
    }

    /// Read a definition file and load it
    pub async fn load_from_file(
        &self,
        workflow_id: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), WorkflowError> {
        let document = match loader::read_definition(path.as_ref()).await {
            Ok(document) => document,
            Err(e) => {
                tracing::error!("Error loading workflow from file: {}", e);
                return Err(e);
            }
        };
        self.load(workflow_id, document).await
    }

    /// Load every `*.json` definition in a directory, keyed by file stem.
    /// Files that fail validation are skipped.
    pub async fn load_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<WorkflowId>, FlowError> {
        let mut loaded = Vec::new();
        for path in loader::definition_files(dir.as_ref()).await? {
            let Some(workflow_id) = loader::workflow_id_for(&path) else {
                continue;
            };
            match self.load_from_file(&workflow_id, &path).await {
                Ok(()) => loaded.push(workflow_id),
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(loaded)
    }

    /// Start a run of a loaded workflow and return its execution id immediately
    pub async fn execute(&self, workflow_id: &str, initial: Value) -> Result<ExecutionId, WorkflowError> {
        let workflow = self
            .workflows
            .read()
            .await
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;

        let mut running = self.running.lock().await;
        if running.contains_key(workflow_id) {
            return Err(WorkflowError::AlreadyRunning(workflow_id.to_string()));
        }

        let execution_id = self.next_execution_id(workflow_id).await;
        self.executions
            .insert(ExecutionRecord::new(execution_id.clone(), workflow_id))
            .await;

        let cancellation = CancellationToken::new();
        running.insert(
            workflow_id.to_string(),
            RunHandle {
                execution_id: execution_id.clone(),
                cancellation: cancellation.clone(),
            },
        );
        drop(running);

        let run = RunContext {
            execution_id: execution_id.clone(),
            store: self.executions.clone(),
            credentials: self.credentials.clone(),
            cancellation,
        };
        tokio::spawn(supervise(
            workflow_id.to_string(),
            workflow,
            Arc::clone(&self.registry),
            Arc::clone(&self.executor),
            Arc::clone(&self.running),
            run,
            initial,
        ));

        tracing::info!("Workflow '{}' execution started: {}", workflow_id, execution_id);
        Ok(execution_id)
    }

    /// Current record of an execution
    pub async fn status(&self, execution_id: &str) -> Option<ExecutionRecord> {
        self.executions.get(execution_id).await
    }

    /// Like `status`, but reports a missing execution as an error
    pub async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, WorkflowError> {
        self.status(execution_id)
            .await
            .ok_or_else(|| WorkflowError::ExecutionNotFound(execution_id.to_string()))
    }

    /// Poll until the execution leaves `running`, or until its run is no
    /// longer in flight (stopped), and return the record as it stands
    pub async fn wait(&self, execution_id: &str) -> Result<ExecutionRecord, WorkflowError> {
        loop {
            let record = self.get_execution(execution_id).await?;
            if record.status.is_finished() {
                return Ok(record);
            }

            let in_flight = self
                .running
                .lock()
                .await
                .get(&record.workflow_id)
                .map(|handle| handle.execution_id == execution_id)
                .unwrap_or(false);
            if !in_flight {
                return self.get_execution(execution_id).await;
            }

            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Cancel the in-flight run of a workflow. The execution record keeps
    /// whatever state it last reached.
    pub async fn stop(&self, workflow_id: &str) -> bool {
        match self.running.lock().await.remove(workflow_id) {
            Some(handle) => {
                handle.cancellation.cancel();
                tracing::info!(
                    "Workflow '{}' stopped (execution {})",
                    workflow_id,
                    handle.execution_id
                );
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self, workflow_id: &str) -> bool {
        self.running.lock().await.contains_key(workflow_id)
    }

    /// Ids of all loaded workflows, sorted
    pub async fn list(&self) -> Vec<WorkflowId> {
        let mut ids: Vec<WorkflowId> = self.workflows.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn get_workflow(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.read().await.get(workflow_id).cloned()
    }

    /// `<workflow>_<local timestamp>`, suffixed when already taken
    async fn next_execution_id(&self, workflow_id: &str) -> ExecutionId {
        let base = format!(
            "{}_{}",
            workflow_id,
            Local::now().format("%Y%m%d_%H%M%S_%6f")
        );
        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.executions.contains(&candidate).await {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        candidate
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive one run. The traversal runs in its own task; a fault inside it marks
/// the record as `error`, cancellation aborts it.
async fn supervise(
    workflow_id: WorkflowId,
    workflow: Arc<WorkflowDefinition>,
    registry: Arc<RwLock<NodeRegistry>>,
    executor: Arc<WorkflowExecutor>,
    running: RunTable,
    run: RunContext,
    initial: Value,
) {
    let execution_id = run.execution_id.clone();
    let store = run.store.clone();
    let cancellation = run.cancellation.clone();

    let traversal = tokio::spawn(async move {
        executor.run(&workflow, &registry, &run, initial).await
    });
    let abort = traversal.abort_handle();

    let outcome = tokio::select! {
        _ = cancellation.cancelled() => {
            abort.abort();
            tracing::info!("Execution {} cancelled", execution_id);
            None
        }
        joined = traversal => Some(match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("Execution task failed: {}", e)),
        }),
    };

    // Terminal status and slot release happen under the same lock.
    let mut running = running.lock().await;
    match outcome {
        Some(Ok(())) => store.complete(&execution_id).await,
        Some(Err(message)) => {
            tracing::error!("Error executing workflow '{}': {}", workflow_id, message);
            store.fail(&execution_id, message).await;
        }
        None => {}
    }
    let owns_slot = running
        .get(&workflow_id)
        .map(|handle| handle.execution_id == execution_id)
        .unwrap_or(false);
    if owns_slot {
        running.remove(&workflow_id);
    }
}
