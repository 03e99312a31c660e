// crates/flowcli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flowcore::{ExecutionStatus, NodeSpec, Value, WorkflowDefinition};
use flownodes::NodeDefaults;
use flowruntime::{loader, ConfigManager, NodeRegistry, RuntimeConfig, WorkflowEngine};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Workflow engine CLI", long_about = None)]
struct Cli {
    /// Settings file (defaults to $FLOW_CONFIG or ./workflow_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file and print its execution record
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Workflow id (defaults to the file stem)
        #[arg(long)]
        id: Option<String>,

        /// Initial data as JSON
        #[arg(short, long)]
        data: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Load every workflow in a directory and list the ones that validate
    List {
        #[arg(short, long, default_value = "./workflows")]
        dir: PathBuf,
    },

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    init_tracing(verbose);

    let config = Arc::new(match &cli.config {
        Some(path) => ConfigManager::load(path),
        None => ConfigManager::from_default_location(),
    });

    match cli.command {
        Commands::Run { file, id, data, .. } => run_workflow(&config, &file, id, data).await,
        Commands::Validate { file } => validate_workflow(&config, &file).await,
        Commands::Nodes => list_nodes(&config).await,
        Commands::List { dir } => list_workflows(&config, &dir).await,
        Commands::Init { output } => create_example_workflow(&output),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_engine(config: &Arc<ConfigManager>) -> WorkflowEngine {
    let mut registry = NodeRegistry::new();
    flownodes::register_with(&mut registry, NodeDefaults::from(config.as_ref()));
    WorkflowEngine::with_registry(registry, RuntimeConfig::default()).with_credentials(config.clone())
}

async fn run_workflow(
    config: &Arc<ConfigManager>,
    file: &Path,
    id: Option<String>,
    data: Option<String>,
) -> Result<()> {
    let workflow_id = match id.or_else(|| loader::workflow_id_for(file)) {
        Some(id) => id,
        None => bail!("Cannot derive a workflow id from {}", file.display()),
    };

    let initial: Value = match data {
        Some(raw) => serde_json::from_str(&raw).context("--data must be valid JSON")?,
        None => json!({}),
    };

    let engine = build_engine(config);
    eprintln!("🚀 Loading workflow from: {}", file.display());
    engine.load_from_file(&workflow_id, file).await?;

    let execution_id = engine.execute(&workflow_id, initial).await?;
    eprintln!("▶️  Execution {} started", execution_id);

    let record = engine.wait(&execution_id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);

    match record.status {
        ExecutionStatus::Completed if record.errors.is_empty() => {
            eprintln!("✨ Workflow completed ({} nodes)", record.results.len());
        }
        ExecutionStatus::Completed => {
            eprintln!("⚠️  Workflow completed with errors:");
            for error in &record.errors {
                eprintln!("   {}", error);
            }
        }
        _ => bail!("Workflow ended with status {:?}: {:?}", record.status, record.errors),
    }

    Ok(())
}

async fn validate_workflow(config: &Arc<ConfigManager>, file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow_id = loader::workflow_id_for(file).unwrap_or_else(|| "workflow".to_string());
    let engine = build_engine(config);
    engine.load_from_file(&workflow_id, file).await?;

    let Some(workflow) = engine.get_workflow(&workflow_id).await else {
        bail!("Workflow '{}' vanished after loading", workflow_id);
    };

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!(
        "   Connections: {}",
        workflow.connections.values().map(Vec::len).sum::<usize>()
    );
    for (from, to) in workflow.dangling_connections() {
        println!("   ⚠️  {} -> {} points at an undeclared node", from, to);
    }

    Ok(())
}

async fn list_nodes(config: &Arc<ConfigManager>) -> Result<()> {
    println!("📦 Available Node Types:");
    println!();

    for (node_type, metadata) in build_engine(config).node_types().await {
        println!("  • {} ({})", node_type, metadata.category);
        println!("    {}", metadata.description);
    }

    Ok(())
}

async fn list_workflows(config: &Arc<ConfigManager>, dir: &Path) -> Result<()> {
    let engine = build_engine(config);
    let loaded = engine
        .load_dir(dir)
        .await
        .with_context(|| format!("Cannot read workflow directory {}", dir.display()))?;

    println!("📋 Workflows in {}:", dir.display());
    for workflow_id in loaded {
        let name = engine
            .get_workflow(&workflow_id)
            .await
            .map(|w| w.name.clone())
            .unwrap_or_default();
        println!("  • {} {}", workflow_id, name);
    }

    Ok(())
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let mut workflow = WorkflowDefinition::new("Example HTTP Workflow");

    let trigger = workflow.add_node(NodeSpec::new("start", "trigger").with_name("Manual Start"));
    let fetch = workflow.add_node(
        NodeSpec::new("fetch", "http")
            .with_name("Fetch Data")
            .with_parameter("method", "GET"),
    );
    let log = workflow.add_node(NodeSpec::new("log", "debug").with_name("Log Response"));

    workflow.connect(trigger, fetch.clone());
    workflow.connect(fetch, log);

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  flow run --file {} --data '{{\"url\": \"https://api.github.com/zen\"}}'",
        output.display()
    );

    Ok(())
}
