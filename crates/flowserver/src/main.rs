use actix_cors::Cors;
use actix_web::{get, post, put, web, App, HttpResponse, HttpServer, Responder};
use flowcore::{Value, WorkflowError};
use flownodes::NodeDefaults;
use flowruntime::{ConfigManager, NodeRegistry, RuntimeConfig, WorkflowEngine};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
struct AppState {
    engine: WorkflowEngine,
}

/// Response for workflow execution
#[derive(Debug, Serialize)]
struct ExecutionResponse {
    execution_id: String,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(err: &WorkflowError) -> HttpResponse {
    let body = ErrorResponse {
        error: err.to_string(),
    };
    match err {
        WorkflowError::NotFound(_) | WorkflowError::ExecutionNotFound(_) => {
            HttpResponse::NotFound().json(body)
        }
        WorkflowError::AlreadyRunning(_) => HttpResponse::Conflict().json(body),
        WorkflowError::Validation(_) | WorkflowError::UnknownNodeType(_) => {
            HttpResponse::BadRequest().json(body)
        }
    }
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "flowserver"
    }))
}

/// List all workflows
#[get("/api/workflows")]
async fn list_workflows(data: web::Data<AppState>) -> impl Responder {
    let mut workflow_list = Vec::new();
    for workflow_id in data.engine.list().await {
        if let Some(workflow) = data.engine.get_workflow(&workflow_id).await {
            workflow_list.push(json!({
                "id": workflow_id,
                "name": workflow.name,
                "nodes": workflow.nodes.len(),
                "running": data.engine.is_running(&workflow_id).await,
            }));
        }
    }

    HttpResponse::Ok().json(workflow_list)
}

/// Load or replace a workflow definition
#[put("/api/workflows/{id}")]
async fn put_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
    definition: web::Json<Value>,
) -> impl Responder {
    let workflow_id = path.into_inner();

    match data.engine.load(&workflow_id, definition.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "id": workflow_id,
            "message": "Workflow loaded successfully"
        })),
        Err(e) => error_response(&e),
    }
}

/// Get a specific workflow
#[get("/api/workflows/{id}")]
async fn get_workflow(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let workflow_id = path.into_inner();

    match data.engine.get_workflow(&workflow_id).await {
        Some(workflow) => HttpResponse::Ok().json(workflow.as_ref()),
        None => error_response(&WorkflowError::NotFound(workflow_id)),
    }
}

/// Start a run; the optional body is the initial data
#[post("/api/workflows/{id}/execute")]
async fn execute_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> impl Responder {
    let workflow_id = path.into_inner();

    let initial = if body.is_empty() {
        json!({})
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                return HttpResponse::BadRequest().json(ErrorResponse {
                    error: format!("Invalid JSON body: {}", e),
                });
            }
        }
    };

    match data.engine.execute(&workflow_id, initial).await {
        Ok(execution_id) => {
            info!("Workflow {} started as {}", workflow_id, execution_id);
            HttpResponse::Accepted().json(ExecutionResponse { execution_id })
        }
        Err(e) => {
            error!("Workflow {} could not start: {}", workflow_id, e);
            error_response(&e)
        }
    }
}

/// Stop the in-flight run of a workflow
#[post("/api/workflows/{id}/stop")]
async fn stop_workflow(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let stopped = data.engine.stop(&path.into_inner()).await;
    HttpResponse::Ok().json(json!({ "stopped": stopped }))
}

#[get("/api/executions/{id}")]
async fn get_execution(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match data.engine.get_execution(&path.into_inner()).await {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(e) => error_response(&e),
    }
}

/// List available node types
#[get("/api/nodes")]
async fn list_node_types(data: web::Data<AppState>) -> impl Responder {
    let nodes: Vec<_> = data
        .engine
        .node_types()
        .await
        .into_iter()
        .map(|(node_type, metadata)| {
            json!({
                "type": node_type,
                "description": metadata.description,
                "category": metadata.category,
            })
        })
        .collect();

    HttpResponse::Ok().json(nodes)
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(list_workflows)
        .service(put_workflow)
        .service(get_workflow)
        .service(execute_workflow)
        .service(stop_workflow)
        .service(get_execution)
        .service(list_node_types);
}

fn build_engine(config: Arc<ConfigManager>) -> WorkflowEngine {
    let mut registry = NodeRegistry::new();
    flownodes::register_with(&mut registry, NodeDefaults::from(config.as_ref()));
    WorkflowEngine::with_registry(registry, RuntimeConfig::default()).with_credentials(config)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚀 Starting workflow server");

    let config = Arc::new(ConfigManager::from_default_location());
    info!("Using settings from {}", config.path().display());

    let app_state = web::Data::new(AppState {
        engine: build_engine(config),
    });

    info!("✅ Engine initialized with standard nodes");

    let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    info!("🌐 Server starting on http://{}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .configure(routes)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};

    fn test_state() -> web::Data<AppState> {
        let mut registry = NodeRegistry::new();
        flownodes::register_all(&mut registry);
        web::Data::new(AppState {
            engine: WorkflowEngine::with_registry(registry, RuntimeConfig::default()),
        })
    }

    fn merge_workflow() -> Value {
        json!({
            "name": "Merge",
            "nodes": [
                {"id": "T", "type": "trigger"},
                {"id": "M", "type": "transform",
                 "parameters": {"operation": "merge", "merge_data": {"x": 1}}}
            ],
            "connections": {"T": ["M"]}
        })
    }

    #[actix_web::test]
    async fn test_load_execute_and_fetch_record() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

        let req = test::TestRequest::put()
            .uri("/api/workflows/merge")
            .set_json(merge_workflow())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/api/workflows/merge/execute")
            .set_json(json!({"y": 2}))
            .to_request();
        let started: Value = test::call_and_read_body_json(&app, req).await;
        let execution_id = started["execution_id"].as_str().unwrap().to_string();

        state.engine.wait(&execution_id).await.unwrap();

        let req = test::TestRequest::get()
            .uri(&format!("/api/executions/{}", execution_id))
            .to_request();
        let record: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(record["status"], json!("completed"));
        assert_eq!(record["results"]["M"]["data"], json!({"y": 2, "x": 1}));
    }

    #[actix_web::test]
    async fn test_error_statuses() {
        let app = test::init_service(App::new().app_data(test_state()).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/workflows/missing/execute")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::put()
            .uri("/api/workflows/bad")
            .set_json(json!({"nodes": []}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/executions/nope").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post().uri("/api/workflows/idle/stop").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({"stopped": false}));
    }

    #[actix_web::test]
    async fn test_second_execute_conflicts_while_running() {
        let state = test_state();
        let app = test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

        let slow = json!({
            "name": "Slow",
            "nodes": [{"id": "wait", "type": "delay", "parameters": {"delay_ms": 2000}}],
            "connections": {}
        });
        state.engine.load("slow", slow).await.unwrap();

        let req = test::TestRequest::post().uri("/api/workflows/slow/execute").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::ACCEPTED);

        let req = test::TestRequest::post().uri("/api/workflows/slow/execute").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post().uri("/api/workflows/slow/stop").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({"stopped": true}));
    }
}
