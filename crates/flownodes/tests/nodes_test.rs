// crates/flownodes/tests/nodes_test.rs

use flowcore::{Node, NodeContext, NodeError, NodeSpec, StaticCredentials, Value};
use flownodes::{
    AiNode, ConditionNode, DatabaseNode, DelayNode, HttpNode, ImageNode, TransformNode, TriggerNode,
    VoiceoverNode, YoutubeNode,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Helper function to create a test context
fn create_test_context(spec: NodeSpec, input: Value) -> NodeContext {
    NodeContext::new("test_exec", Arc::new(spec), input)
}

fn with_key(ctx: NodeContext, key: &str, value: &str) -> NodeContext {
    ctx.with_credentials(Some(Arc::new(StaticCredentials::default().with(key, value))))
}

#[tokio::test]
async fn test_trigger_event_wraps_input() {
    let spec = NodeSpec::new("t", "trigger")
        .with_parameter("trigger_type", "event")
        .with_parameter("event_name", "upload");
    let out = TriggerNode
        .execute(create_test_context(spec, json!({"file": "a.txt"})))
        .await
        .unwrap();

    assert_eq!(out["event"], json!("upload"));
    assert_eq!(out["data"], json!({"file": "a.txt"}));
    assert!(out["triggered_at"].is_string());
}

#[tokio::test]
async fn test_trigger_manual_turns_null_into_empty_object() {
    let out = TriggerNode
        .execute(create_test_context(NodeSpec::new("t", "trigger"), Value::Null))
        .await
        .unwrap();
    assert_eq!(out, json!({}));
}

#[tokio::test]
async fn test_transform_merge_and_filter() {
    let merge = NodeSpec::new("m", "transform")
        .with_parameter("operation", "merge")
        .with_parameter("merge_data", json!({"x": 1, "y": 9}));
    let out = TransformNode
        .execute(create_test_context(merge, json!({"y": 2, "z": 3})))
        .await
        .unwrap();
    assert_eq!(out, json!({"x": 1, "y": 9, "z": 3}));

    let filter = NodeSpec::new("f", "transform")
        .with_parameter("operation", "filter")
        .with_parameter("filter_key", "status")
        .with_parameter("filter_value", "done");
    let kept = TransformNode
        .execute(create_test_context(filter.clone(), json!({"status": "done"})))
        .await
        .unwrap();
    let dropped = TransformNode
        .execute(create_test_context(filter, json!({"status": "pending"})))
        .await
        .unwrap();
    assert_eq!(kept, json!({"status": "done"}));
    assert_eq!(dropped, json!({}));
}

#[tokio::test]
async fn test_transform_extract_json_reports_invalid_input() {
    let spec = NodeSpec::new("e", "transform")
        .with_parameter("operation", "extract_json")
        .with_parameter("json_string", "{not json");
    let out = TransformNode
        .execute(create_test_context(spec, Value::Null))
        .await
        .unwrap();
    assert_eq!(out, json!({"error": "Invalid JSON"}));
}

#[tokio::test]
async fn test_condition_reports_field_and_result() {
    let spec = NodeSpec::new("c", "condition")
        .with_parameter("condition_type", "greater_than")
        .with_parameter("field", "views")
        .with_parameter("value", 100);
    let input = json!({"views": "250"});
    let out = ConditionNode
        .execute(create_test_context(spec, input.clone()))
        .await
        .unwrap();

    assert_eq!(out["condition_result"], json!(true));
    assert_eq!(out["field_value"], json!("250"));
    assert_eq!(out["expected_value"], json!(100));
    assert_eq!(out["data"], input);
}

#[tokio::test]
async fn test_database_upsert_and_queries() {
    let dir = tempfile::tempdir().unwrap();
    let node = DatabaseNode::new(dir.path());
    let op = |operation: &str| {
        NodeSpec::new("db", "database")
            .with_parameter("operation", operation)
            .with_parameter("table", "videos")
    };

    let empty = node
        .execute(create_test_context(op("read"), Value::Null))
        .await
        .unwrap();
    assert_eq!(empty, json!({"records": [], "count": 0}));

    let first = node
        .execute(create_test_context(
            op("write"),
            json!({"record": {"video_id": "abc", "status": "pending"}}),
        ))
        .await
        .unwrap();
    assert_eq!(first["updated"], json!(false));
    assert_eq!(first["record"]["id"], json!("abc"));
    assert!(first["record"]["created_at"].is_string());

    let second = node
        .execute(create_test_context(
            op("write"),
            json!({"video_id": "abc", "status": "done", "url": "https://youtu.be/abc"}),
        ))
        .await
        .unwrap();
    assert_eq!(second["updated"], json!(true));

    let all = node
        .execute(create_test_context(op("read"), Value::Null))
        .await
        .unwrap();
    assert_eq!(all["count"], json!(1));
    assert_eq!(all["records"][0]["status"], json!("done"));
    assert!(all["records"][0]["updated_at"].is_string());

    let one = node
        .execute(create_test_context(
            op("read_one").with_parameter("filter_value", "abc"),
            Value::Null,
        ))
        .await
        .unwrap();
    assert_eq!(one["found"], json!(true));

    let exists = node
        .execute(create_test_context(
            op("check_exists"),
            json!({"url": "https://youtu.be/abc"}),
        ))
        .await
        .unwrap();
    assert_eq!(exists["exists"], json!(true));

    let pending = node
        .execute(create_test_context(op("filter"), Value::Null))
        .await
        .unwrap();
    assert_eq!(pending["count"], json!(0));

    assert!(dir.path().join("videos.json").exists());
}

#[tokio::test]
async fn test_database_write_rejects_non_object_record() {
    let dir = tempfile::tempdir().unwrap();
    let spec = NodeSpec::new("db", "database").with_parameter("operation", "write");
    let err = DatabaseNode::new(dir.path())
        .execute(create_test_context(spec, json!([1, 2])))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::InvalidInputType { .. }));
}

#[tokio::test]
async fn test_http_get_parses_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("x-team", "core"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [1, 2]})))
        .mount(&server)
        .await;

    let mut defaults = BTreeMap::new();
    defaults.insert("x-team".to_string(), "core".to_string());
    let node = HttpNode::with_client(reqwest::Client::new(), defaults);
    let spec = NodeSpec::new("h", "http").with_parameter("url", format!("{}/items", server.uri()));
    let out = node.execute(create_test_context(spec, Value::Null)).await.unwrap();

    assert_eq!(out["status"], json!(200));
    assert_eq!(out["json"], json!({"items": [1, 2]}));
}

#[tokio::test]
async fn test_http_post_with_bearer_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks"))
        .and(header("authorization", "Bearer secret"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .mount(&server)
        .await;

    let spec = NodeSpec::new("h", "http")
        .with_parameter("method", "post")
        .with_parameter("authentication", "bearer")
        .with_parameter("body", json!({"event": "ping"}));
    let ctx = with_key(
        create_test_context(spec, json!({"url": format!("{}/hooks", server.uri())})),
        "bearer_token",
        "secret",
    );
    let out = HttpNode::new().execute(ctx).await.unwrap();

    assert_eq!(out["status"], json!(201));
    assert_eq!(out["body"], json!("created"));
    assert!(out.get("json").is_none());
}

#[tokio::test]
async fn test_http_basic_auth_from_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let spec = NodeSpec::new("h", "http")
        .with_parameter("url", server.uri())
        .with_parameter("authentication", "basic")
        .with_parameter("username", "user")
        .with_parameter("password", "pass");
    let out = HttpNode::new()
        .execute(create_test_context(spec, Value::Null))
        .await
        .unwrap();
    assert_eq!(out["status"], json!(204));
}

#[tokio::test]
async fn test_http_requires_url() {
    let err = HttpNode::new()
        .execute(create_test_context(NodeSpec::new("h", "http"), json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Configuration(_)));
}

#[tokio::test]
async fn test_ai_completion_against_mock_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Short summary"}}],
            "usage": {"total_tokens": 12}
        })))
        .mount(&server)
        .await;

    let spec = NodeSpec::new("ai", "ai")
        .with_parameter("provider", "openai")
        .with_parameter("model", "gpt-4o-mini")
        .with_parameter("base_url", server.uri())
        .with_parameter("prompt", "Summarise {{$json.title}}");
    let ctx = with_key(
        create_test_context(spec, json!({"title": "Rust"})),
        "openai_api_key",
        "sk-test",
    );
    let out = AiNode::new(reqwest::Client::new()).execute(ctx).await.unwrap();

    assert_eq!(out["response"], json!("Short summary"));
    assert_eq!(out["model"], json!("gpt-4o-mini"));
    assert_eq!(out["usage"], json!({"total_tokens": 12}));
}

#[tokio::test]
async fn test_ai_surfaces_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let spec = NodeSpec::new("ai", "ai")
        .with_parameter("base_url", server.uri())
        .with_parameter("api_key", "inline-key");
    let err = AiNode::new(reqwest::Client::new())
        .execute(create_test_context(spec, json!({"message": "hi"})))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        NodeError::ExecutionFailed("AI API error: 429 - rate limited".to_string()).to_string()
    );
}

#[tokio::test]
async fn test_ai_without_key_is_a_configuration_error() {
    let err = AiNode::new(reqwest::Client::new())
        .execute(create_test_context(NodeSpec::new("ai", "ai"), json!("hello")))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Configuration(_)));
}

#[tokio::test]
async fn test_image_describes_prompt_from_input() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer or-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "A red fox at dusk"}}]
        })))
        .mount(&server)
        .await;

    let spec = NodeSpec::new("img", "image")
        .with_parameter("base_url", server.uri())
        .with_parameter("num_images", 2);
    let ctx = with_key(
        create_test_context(spec, json!({"description": "fox", "scene": "forest"})),
        "openrouter_api_key",
        "or-key",
    );
    let out = ImageNode::new(reqwest::Client::new()).execute(ctx).await.unwrap();

    assert_eq!(out["image_description"], json!("A red fox at dusk"));
    assert_eq!(out["prompt"], json!("fox"));
    assert_eq!(out["images"].as_array().unwrap().len(), 2);
    assert_eq!(out["images"][1]["url"], json!("generated_image_1.png"));
    assert!(out["note"].is_string());
}

#[tokio::test]
async fn test_image_api_error_and_missing_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let spec = NodeSpec::new("img", "image")
        .with_parameter("base_url", server.uri())
        .with_parameter("api_key", "inline")
        .with_parameter("prompt", "a lighthouse");
    let err = ImageNode::new(reqwest::Client::new())
        .execute(create_test_context(spec, Value::Null))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Image generation API error: 500 - upstream down"));

    let err = ImageNode::new(reqwest::Client::new())
        .execute(create_test_context(NodeSpec::new("img", "image"), json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Configuration(_)));
}

#[tokio::test]
async fn test_voiceover_placeholder_without_key() {
    let dir = tempfile::tempdir().unwrap();
    let node = VoiceoverNode::new(reqwest::Client::new(), dir.path().to_path_buf());
    let out = node
        .execute(create_test_context(
            NodeSpec::new("v", "voiceover"),
            json!({"script": "Hello there"}),
        ))
        .await
        .unwrap();

    assert_eq!(out["provider"], json!("free_tts"));
    assert_eq!(out["text"], json!("Hello there"));
    assert_eq!(out["voiceover_url"], json!("placeholder_audio.mp3"));
}

#[tokio::test]
async fn test_voiceover_writes_audio_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .and(header("authorization", "Bearer tts-key"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let spec = NodeSpec::new("v", "voiceover")
        .with_parameter("provider", "openai")
        .with_parameter("base_url", server.uri())
        .with_parameter("text", "Read me aloud");
    let ctx = with_key(create_test_context(spec, Value::Null), "openai_api_key", "tts-key");
    let out = VoiceoverNode::new(reqwest::Client::new(), dir.path().to_path_buf())
        .execute(ctx)
        .await
        .unwrap();

    assert_eq!(out["size_bytes"], json!(4));
    let audio_file = out["audio_file"].as_str().unwrap();
    assert!(audio_file.starts_with("voiceover_") && audio_file.ends_with(".mp3"));
    assert_eq!(std::fs::read(dir.path().join(audio_file)).unwrap(), vec![1u8, 2, 3, 4]);
}

#[tokio::test]
async fn test_youtube_extract_id() {
    let out = YoutubeNode
        .execute(create_test_context(
            NodeSpec::new("y", "youtube"),
            json!({"url": "https://youtu.be/dQw4w9WgXcQ?t=10"}),
        ))
        .await
        .unwrap();
    assert_eq!(out["video_id"], json!("dQw4w9WgXcQ"));
    assert_eq!(out["video_url"], json!("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));

    let miss = YoutubeNode
        .execute(create_test_context(
            NodeSpec::new("y", "youtube"),
            json!({"url": "https://example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(miss["video_id"], Value::Null);
}

#[tokio::test]
async fn test_delay_passes_input_through() {
    let spec = NodeSpec::new("d", "delay").with_parameter("delay_ms", 5);
    let out = DelayNode
        .execute(create_test_context(spec, json!({"k": "v"})))
        .await
        .unwrap();
    assert_eq!(out, json!({"k": "v"}));
}

#[tokio::test]
async fn test_delay_honours_cancellation() {
    let spec = NodeSpec::new("d", "delay").with_parameter("delay_ms", 60_000);
    let ctx = create_test_context(spec, Value::Null);
    let token = ctx.cancellation.clone();

    let handle = tokio::spawn(async move { DelayNode.execute(ctx).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("delay did not observe cancellation")
        .unwrap();
    assert!(matches!(result, Err(NodeError::Cancelled)));
}
