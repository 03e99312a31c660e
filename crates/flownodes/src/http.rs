use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeSpec, Value, ValueExt};
use flowruntime::{NodeFactory, NodeMetadata};
use reqwest::Method;
use serde_json::{json, Map};
use std::collections::BTreeMap;
use std::time::Duration;

/// Shared client for the HTTP-backed nodes
pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

/// HTTP request node
pub struct HttpNode {
    client: reqwest::Client,
    default_headers: BTreeMap<String, String>,
}

impl HttpNode {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new(), BTreeMap::new())
    }

    pub fn with_client(client: reqwest::Client, default_headers: BTreeMap<String, String>) -> Self {
        Self {
            client,
            default_headers,
        }
    }
}

impl Default for HttpNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for HttpNode {
    fn node_type(&self) -> &str {
        "http"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let method_name = ctx.parameter_str("method", "GET").to_uppercase();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| NodeError::Configuration(format!("Unsupported method: {}", method_name)))?;

        let url = ctx
            .parameter("url")
            .or_else(|| ctx.input.field("url"))
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| NodeError::Configuration("URL is required for HTTP node".to_string()))?
            .to_string();

        let mut headers: BTreeMap<String, String> = self.default_headers.clone();
        if let Some(Value::Object(extra)) = ctx.parameter("headers") {
            for (key, value) in extra {
                headers.insert(key.clone(), value.to_plain_string());
            }
        }

        let mut request = self.client.request(method.clone(), &url);

        match ctx.parameter_str("authentication", "none").as_str() {
            "bearer" => {
                if let Some(token) = ctx.credential_or_parameter("bearer_token", "bearer_token") {
                    headers.insert("Authorization".to_string(), format!("Bearer {}", token));
                }
            }
            "basic" => {
                let username = string_parameter(&ctx, "username")
                    .or_else(|| ctx.credential("http_username", None));
                let password = string_parameter(&ctx, "password")
                    .or_else(|| ctx.credential("http_password", None));
                if let (Some(username), Some(password)) = (username, password) {
                    request = request.basic_auth(username, Some(password));
                }
            }
            _ => {}
        }

        let sends_body = matches!(method, Method::POST | Method::PUT | Method::PATCH);
        match ctx.parameter("body") {
            Some(Value::String(text)) if sends_body && !text.is_empty() => {
                request = request.body(text.clone());
            }
            Some(body) if sends_body && !is_empty_body(body) => {
                headers
                    .entry("Content-Type".to_string())
                    .or_insert_with(|| "application/json".to_string());
                request = request.body(body.to_string());
            }
            _ => {}
        }

        for (key, value) in &headers {
            request = request.header(key.as_str(), value.as_str());
        }

        tracing::debug!("{} {}", method, url);
        let response = request
            .send()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let response_headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_str().unwrap_or("").to_string())))
            .collect();

        let body_text = response
            .text()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Failed to read response: {}", e)))?;

        let mut output = json!({
            "status": status,
            "headers": response_headers,
            "body": body_text,
        });
        if let Ok(parsed) = serde_json::from_str::<Value>(&body_text) {
            output["json"] = parsed;
        }

        Ok(output)
    }
}

fn string_parameter(ctx: &NodeContext, key: &str) -> Option<String> {
    ctx.parameter(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn is_empty_body(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Object(obj) => obj.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

pub struct HttpNodeFactory {
    client: reqwest::Client,
    default_headers: BTreeMap<String, String>,
}

impl HttpNodeFactory {
    pub fn new(client: reqwest::Client, default_headers: BTreeMap<String, String>) -> Self {
        Self {
            client,
            default_headers,
        }
    }
}

impl NodeFactory for HttpNodeFactory {
    fn create(&self, _spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(HttpNode::with_client(
            self.client.clone(),
            self.default_headers.clone(),
        )))
    }

    fn node_type(&self) -> &str {
        "http"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new("Make HTTP requests", "http")
    }
}
