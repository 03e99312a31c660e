use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeSpec, Value, ValueExt};
use flowruntime::{NodeFactory, NodeMetadata};
use serde_json::json;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completion call against an OpenAI-compatible API
pub struct AiNode {
    client: reqwest::Client,
}

impl AiNode {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Node for AiNode {
    fn node_type(&self) -> &str {
        "ai"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let provider = ctx.parameter_str("provider", "openrouter");
        let model = ctx.parameter_str("model", "openai/gpt-3.5-turbo");
        let temperature = ctx.parameter_or("temperature", json!(0.7));
        let max_tokens = ctx.parameter_or("max_tokens", json!(1000));

        let (credential_key, default_base_url) = match provider.as_str() {
            "openrouter" => ("openrouter_api_key", OPENROUTER_BASE_URL),
            "openai" => ("openai_api_key", OPENAI_BASE_URL),
            other => {
                return Err(NodeError::Configuration(format!("Unknown provider: {}", other)));
            }
        };
        let api_key = ctx
            .credential_or_parameter(credential_key, "api_key")
            .ok_or_else(|| NodeError::Configuration(format!("{} API key is required", provider)))?;

        let base_url = ctx.parameter_str("base_url", default_base_url);
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        let payload = json!({
            "model": model,
            "messages": build_messages(&ctx),
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let mut request = self.client.post(&url).bearer_auth(&api_key).json(&payload);
        if provider == "openrouter" {
            request = request.header("X-Title", "Workflow Engine");
        }

        tracing::debug!("Requesting completion from {} ({})", provider, model);
        let response = request
            .send()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("AI request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NodeError::ExecutionFailed(format!(
                "AI API error: {} - {}",
                status.as_u16(),
                error_text
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Invalid AI response: {}", e)))?;

        let content = result
            .pointer("/choices/0/message/content")
            .map(ValueExt::to_plain_string);

        Ok(match content {
            Some(content) => json!({
                "response": content,
                "usage": result.get("usage").cloned().unwrap_or_else(|| json!({})),
                "model": model,
                "full_response": result,
            }),
            None => json!({
                "response": result.to_string(),
                "full_response": result,
            }),
        })
    }
}

/// Messages from the `messages` parameter, a templated `prompt`, or the input itself
fn build_messages(ctx: &NodeContext) -> Value {
    if let Some(Value::Array(messages)) = ctx.parameter("messages") {
        if !messages.is_empty() {
            return Value::Array(messages.clone());
        }
    }

    let prompt = ctx.parameter_str("prompt", "");
    let content = if !prompt.is_empty() {
        render_prompt(&prompt, &ctx.input)
    } else if let Some(message) = ctx.input.field("message") {
        message.to_plain_string()
    } else if let Some(text) = ctx.input.field("text") {
        text.to_plain_string()
    } else {
        ctx.input.to_plain_string()
    };

    json!([{ "role": "user", "content": content }])
}

/// Replace `{{$json.key}}` references with fields of the input
fn render_prompt(prompt: &str, input: &Value) -> String {
    let mut rendered = prompt.to_string();
    if let Value::Object(fields) = input {
        for (key, value) in fields {
            rendered = rendered.replace(&format!("{{{{$json.{}}}}}", key), &value.to_plain_string());
        }
    }
    rendered
}

pub struct AiNodeFactory {
    client: reqwest::Client,
}

impl AiNodeFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl NodeFactory for AiNodeFactory {
    fn create(&self, _spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(AiNode::new(self.client.clone())))
    }

    fn node_type(&self) -> &str {
        "ai"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new("Model completion via OpenRouter or OpenAI", "ai")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_template_substitutes_input_fields() {
        let rendered = render_prompt(
            "Summarise {{$json.title}} in {{$json.words}} words",
            &json!({"title": "Rust", "words": 10}),
        );
        assert_eq!(rendered, "Summarise Rust in 10 words");
    }
}
