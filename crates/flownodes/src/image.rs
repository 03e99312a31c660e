use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeSpec, Value, ValueExt};
use flowruntime::{NodeFactory, NodeMetadata};
use serde_json::json;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Image concept generation. Asks a chat model for a visual description and
/// returns placeholder image entries carrying it.
pub struct ImageNode {
    client: reqwest::Client,
}

impl ImageNode {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Node for ImageNode {
    fn node_type(&self) -> &str {
        "image"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let provider = ctx.parameter_str("provider", "openrouter");
        if provider != "openrouter" {
            return Err(NodeError::Configuration(format!("Unknown provider: {}", provider)));
        }
        let api_key = ctx
            .credential_or_parameter("openrouter_api_key", "api_key")
            .ok_or_else(|| NodeError::Configuration("OpenRouter API key is required".to_string()))?;

        let model = ctx.parameter_str("model", "black-forest-labs/flux-pro");
        let num_images = ctx
            .parameter("num_images")
            .and_then(ValueExt::to_f64_lenient)
            .unwrap_or(1.0)
            .max(0.0) as usize;
        let prompt = image_prompt(&ctx);

        let chat_model = if model.to_lowercase().contains("vision") {
            "openai/gpt-4-vision-preview"
        } else {
            "openai/gpt-4"
        };
        let payload = json!({
            "model": chat_model,
            "messages": [{
                "role": "user",
                "content": format!(
                    "Create a detailed visual description for an image about: {}. \
                     Be very descriptive about colors, composition, style, and mood.",
                    prompt
                ),
            }],
            "max_tokens": 200,
        });

        let base_url = ctx.parameter_str("base_url", OPENROUTER_BASE_URL);
        let response = self
            .client
            .post(format!("{}/chat/completions", base_url.trim_end_matches('/')))
            .bearer_auth(&api_key)
            .header("X-Title", "Workflow Engine")
            .json(&payload)
            .send()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Image request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NodeError::ExecutionFailed(format!(
                "Image generation API error: {} - {}",
                status.as_u16(),
                error_text
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Invalid image response: {}", e)))?;

        let Some(description) = result
            .pointer("/choices/0/message/content")
            .map(ValueExt::to_plain_string)
        else {
            return Ok(json!({"error": "Image generation failed"}));
        };

        let images: Vec<Value> = (0..num_images)
            .map(|i| {
                json!({
                    "url": format!("generated_image_{}.png", i),
                    "description": description,
                    "prompt": prompt,
                })
            })
            .collect();

        Ok(json!({
            "image_description": description,
            "prompt": prompt,
            "images": images,
            "note": "Placeholder URLs; plug in an image generation API to render them",
        }))
    }
}

/// `prompt` parameter, else input `prompt`/`description`/`scene`, else the whole input
fn image_prompt(ctx: &NodeContext) -> String {
    let prompt = ctx.parameter_str("prompt", "");
    if !prompt.is_empty() {
        return prompt;
    }

    ["prompt", "description", "scene"]
        .iter()
        .find_map(|key| ctx.input.field(key))
        .map(ValueExt::to_plain_string)
        .unwrap_or_else(|| ctx.input.to_plain_string())
}

pub struct ImageNodeFactory {
    client: reqwest::Client,
}

impl ImageNodeFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl NodeFactory for ImageNodeFactory {
    fn create(&self, _spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(ImageNode::new(self.client.clone())))
    }

    fn node_type(&self) -> &str {
        "image"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new("Describe an image for a prompt via OpenRouter", "media")
    }
}
