use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeSpec, Value, ValueExt};
use flowruntime::{NodeFactory, NodeMetadata};
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Text-to-speech generation
pub struct VoiceoverNode {
    client: reqwest::Client,
    audio_dir: PathBuf,
}

impl VoiceoverNode {
    pub fn new(client: reqwest::Client, audio_dir: PathBuf) -> Self {
        Self { client, audio_dir }
    }

    async fn save_audio(&self, text: &str, audio: &[u8]) -> Result<(PathBuf, String), NodeError> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let audio_file = format!("voiceover_{}.mp3", hasher.finish() % 10000);

        tokio::fs::create_dir_all(&self.audio_dir)
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Cannot create audio dir: {}", e)))?;
        let path = self.audio_dir.join(&audio_file);
        tokio::fs::write(&path, audio)
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Cannot write audio: {}", e)))?;

        Ok((path, audio_file))
    }
}

#[async_trait]
impl Node for VoiceoverNode {
    fn node_type(&self) -> &str {
        "voiceover"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        let provider = ctx.parameter_str("provider", "elevenlabs");
        let text = speech_text(&ctx);

        let credential_key = match provider.as_str() {
            "elevenlabs" => "elevenlabs_api_key",
            "openai" => "openai_api_key",
            other => {
                return Err(NodeError::Configuration(format!("Unknown provider: {}", other)));
            }
        };

        let Some(api_key) = ctx.credential_or_parameter(credential_key, "api_key") else {
            return Ok(json!({
                "voiceover_url": "placeholder_audio.mp3",
                "text": text,
                "provider": "free_tts",
                "note": "No API key configured; use a local or browser text-to-speech engine",
                "audio_file": "voiceover.mp3",
            }));
        };

        let request = if provider == "elevenlabs" {
            let base_url = ctx.parameter_str("base_url", ELEVENLABS_BASE_URL);
            let voice_id = ctx.parameter_str("voice_id", "21m00Tcm4TlvDq8ikWAM");
            self.client
                .post(format!("{}/text-to-speech/{}", base_url.trim_end_matches('/'), voice_id))
                .header("Accept", "audio/mpeg")
                .header("xi-api-key", api_key)
                .json(&json!({
                    "text": text,
                    "model_id": ctx.parameter_str("model", "eleven_multilingual_v2"),
                    "voice_settings": {"stability": 0.5, "similarity_boost": 0.5},
                }))
        } else {
            let base_url = ctx.parameter_str("base_url", OPENAI_BASE_URL);
            self.client
                .post(format!("{}/audio/speech", base_url.trim_end_matches('/')))
                .bearer_auth(api_key)
                .json(&json!({
                    "model": "tts-1",
                    "input": text,
                    "voice": ctx.parameter_str("voice", "alloy"),
                }))
        };

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("TTS request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NodeError::ExecutionFailed(format!(
                "{} TTS error: {} - {}",
                provider,
                status.as_u16(),
                error_text
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Failed to read audio: {}", e)))?;
        let (path, audio_file) = self.save_audio(&text, &audio).await?;

        Ok(json!({
            "voiceover_url": path.to_string_lossy(),
            "audio_file": audio_file,
            "text": text,
            "provider": provider,
            "size_bytes": audio.len(),
        }))
    }
}

fn speech_text(ctx: &NodeContext) -> String {
    let text = ctx.parameter_str("text", "");
    if !text.is_empty() {
        return text;
    }

    ["text", "script", "content"]
        .iter()
        .find_map(|key| ctx.input.field(key).filter(|v| !v.is_null()))
        .map(ValueExt::to_plain_string)
        .unwrap_or_else(|| ctx.input.to_plain_string())
}

pub struct VoiceoverNodeFactory {
    client: reqwest::Client,
    audio_dir: PathBuf,
}

impl VoiceoverNodeFactory {
    pub fn new(client: reqwest::Client, audio_dir: PathBuf) -> Self {
        Self { client, audio_dir }
    }
}

impl NodeFactory for VoiceoverNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        let audio_dir = spec
            .parameters
            .get("output_dir")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.audio_dir.clone());
        Ok(Box::new(VoiceoverNode::new(self.client.clone(), audio_dir)))
    }

    fn node_type(&self) -> &str {
        "voiceover"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new("Text-to-speech via ElevenLabs or OpenAI", "media")
    }
}
