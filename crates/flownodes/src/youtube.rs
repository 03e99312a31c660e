use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowcore::{Node, NodeContext, NodeError, NodeSpec, Value, ValueExt};
use flowruntime::{NodeFactory, NodeMetadata};
use regex::Regex;
use serde_json::json;

const VIDEO_ID_PATTERNS: [&str; 2] = [
    r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([a-zA-Z0-9_-]{11})",
    r"youtube\.com/watch\?.*v=([a-zA-Z0-9_-]{11})",
];

/// YouTube link helpers
pub struct YoutubeNode;

#[async_trait]
impl Node for YoutubeNode {
    fn node_type(&self) -> &str {
        "youtube"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Value, NodeError> {
        match ctx.parameter_str("operation", "extract_id").as_str() {
            "extract_id" => {
                let url = ctx
                    .input
                    .field("url")
                    .and_then(Value::as_str)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| ctx.input.to_plain_string());
                let video_id = extract_video_id(&url)?;
                let video_url = video_id
                    .as_ref()
                    .map(|id| format!("https://www.youtube.com/watch?v={}", id));

                Ok(json!({"video_id": video_id, "url": url, "video_url": video_url}))
            }
            "check_viral" => Ok(check_viral(&ctx, Utc::now())),
            _ => Ok(ctx.input),
        }
    }
}

fn extract_video_id(url: &str) -> Result<Option<String>, NodeError> {
    for pattern in VIDEO_ID_PATTERNS {
        let re = Regex::new(pattern)
            .map_err(|e| NodeError::ExecutionFailed(format!("Bad video id pattern: {}", e)))?;
        if let Some(caps) = re.captures(url) {
            return Ok(Some(caps[1].to_string()));
        }
    }
    Ok(None)
}

fn check_viral(ctx: &NodeContext, now: DateTime<Utc>) -> Value {
    let views = ctx
        .input
        .field("views")
        .and_then(ValueExt::to_f64_lenient)
        .unwrap_or(0.0) as i64;
    let threshold = |key: &str, default: i64| {
        ctx.parameter(key)
            .and_then(ValueExt::to_f64_lenient)
            .map(|v| v as i64)
            .unwrap_or(default)
    };

    // Unparseable dates count as published now
    let published = ctx
        .input
        .field("published_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(now);
    let days_ago = (now - published).num_days();

    let is_viral = (days_ago <= 1 && views >= threshold("min_views_1day", 10_000))
        || (days_ago <= 7 && views >= threshold("min_views_7day", 50_000))
        || (days_ago <= 30 && views >= threshold("min_views_30day", 200_000));

    json!({
        "is_viral": is_viral,
        "views": views,
        "days_ago": days_ago,
        "criteria_met": is_viral,
    })
    .merged_with(&ctx.input)
}

pub struct YoutubeNodeFactory;

impl NodeFactory for YoutubeNodeFactory {
    fn create(&self, _spec: &NodeSpec) -> Result<Box<dyn Node>, NodeError> {
        Ok(Box::new(YoutubeNode))
    }

    fn node_type(&self) -> &str {
        "youtube"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new("Extract video ids and score view counts", "media")
    }
}
