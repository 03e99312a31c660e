//! Standard node library
//!
//! Collection of built-in nodes for common operations

mod ai;
mod condition;
mod database;
mod debug;
mod http;
mod image;
mod time;
mod transform;
mod trigger;
mod voiceover;
mod youtube;

pub use ai::AiNode;
pub use condition::ConditionNode;
pub use database::DatabaseNode;
pub use debug::DebugNode;
pub use http::HttpNode;
pub use image::ImageNode;
pub use time::DelayNode;
pub use transform::TransformNode;
pub use trigger::TriggerNode;
pub use voiceover::VoiceoverNode;
pub use youtube::YoutubeNode;

use flowruntime::{ConfigManager, NodeRegistry};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Settings shared by the built-in nodes at construction time
#[derive(Debug, Clone)]
pub struct NodeDefaults {
    /// Directory holding the record store tables
    pub storage_path: PathBuf,
    /// Directory voiceover audio is written to
    pub audio_dir: PathBuf,
    pub http_timeout: Duration,
    pub default_headers: BTreeMap<String, String>,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./workflows/data"),
            audio_dir: PathBuf::from("workflows/audio"),
            http_timeout: Duration::from_secs(30),
            default_headers: BTreeMap::new(),
        }
    }
}

impl From<&ConfigManager> for NodeDefaults {
    fn from(config: &ConfigManager) -> Self {
        Self {
            storage_path: config.storage_path(),
            http_timeout: config.http_timeout(),
            default_headers: config.default_headers(),
            ..Self::default()
        }
    }
}

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    register_with(registry, NodeDefaults::default());
}

/// Register all standard nodes using the given defaults
pub fn register_with(registry: &mut NodeRegistry, defaults: NodeDefaults) {
    let client = http::build_client(defaults.http_timeout);

    registry.register(Arc::new(trigger::TriggerNodeFactory));
    registry.register(Arc::new(transform::TransformNodeFactory));
    registry.register(Arc::new(condition::ConditionNodeFactory));
    registry.register(Arc::new(http::HttpNodeFactory::new(
        client.clone(),
        defaults.default_headers.clone(),
    )));
    registry.register(Arc::new(ai::AiNodeFactory::new(client.clone())));
    registry.register(Arc::new(image::ImageNodeFactory::new(client.clone())));
    registry.register(Arc::new(voiceover::VoiceoverNodeFactory::new(
        client,
        defaults.audio_dir.clone(),
    )));
    registry.register(Arc::new(database::DatabaseNodeFactory::new(
        defaults.storage_path.clone(),
    )));
    registry.register(Arc::new(youtube::YoutubeNodeFactory));
    registry.register(Arc::new(time::DelayNodeFactory));
    registry.register(Arc::new(debug::DebugNodeFactory));
}
