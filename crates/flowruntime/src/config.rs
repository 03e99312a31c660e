use crate::executor::DEFAULT_ENTRY_NODE_TYPE;
use flowcore::{CredentialProvider, FlowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

/// Environment variable naming the config file used by the front ends
pub const CONFIG_PATH_ENV: &str = "FLOW_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "workflow_config.json";

/// Configuration for the engine
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Node type whose instances are treated as entry points
    pub entry_node_type: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            entry_node_type: DEFAULT_ENTRY_NODE_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            default_headers: BTreeMap::new(),
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./workflows")
}

/// On-disk config document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// `null` entries name a key without setting it
    #[serde(default)]
    pub api_keys: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub workflows: StorageSettings,
}

impl Settings {
    /// Defaults with API keys seeded from well-known environment variables
    pub fn from_env() -> Self {
        let mut settings = Settings::default();
        for (key, var) in [
            ("openrouter", "OPENROUTER_API_KEY"),
            ("openai", "OPENAI_API_KEY"),
            ("github", "GITHUB_TOKEN"),
        ] {
            if let Ok(value) = std::env::var(var) {
                settings.api_keys.insert(key.to_string(), Some(value));
            }
        }
        settings
    }

    /// Layer a file document over these settings, section by section
    fn merge(&mut self, file: Settings) {
        for (key, value) in file.api_keys {
            match value {
                Some(value) => {
                    self.api_keys.insert(key, Some(value));
                }
                None => {
                    self.api_keys.entry(key).or_insert(None);
                }
            }
        }
        self.http = file.http;
        self.workflows = file.workflows;
    }
}

/// JSON-file backed credential and settings store
pub struct ConfigManager {
    path: PathBuf,
    settings: RwLock<Settings>,
}

impl ConfigManager {
    /// Load from `path`, falling back to defaults when the file is missing
    /// or unreadable
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut settings = Settings::from_env();

        if path.exists() {
            match read_settings(&path) {
                Ok(file) => settings.merge(file),
                Err(e) => tracing::warn!("Could not load config file {}: {}", path.display(), e),
            }
        }

        Self {
            path,
            settings: RwLock::new(settings),
        }
    }

    /// Load from `$FLOW_CONFIG`, or `workflow_config.json` in the working directory
    pub fn from_default_location() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn storage_path(&self) -> PathBuf {
        self.read().workflows.storage_path.clone()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.read().http.timeout)
    }

    pub fn default_headers(&self) -> BTreeMap<String, String> {
        self.read().http.default_headers.clone()
    }

    /// Store a credential and persist the config file
    pub fn set_credential(&self, key: impl Into<String>, value: impl Into<String>) -> Result<(), FlowError> {
        let snapshot = {
            let mut settings = self
                .settings
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            settings.api_keys.insert(key.into(), Some(value.into()));
            settings.clone()
        };
        self.save(&snapshot)
    }

    fn save(&self, settings: &Settings) -> Result<(), FlowError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(settings)?)?;
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Settings> {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialProvider for ConfigManager {
    /// Explicit `api_keys` entry first, then the environment variable named
    /// after the key (upper-cased, `-` as `_`)
    fn credential(&self, key: &str) -> Option<String> {
        if let Some(Some(value)) = self.read().api_keys.get(key) {
            return Some(value.clone());
        }
        std::env::var(key.to_uppercase().replace('-', "_")).ok()
    }
}

fn read_settings(path: &Path) -> Result<Settings, FlowError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
