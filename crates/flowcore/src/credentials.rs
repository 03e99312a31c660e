use std::collections::HashMap;

/// Credential/config collaborator consulted by nodes.
///
/// Lookup precedence is up to the implementation.
pub trait CredentialProvider: Send + Sync {
    fn credential(&self, key: &str) -> Option<String>;
}

/// Fixed in-memory credentials.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    values: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn credential(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
