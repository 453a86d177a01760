//! Sources of the API key used by the completion service.
//!
//! A provider answers with an empty string when no key is available. Callers
//! that need the key fail their own request in that case; nothing fails at
//! startup.

use async_trait::async_trait;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn api_key(&self) -> String;
}

/// Reads the key from an environment variable on every call.
pub struct EnvCredentialProvider {
    var: String,
}

impl EnvCredentialProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new("OPENAI_API_KEY")
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn api_key(&self) -> String {
        match std::env::var(&self.var) {
            Ok(key) => key.trim().to_string(),
            Err(_) => {
                tracing::debug!(var = %self.var, "API key variable not set");
                String::new()
            }
        }
    }
}

pub struct StaticCredentialProvider(String);

impl StaticCredentialProvider {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn api_key(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unset_variable_yields_empty_key() {
        let provider = EnvCredentialProvider::new("SPARROW_TEST_KEY_THAT_IS_NEVER_SET");
        assert_eq!(provider.api_key().await, "");
    }

    #[tokio::test]
    async fn test_static_key() {
        let provider = StaticCredentialProvider::new("sk-test");
        assert_eq!(provider.api_key().await, "sk-test");
    }
}
