use crate::error::{GatewayError, Result};
use secrecy::Secret;
use std::collections::HashMap;
use std::env;
use tracing::debug;

/// Secret string wrapper that prevents accidental exposure
pub type SecretString = Secret<String>;

/// Secrets provider interface
pub trait SecretsProvider: Send + Sync {
    /// Get a secret by key
    fn get_secret(&self, key: &str) -> Result<SecretString>;

    /// Check if a secret exists
    fn has_secret(&self, key: &str) -> bool;

    /// Get a secret, treating a missing one as `None`
    fn optional_secret(&self, key: &str) -> Option<SecretString> {
        match self.get_secret(key) {
            Ok(secret) => Some(secret),
            Err(e) => {
                debug!(key = %key, error = %e, "Secret not available");
                None
            }
        }
    }
}

/// Environment variable secrets provider
#[derive(Debug, Clone)]
pub struct EnvSecretsProvider {
    prefix: String,
}

impl EnvSecretsProvider {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    fn env_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.to_uppercase())
    }
}

impl Default for EnvSecretsProvider {
    fn default() -> Self {
        Self::new("FOLIO_SECRET_")
    }
}

impl SecretsProvider for EnvSecretsProvider {
    fn get_secret(&self, key: &str) -> Result<SecretString> {
        env::var(self.env_key(key))
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Secret::new)
            .ok_or_else(|| GatewayError::Config(format!("Secret '{}' not found in environment", key)))
    }

    fn has_secret(&self, key: &str) -> bool {
        env::var(self.env_key(key)).is_ok()
    }
}

/// In-memory secrets provider (for testing or simple deployments)
#[derive(Debug, Clone, Default)]
pub struct InMemorySecretsProvider {
    secrets: HashMap<String, String>,
}

impl InMemorySecretsProvider {
    pub fn new(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }

    pub fn with_secret(key: &str, value: &str) -> Self {
        Self::new(HashMap::from([(key.to_string(), value.to_string())]))
    }
}

impl SecretsProvider for InMemorySecretsProvider {
    fn get_secret(&self, key: &str) -> Result<SecretString> {
        self.secrets
            .get(key)
            .cloned()
            .map(Secret::new)
            .ok_or_else(|| GatewayError::Config(format!("Secret '{}' not found", key)))
    }

    fn has_secret(&self, key: &str) -> bool {
        self.secrets.contains_key(key)
    }
}
