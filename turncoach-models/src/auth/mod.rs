//! Credential management for oracle API keys.
//!
//! Keys are looked up in the system keyring first, then (when enabled) in
//! provider-specific environment variables.
//!
//! # Example
//!
//! ```ignore
//! use turncoach_models::auth::CredentialStore;
//!
//! let store = CredentialStore::new("turncoach").with_env_fallback();
//! let key = store.get("google")?;
//! ```

use std::env;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::{Error, Result};

/// A secure API key that prevents accidental logging.
///
/// `Debug` prints `ApiKey([REDACTED])`; the value is only reachable via
/// [`expose_secret`](Self::expose_secret).
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Create a new API key from a string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    /// Create an API key, rejecting blank values.
    pub fn parse(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::InvalidApiKey);
        }
        Ok(Self::new(key.trim().to_string()))
    }

    /// Expose the secret key value.
    ///
    /// Use sparingly - only when actually sending to an API.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey([REDACTED])")
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Environment variable names for each provider.
const ENV_VARS: &[(&str, &str)] = &[("google", "GEMINI_API_KEY"), ("gemini", "GEMINI_API_KEY")];

fn env_var_for_provider(provider: &str) -> Option<&'static str> {
    ENV_VARS
        .iter()
        .find(|(p, _)| *p == provider)
        .map(|(_, v)| *v)
}

/// Secure credential storage with system keyring and environment fallback.
///
/// # Storage Priority
///
/// 1. System keyring (if available)
/// 2. Environment variables (if `env_fallback` is enabled)
pub struct CredentialStore {
    service_name: String,
    env_fallback: bool,
}

impl CredentialStore {
    /// Create a new credential store for a keyring service (e.g. "turncoach").
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            env_fallback: false,
        }
    }

    /// Enable environment variable fallback.
    pub fn with_env_fallback(mut self) -> Self {
        self.env_fallback = true;
        self
    }

    /// Get an API key for a provider.
    ///
    /// # Errors
    ///
    /// Returns `Error::CredentialsNotFound` if no credentials are found.
    pub fn get(&self, provider: &str) -> Result<ApiKey> {
        if let Some(key) = self.get_from_keyring(provider) {
            debug!(provider, "retrieved API key from keyring");
            return Ok(key);
        }

        if self.env_fallback
            && let Some(key) = self.get_from_env(provider)
        {
            debug!(provider, "retrieved API key from environment");
            return Ok(key);
        }

        Err(Error::CredentialsNotFound(provider.to_string()))
    }

    /// Check if credentials exist for a provider.
    pub fn has(&self, provider: &str) -> bool {
        self.get(provider).is_ok()
    }

    /// Get the source of a credential (keyring or env).
    pub fn credential_source(&self, provider: &str) -> Option<CredentialSource> {
        if self.get_from_keyring(provider).is_some() {
            Some(CredentialSource::Keyring)
        } else if self.env_fallback && self.get_from_env(provider).is_some() {
            Some(CredentialSource::Environment)
        } else {
            None
        }
    }

    fn get_from_keyring(&self, provider: &str) -> Option<ApiKey> {
        let entry = keyring::Entry::new(&self.service_name, provider).ok()?;
        entry.get_password().ok().and_then(|k| ApiKey::parse(k).ok())
    }

    fn get_from_env(&self, provider: &str) -> Option<ApiKey> {
        let env_var = env_var_for_provider(provider)?;
        env::var(env_var).ok().and_then(|k| ApiKey::parse(k).ok())
    }
}

/// Source of a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Stored in system keyring.
    Keyring,
    /// From environment variable.
    Environment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("AIza-secret-12345");
        let debug = format!("{:?}", key);
        assert_eq!(debug, "ApiKey([REDACTED])");
        assert!(!debug.contains("AIza"));
    }

    #[test]
    fn api_key_parse_rejects_blank() {
        assert!(matches!(ApiKey::parse("   "), Err(Error::InvalidApiKey)));
        assert_eq!(ApiKey::parse(" k1 ").unwrap().expose_secret(), "k1");
    }

    #[test]
    fn env_var_for_known_providers() {
        assert_eq!(env_var_for_provider("google"), Some("GEMINI_API_KEY"));
        assert_eq!(env_var_for_provider("ollama"), None);
    }

    #[test]
    fn credential_store_env_fallback_works() {
        // SAFETY: the only test touching GEMINI_API_KEY
        unsafe { env::set_var("GEMINI_API_KEY", "test-key-from-env") };

        let store = CredentialStore::new("turncoach-test-nonexistent").with_env_fallback();
        let result = store.get("google");
        let source = store.credential_source("google");

        unsafe { env::remove_var("GEMINI_API_KEY") };

        assert_eq!(result.unwrap().expose_secret(), "test-key-from-env");
        assert_eq!(source, Some(CredentialSource::Environment));
    }

    #[test]
    fn credential_store_without_fallback_fails() {
        let store = CredentialStore::new("turncoach-test-nonexistent");
        let result = store.get("unknown-provider");
        assert!(matches!(result, Err(Error::CredentialsNotFound(p)) if p == "unknown-provider"));
        assert!(!store.has("unknown-provider"));
    }
}
