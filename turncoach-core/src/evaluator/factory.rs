//! Oracle construction
//!
//! The evaluator builds its oracle lazily on first use, through an
//! [`OracleFactory`], so sessions can start before credentials are checked.

use std::sync::Arc;

use tracing::{debug, info};
use turncoach_models::auth::CredentialStore;
use turncoach_models::providers::{GeminiOracle, OllamaOracle, Oracle};

use crate::config::OracleConfig;
use crate::error::SetupError;

/// Creates the oracle used by an evaluator
pub trait OracleFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn Oracle>, SetupError>;
}

/// Builds a provider oracle from [`OracleConfig`]
pub struct ProviderFactory {
    config: OracleConfig,
    credentials: CredentialStore,
}

impl ProviderFactory {
    pub fn new(config: OracleConfig) -> Self {
        let credentials = CredentialStore::new(config.keyring_service.clone()).with_env_fallback();
        Self {
            config,
            credentials,
        }
    }

    pub fn with_credentials(config: OracleConfig, credentials: CredentialStore) -> Self {
        Self {
            config,
            credentials,
        }
    }
}

impl OracleFactory for ProviderFactory {
    fn create(&self) -> Result<Arc<dyn Oracle>, SetupError> {
        let provider = self.config.provider.trim().to_lowercase();
        let model = self.config.model.trim();
        if model.is_empty() {
            return Err(SetupError::InvalidConfig("oracle model is empty".to_string()));
        }

        let oracle: Arc<dyn Oracle> = match provider.as_str() {
            "gemini" | "google" => {
                let key = self
                    .credentials
                    .get("google")
                    .map_err(|_| SetupError::MissingCredentials("google".to_string()))?;
                debug!(source = ?self.credentials.credential_source("google"), "found Gemini credentials");
                match &self.config.base_url {
                    Some(url) => Arc::new(GeminiOracle::with_base_url(key, model, url.as_str())),
                    None => Arc::new(GeminiOracle::new(key, model)),
                }
            }
            "ollama" => match &self.config.base_url {
                Some(url) => Arc::new(OllamaOracle::with_base_url(url.as_str(), model)),
                None => Arc::new(OllamaOracle::new(model)),
            },
            other => return Err(SetupError::UnsupportedProvider(other.to_string())),
        };

        info!(provider = oracle.name(), model = oracle.model(), "created oracle");
        Ok(oracle)
    }
}

/// Hands out one pre-built oracle
///
/// Used when the caller already owns an oracle, e.g. a scripted one in tests.
#[derive(Clone)]
pub struct SharedOracleFactory(Arc<dyn Oracle>);

impl SharedOracleFactory {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self(oracle)
    }
}

impl OracleFactory for SharedOracleFactory {
    fn create(&self) -> Result<Arc<dyn Oracle>, SetupError> {
        Ok(Arc::clone(&self.0))
    }
}
