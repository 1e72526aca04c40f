//! Backend selection
//!
//! Initializes every provider with a configured API key, honors the
//! preferred provider when available, and otherwise uses the first provider
//! that came up. Selection state lives in this object, not in a process
//! global; construction fails when no provider is configured.

use crate::backend::{GeminiClient, GenerationRequest, GenerativeBackend, GroqClient};
use crate::config::AdvisorConfig;
use crate::error::AdvisorError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Groq,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Groq => "groq",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google" | "gemini" => Some(Provider::Google),
            "groq" => Some(Provider::Groq),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-driven backend router
pub struct BackendRouter {
    active: Arc<dyn GenerativeBackend>,
    available: Vec<Provider>,
}

impl fmt::Debug for BackendRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRouter")
            .field("available", &self.available)
            .finish_non_exhaustive()
    }
}

impl BackendRouter {
    /// Build the router from explicit configuration.
    /// Fails with [`AdvisorError::BackendUnavailable`] when no provider has
    /// an API key — the pipeline must not start without a working backend.
    pub fn from_config(config: &AdvisorConfig) -> Result<Self> {
        let mut backends: Vec<(Provider, Arc<dyn GenerativeBackend>)> = Vec::new();

        if let Some(key) = &config.google_api_key {
            match GeminiClient::new(key.clone(), config.request_timeout_secs) {
                Ok(client) => {
                    info!("Google backend initialized");
                    backends.push((Provider::Google, Arc::new(client)));
                }
                Err(e) => warn!("Failed to initialize Google backend: {}", e),
            }
        }

        if let Some(key) = &config.groq_api_key {
            match GroqClient::new(key.clone(), config.request_timeout_secs) {
                Ok(client) => {
                    info!("Groq backend initialized");
                    backends.push((Provider::Groq, Arc::new(client)));
                }
                Err(e) => warn!("Failed to initialize Groq backend: {}", e),
            }
        }

        if backends.is_empty() {
            return Err(AdvisorError::BackendUnavailable(
                "no provider API key configured (set GOOGLE_API_KEY or GROQ_API_KEY)".to_string(),
            ));
        }

        let available: Vec<Provider> = backends.iter().map(|(p, _)| *p).collect();

        let selected = config
            .preferred_provider
            .and_then(|preferred| {
                backends
                    .iter()
                    .position(|(provider, _)| *provider == preferred)
            })
            .unwrap_or(0);

        let (provider, active) = backends.swap_remove(selected);
        info!(provider = %provider, "Backend selected");

        Ok(Self { active, available })
    }

    pub fn available_providers(&self) -> &[Provider] {
        &self.available
    }
}

#[async_trait::async_trait]
impl GenerativeBackend for BackendRouter {
    fn provider(&self) -> &'static str {
        self.active.provider()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.active.generate(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_keys_is_fatal() {
        let config = AdvisorConfig::default();
        let err = BackendRouter::from_config(&config).unwrap_err();
        assert!(matches!(err, AdvisorError::BackendUnavailable(_)));
    }

    #[test]
    fn test_first_available_wins_without_preference() {
        let config = AdvisorConfig {
            google_api_key: Some("test-key".to_string()),
            groq_api_key: Some("test-key".to_string()),
            ..AdvisorConfig::default()
        };
        let router = BackendRouter::from_config(&config).unwrap();
        assert_eq!(router.provider(), "gemini");
        assert_eq!(
            router.available_providers(),
            &[Provider::Google, Provider::Groq]
        );
    }

    #[test]
    fn test_preferred_provider_is_honored() {
        let config = AdvisorConfig {
            google_api_key: Some("test-key".to_string()),
            groq_api_key: Some("test-key".to_string()),
            preferred_provider: Some(Provider::Groq),
            ..AdvisorConfig::default()
        };
        let router = BackendRouter::from_config(&config).unwrap();
        assert_eq!(router.provider(), "groq");
    }
}
