//! Builder for configuring gateway instances

use std::sync::Arc;
use std::time::Duration;

use super::{BackendResolver, InferenceGateway};
use crate::providers::{GenerateProvider, RetryPolicy};
use crate::types::{BackendId, Credential};
use crate::Result;

/// Models tried when none are configured, most capable first.
pub const DEFAULT_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.0-flash", "gemini-1.5-flash"];

/// Main entry point for creating gateway instances.
pub struct Kotoba;

impl Kotoba {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> KotobaBuilder {
        KotobaBuilder::new()
    }
}

/// Builder for configuring gateway instances.
pub struct KotobaBuilder {
    api_keys: Vec<String>,
    models: Vec<BackendId>,
    provider: Option<Arc<dyn GenerateProvider>>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    retry: RetryPolicy,
}

impl Default for KotobaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KotobaBuilder {
    pub fn new() -> Self {
        Self {
            api_keys: Vec::new(),
            models: Vec::new(),
            provider: None,
            base_url: None,
            timeout: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Append one API key. Keys are tried in the order they were added.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_keys.push(key.into());
        self
    }

    /// Append several API keys, highest priority first.
    pub fn api_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Append one model identifier. Models are tried in the order added.
    pub fn model(mut self, model: impl Into<BackendId>) -> Self {
        self.models.push(model.into());
        self
    }

    /// Append several model identifiers, most capable first.
    pub fn models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<BackendId>,
    {
        self.models.extend(models.into_iter().map(Into::into));
        self
    }

    /// Use a custom provider instead of the bundled Gemini client.
    pub fn provider(mut self, provider: Arc<dyn GenerateProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Override the Gemini base URL (proxies, tests).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the per-request HTTP timeout (seconds).
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }

    /// Set the retry policy shared by every invocation.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Build the gateway.
    ///
    /// No network traffic happens here. With no API keys the gateway still
    /// builds and reports `NoBackendAvailable` on first use.
    pub fn build(self) -> Result<InferenceGateway> {
        let provider = match self.provider {
            Some(provider) => provider,
            None => default_provider(self.base_url.as_deref(), self.timeout)?,
        };

        let models = if self.models.is_empty() {
            DEFAULT_MODELS.iter().copied().map(BackendId::from).collect()
        } else {
            self.models
        };

        let resolver = BackendResolver::new(provider, Credential::ranked(self.api_keys), models);
        Ok(InferenceGateway::new(resolver, self.retry))
    }
}

#[cfg(feature = "gemini")]
fn default_provider(
    base_url: Option<&str>,
    timeout: Option<Duration>,
) -> Result<Arc<dyn GenerateProvider>> {
    use crate::providers::gemini::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, GeminiClient};

    let client = GeminiClient::with_base_url(
        base_url.unwrap_or(DEFAULT_BASE_URL),
        timeout.unwrap_or(DEFAULT_TIMEOUT),
    )?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "gemini"))]
fn default_provider(
    _base_url: Option<&str>,
    _timeout: Option<Duration>,
) -> Result<Arc<dyn GenerateProvider>> {
    Err(crate::KotobaError::Configuration(
        "no provider configured (enable the `gemini` feature or call .provider())".into(),
    ))
}
