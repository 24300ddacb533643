//! Ordered provider resolution.
//!
//! Strategies are tried in sequence; the first one whose configuration is
//! usable wins. When none matches the front-end shows its terminal
//! "API unsupported" state without ever checking availability.

use crate::config::ChatConfig;
use crate::provider::api::ApiProvider;
use crate::provider::local::LocalProvider;
use crate::provider::LanguageProvider;
use tracing::info;

/// A single provider-resolution strategy.
pub trait ProviderStrategy: Send + Sync {
    /// Strategy name used in logs.
    fn name(&self) -> &'static str;

    /// Build a provider if the configuration enables this strategy.
    fn detect(&self, config: &ChatConfig) -> Option<Box<dyn LanguageProvider>>;
}

/// Local GGUF inference, preferred when a model is configured.
struct LocalStrategy;

impl ProviderStrategy for LocalStrategy {
    fn name(&self) -> &'static str {
        "local"
    }

    fn detect(&self, config: &ChatConfig) -> Option<Box<dyn LanguageProvider>> {
        if config.llm.model_id.is_empty() || config.llm.gguf_file.is_empty() {
            return None;
        }
        Some(Box::new(LocalProvider::new(
            config.llm.clone(),
            config.models.clone(),
        )))
    }
}

/// OpenAI-compatible HTTP endpoint, used when a base URL is configured.
struct ApiStrategy;

impl ProviderStrategy for ApiStrategy {
    fn name(&self) -> &'static str {
        "api"
    }

    fn detect(&self, config: &ChatConfig) -> Option<Box<dyn LanguageProvider>> {
        let base_url = config.api.base_url.clone()?;
        Some(Box::new(ApiProvider::new(
            base_url,
            config.api.model.clone(),
            config.api.api_key.clone(),
            config.llm.clone(),
        )))
    }
}

/// Tries an ordered list of strategies; first match wins.
pub struct ProviderResolver {
    strategies: Vec<Box<dyn ProviderStrategy>>,
}

impl Default for ProviderResolver {
    fn default() -> Self {
        Self {
            strategies: vec![Box::new(LocalStrategy), Box::new(ApiStrategy)],
        }
    }
}

impl ProviderResolver {
    /// Build a resolver with a custom strategy order.
    pub fn with_strategies(strategies: Vec<Box<dyn ProviderStrategy>>) -> Self {
        Self { strategies }
    }

    /// Resolve the first matching provider, or `None` when no strategy matches.
    pub fn resolve(&self, config: &ChatConfig) -> Option<Box<dyn LanguageProvider>> {
        for strategy in &self.strategies {
            if let Some(provider) = strategy.detect(config) {
                info!(strategy = strategy.name(), "resolved language model provider");
                return Some(provider);
            }
        }
        None
    }
}
