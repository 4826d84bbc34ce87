//! Registry for managing source adapters.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{
    ArxivSource, BioactivitySource, CompoundSearchSource, PubMedSource, Source,
    TargetSearchSource, TavilySource, TrialLookupSource, TrialSearchSource,
};
use crate::config::{Config, ConfigError};
use crate::utils::HttpClient;

/// Provider names accepted by [`SourceRegistry::retain_providers`]
pub const PROVIDERS: &[&str] = &["pubmed", "arxiv", "chembl", "clinicaltrials", "tavily"];

/// Registry of all available source adapters, keyed by tool name
///
/// Tools are kept sorted by name so listings are stable.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every adapter, sharing one HTTP client
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let client = HttpClient::new(&config.http)?;
        let mut registry = Self::new();

        registry.register(Arc::new(PubMedSource::new(&config.pubmed, client.clone())?));
        registry.register(Arc::new(ArxivSource::new(&config.arxiv, client.clone())));
        registry.register(Arc::new(CompoundSearchSource::new(&config.chembl, client.clone())));
        registry.register(Arc::new(TargetSearchSource::new(&config.chembl, client.clone())));
        registry.register(Arc::new(BioactivitySource::new(&config.chembl, client.clone())?));
        registry.register(Arc::new(TrialSearchSource::new(
            &config.clinical_trials,
            client.clone(),
        )));
        registry.register(Arc::new(TrialLookupSource::new(
            &config.clinical_trials,
            client.clone(),
        )?));
        registry.register(Arc::new(TavilySource::new(&config.tavily, client)));

        if config.tavily.api_key.is_none() {
            tracing::warn!("TAVILY_API_KEY is not set; web_search calls will fail");
        }

        Ok(registry)
    }

    /// Register a new source, replacing any source with the same tool name
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.id().to_string(), source);
    }

    /// Get a source by tool name
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.get(id)
    }

    /// Get all registered sources
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.values()
    }

    /// Get all tool names
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(|s| s.as_str())
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Keep only the tools of the named providers
    pub fn retain_providers(&mut self, providers: &[String]) -> Result<(), ConfigError> {
        if let Some(unknown) = providers.iter().find(|p| !PROVIDERS.contains(&p.as_str())) {
            return Err(ConfigError::invalid(
                "source",
                format!("unknown provider '{}', expected one of: {}", unknown, PROVIDERS.join(", ")),
            ));
        }

        self.sources
            .retain(|_, source| providers.iter().any(|p| p == source.provider()));
        Ok(())
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
