//! Model identifier to provider lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{BatchError, BatchResult};
use crate::providers::{
    BrightDataApi, ChatGptAdapter, GeminiAdapter, LinkupAdapter, PerplexityAdapter,
};
use crate::traits::adapter::ProviderAdapter;
use crate::traits::backend::JobBackend;

/// How prompts for a model are executed.
#[derive(Clone)]
pub enum ProviderRoute {
    /// Asynchronous job protocol: submit, poll, fetch, reconcile
    Job {
        adapter: Arc<dyn ProviderAdapter>,
        backend: Arc<dyn JobBackend>,
    },
    /// One synchronous call per prompt
    Direct { adapter: Arc<dyn ProviderAdapter> },
}

impl ProviderRoute {
    pub fn adapter(&self) -> &Arc<dyn ProviderAdapter> {
        match self {
            ProviderRoute::Job { adapter, .. } | ProviderRoute::Direct { adapter } => adapter,
        }
    }
}

/// Registered providers keyed by lower-cased model identifier.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    routes: HashMap<String, ProviderRoute>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every provider whose credentials are configured.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut registry = Self::new();

        if let Some(key) = &config.brightdata_api_key {
            let api = Arc::new(BrightDataApi::new(key.clone()).with_base_url(&config.brightdata_base_url));
            let backend: Arc<dyn JobBackend> = api.clone();

            if let Some(dataset) = &config.chatgpt_dataset_id {
                registry.register_job(
                    "chatgpt",
                    Arc::new(ChatGptAdapter::new(api.clone(), dataset)),
                    backend.clone(),
                );
            }
            if let Some(dataset) = &config.perplexity_dataset_id {
                registry.register_job(
                    "perplexity",
                    Arc::new(PerplexityAdapter::new(api.clone(), dataset)),
                    backend.clone(),
                );
            }
            if let Some(dataset) = &config.gemini_dataset_id {
                registry.register_job(
                    "gemini",
                    Arc::new(GeminiAdapter::new(api.clone(), dataset)),
                    backend,
                );
            }
        }

        if let Some(key) = &config.linkup_api_key {
            let adapter = LinkupAdapter::new(key.clone()).with_base_url(&config.linkup_base_url);
            registry.register_direct("linkup", Arc::new(adapter));
        }

        registry
    }

    pub fn register(&mut self, model: impl AsRef<str>, route: ProviderRoute) -> &mut Self {
        self.routes.insert(normalize_model(model.as_ref()), route);
        self
    }

    pub fn register_job(
        &mut self,
        model: impl AsRef<str>,
        adapter: Arc<dyn ProviderAdapter>,
        backend: Arc<dyn JobBackend>,
    ) -> &mut Self {
        self.register(model, ProviderRoute::Job { adapter, backend })
    }

    pub fn register_direct(&mut self, model: impl AsRef<str>, adapter: Arc<dyn ProviderAdapter>) -> &mut Self {
        self.register(model, ProviderRoute::Direct { adapter })
    }

    pub fn resolve(&self, model: &str) -> BatchResult<&ProviderRoute> {
        self.routes
            .get(&normalize_model(model))
            .ok_or_else(|| BatchError::UnknownModel(model.to_string()))
    }

    /// Registered model identifiers, sorted.
    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        models.sort_unstable();
        models
    }
}

/// Model identifiers match case-insensitively, ignoring surrounding whitespace.
pub fn normalize_model(model: &str) -> String {
    model.trim().to_lowercase()
}
