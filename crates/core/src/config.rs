//! # Scout Configuration
//!
//! Persisted settings at `.scout/config.json`. Every field is optional in the
//! file; accessors apply the defaults. CLI flags and API requests are merged
//! on top with [`ScoutConfig::merge`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{LlmProvider, ModelConfig};
use crate::skills::{AnalysisMode, DecodeStrategy};
use crate::swarm::coordinator::FailurePolicy;
use crate::swarm::pipeline::StageKind;

/// Default location of the config file, relative to the working directory
pub const CONFIG_PATH: &str = ".scout/config.json";

pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RESULTS_PER_QUERY: usize = 5;

/// Web search backend used by the research aggregator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    #[default]
    Searxng,
    /// serper.dev, needs `SERPER_API_KEY`
    Serper,
}

impl SearchBackend {
    pub fn from_name(name: &str) -> Option<SearchBackend> {
        match name.trim().to_lowercase().as_str() {
            "searxng" => Some(SearchBackend::Searxng),
            "serper" | "google" => Some(SearchBackend::Serper),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoutConfig {
    /// Global LLM provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<LlmProvider>,
    /// Global model for all stages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Base URL for OpenAI-compatible endpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Per-stage provider overrides (stage key -> provider)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_stage_providers: HashMap<String, LlmProvider>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_stage_models: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_stage_base_urls: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<AnalysisMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<DecodeStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,
    /// Budget for each completion or search call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_per_query: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_backend: Option<SearchBackend>,
    /// Custom SearXNG instance URL (overrides auto-discovery)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searxng_url: Option<String>,
    /// JSON logistic model; the built-in weights are used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier_model_path: Option<PathBuf>,
}

impl ScoutConfig {
    /// Load from [`CONFIG_PATH`]. A missing or unreadable file yields the defaults.
    pub async fn load() -> Self {
        Self::load_from(Path::new(CONFIG_PATH)).await
    }

    pub async fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config at {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Could not read config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub async fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(Path::new(CONFIG_PATH)).await
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(path, content).await
    }

    /// Overlay every field set in `other`
    pub fn merge(&mut self, other: ScoutConfig) {
        if other.provider.is_some() {
            self.provider = other.provider;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.mode.is_some() {
            self.mode = other.mode;
        }
        if other.strategy.is_some() {
            self.strategy = other.strategy;
        }
        if other.failure_policy.is_some() {
            self.failure_policy = other.failure_policy;
        }
        if other.call_timeout_secs.is_some() {
            self.call_timeout_secs = other.call_timeout_secs;
        }
        if other.results_per_query.is_some() {
            self.results_per_query = other.results_per_query;
        }
        if other.search_backend.is_some() {
            self.search_backend = other.search_backend;
        }
        if other.searxng_url.is_some() {
            self.searxng_url = other.searxng_url;
        }
        if other.classifier_model_path.is_some() {
            self.classifier_model_path = other.classifier_model_path;
        }
        self.per_stage_providers.extend(other.per_stage_providers);
        self.per_stage_models.extend(other.per_stage_models);
        self.per_stage_base_urls.extend(other.per_stage_base_urls);
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode.unwrap_or_default()
    }

    pub fn strategy(&self) -> DecodeStrategy {
        self.strategy.unwrap_or_default()
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy.unwrap_or_default()
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(
            self.call_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_CALL_TIMEOUT_SECS),
        )
    }

    pub fn results_per_query(&self) -> usize {
        self.results_per_query
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_RESULTS_PER_QUERY)
    }

    pub fn search_backend(&self) -> SearchBackend {
        self.search_backend.unwrap_or_default()
    }

    /// Model for a stage: per-stage override, then global, then the provider default.
    /// Base URLs are only kept for providers that accept one.
    pub fn model_config(&self, stage: StageKind) -> ModelConfig {
        let key = stage.as_str();

        let provider = self
            .per_stage_providers
            .get(key)
            .cloned()
            .or_else(|| self.provider.clone())
            .unwrap_or_default();

        let model = self
            .per_stage_models
            .get(key)
            .or(self.model.as_ref())
            .cloned()
            .unwrap_or_else(|| provider.default_model().to_string());

        let base_url = if provider.supports_base_url() {
            self.per_stage_base_urls
                .get(key)
                .or(self.base_url.as_ref())
                .cloned()
        } else {
            None
        };

        ModelConfig {
            provider,
            model,
            base_url,
        }
    }

    /// Whether any stage resolves to a different model than the global one
    pub fn has_stage_overrides(&self) -> bool {
        !self.per_stage_providers.is_empty()
            || !self.per_stage_models.is_empty()
            || !self.per_stage_base_urls.is_empty()
    }
}
