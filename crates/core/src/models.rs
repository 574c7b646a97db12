//! # Scout Models
//!
//! LLM provider selection for the completion collaborator.
//! Every analysis stage can run on its own provider/model pair; the
//! resolution rules live in [`crate::config::ScoutConfig::model_config`].

use serde::{Deserialize, Serialize};

/// Supported LLM providers
///
/// API keys are read from the environment by the provider clients:
/// - Anthropic (Claude) - `ANTHROPIC_API_KEY`
/// - OpenAI (GPT) - `OPENAI_API_KEY`
/// - Gemini (Google) - `GEMINI_API_KEY`
/// - OpenRouter (Gateway) - `OPENROUTER_API_KEY`
/// - Grok (xAI) - `XAI_API_KEY`
/// - DeepSeek - `DEEPSEEK_API_KEY`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    Gemini,
    OpenRouter,
    Grok,
    DeepSeek,
}

impl LlmProvider {
    pub fn all() -> Vec<LlmProvider> {
        vec![
            LlmProvider::OpenAI,
            LlmProvider::Anthropic,
            LlmProvider::Gemini,
            LlmProvider::OpenRouter,
            LlmProvider::Grok,
            LlmProvider::DeepSeek,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::Anthropic => "Anthropic",
            LlmProvider::Gemini => "Gemini",
            LlmProvider::OpenRouter => "OpenRouter",
            LlmProvider::Grok => "Grok",
            LlmProvider::DeepSeek => "DeepSeek",
        }
    }

    /// Model used when neither the stage nor the run names one
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "gpt-4o-mini",
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::Gemini => "gemini-2.0-flash",
            LlmProvider::OpenRouter => "openai/gpt-4o-mini",
            LlmProvider::Grok => "grok-2",
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }

    /// Environment variable the provider client reads its API key from
    pub fn env_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Grok => "XAI_API_KEY",
            LlmProvider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    /// Config/API identifier (matches the serde name)
    pub fn id(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Gemini => "gemini",
            LlmProvider::OpenRouter => "openrouter",
            LlmProvider::Grok => "grok",
            LlmProvider::DeepSeek => "deepseek",
        }
    }

    /// Whether this provider supports custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI)
    }

    /// Parse a provider name as written in config files and CLI flags
    pub fn from_name(name: &str) -> Option<LlmProvider> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Some(LlmProvider::OpenAI),
            "anthropic" | "claude" => Some(LlmProvider::Anthropic),
            "gemini" | "google" => Some(LlmProvider::Gemini),
            "openrouter" => Some(LlmProvider::OpenRouter),
            "grok" | "xai" => Some(LlmProvider::Grok),
            "deepseek" => Some(LlmProvider::DeepSeek),
            _ => None,
        }
    }
}

/// Provider/model pair for one completion client
///
/// ## Example
/// ```rust,ignore
/// use scout_core::models::{ModelConfig, LlmProvider};
///
/// let config = ModelConfig::with_provider(LlmProvider::Anthropic, "claude-sonnet-4-20250514");
/// let client = scout_core::skills::LlmCompletion::new(config);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "gpt-4o-mini", "claude-sonnet-4-20250514")
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let provider = LlmProvider::default();
        Self {
            model: provider.default_model().to_string(),
            provider,
            base_url: None,
        }
    }
}

impl ModelConfig {
    /// Create a new model config with the default provider
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::default(),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }

    /// Set base URL (ignored by providers without base URL support)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        if self.provider.supports_base_url() {
            self.base_url = Some(url.into());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, LlmProvider::OpenAI);
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn test_provider_id_matches_serde_name() {
        for provider in LlmProvider::all() {
            let json = serde_json::to_string(&provider).unwrap();
            assert_eq!(json, format!("\"{}\"", provider.id()));
            assert_eq!(LlmProvider::from_name(provider.id()), Some(provider.clone()));
        }
    }

    #[test]
    fn test_provider_from_name() {
        assert_eq!(LlmProvider::from_name("Claude"), Some(LlmProvider::Anthropic));
        assert_eq!(LlmProvider::from_name(" openai "), Some(LlmProvider::OpenAI));
        assert_eq!(LlmProvider::from_name("watson"), None);
    }

    #[test]
    fn test_base_url_only_for_supported_providers() {
        let openai = ModelConfig::new("gpt-4o").with_base_url("http://localhost:11434/v1");
        assert!(openai.base_url.is_some());

        let gemini = ModelConfig::with_provider(LlmProvider::Gemini, "gemini-2.0-flash")
            .with_base_url("http://localhost:1234");
        assert!(gemini.base_url.is_none());
    }

    #[test]
    fn test_model_config_serialization() {
        let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("openai"));
        assert!(json.contains("gpt-4o"));
    }
}
