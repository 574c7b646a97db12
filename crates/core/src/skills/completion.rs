//! # Completion Client
//!
//! The generative-text collaborator every skill talks to.
//!
//! [`CompletionClient`] is the seam: production runs use [`LlmCompletion`]
//! (radkit providers), tests use scripted stubs. Skills never hold a client
//! directly; they go through a [`Completer`], which adds the per-call timeout
//! and typed decoding of structured responses.

use async_trait::async_trait;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ScoutError, ScoutResult};
use crate::models::ModelConfig;
use crate::run_llm_function;
use crate::skills::records::{
    CategoryBreakdown, FinalDecision, FounderAnalysis, IdeaFit, MarketAnalysis, ProductAnalysis,
    StartupRecord,
};

/// Generative-text completion service
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Free-text completion
    async fn complete(&self, system: &str, user: &str) -> ScoutResult<String>;

    /// Schema-constrained completion as raw JSON, for clients without a
    /// typed backend
    async fn complete_json(
        &self,
        _system: &str,
        _schema: &Value,
        _prompt: &str,
    ) -> ScoutResult<Value> {
        Err(ScoutError::completion("untyped JSON completion not supported"))
    }

    /// Model that can produce [`StructuredOutput`] records directly
    fn typed_model(&self) -> Option<&ModelConfig> {
        None
    }
}

/// Records the completion service returns as typed output
#[async_trait]
pub trait StructuredOutput: DeserializeOwned + JsonSchema + Send + Sized + 'static {
    async fn generate(config: &ModelConfig, input: String) -> anyhow::Result<Self>;
}

/// Typed radkit output for each record, via `LlmFunction<T>`
macro_rules! structured_output {
    ($($record:ty),* $(,)?) => {$(
        #[async_trait]
        impl StructuredOutput for $record {
            async fn generate(config: &ModelConfig, input: String) -> anyhow::Result<Self> {
                run_llm_function!(config, $record, STRUCTURED_PROMPT, input)
            }
        }
    )*};
}

structured_output!(
    StartupRecord,
    CategoryBreakdown,
    MarketAnalysis,
    ProductAnalysis,
    FounderAnalysis,
    IdeaFit,
    FinalDecision,
);

// ============================================================================
// Completer
// ============================================================================

/// Timeout-bounded, typed front for a [`CompletionClient`]
#[derive(Clone)]
pub struct Completer {
    client: Arc<dyn CompletionClient>,
    timeout: Duration,
}

impl Completer {
    pub fn new(client: Arc<dyn CompletionClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Free-text completion. Blank replies count as failures.
    pub async fn text(&self, operation: &str, system: &str, user: &str) -> ScoutResult<String> {
        let reply = tokio::time::timeout(self.timeout, self.client.complete(system, user))
            .await
            .map_err(|_| ScoutError::timeout(operation, self.timeout))??;

        if reply.trim().is_empty() {
            return Err(ScoutError::completion(format!(
                "{}: empty response",
                operation
            )));
        }
        tracing::debug!(operation, chars = reply.len(), "completion received");
        Ok(reply)
    }

    /// Structured completion decoded into `T`.
    ///
    /// Typed clients go through radkit's structured output. Other clients
    /// answer with JSON, and a value of the wrong shape is a
    /// [`ScoutError::Decode`].
    pub async fn structured<T>(&self, operation: &str, system: &str, prompt: &str) -> ScoutResult<T>
    where
        T: StructuredOutput,
    {
        let call = async {
            match self.client.typed_model() {
                Some(config) => {
                    let input = format!("{}\n\n---\n\n{}", system.trim(), prompt);
                    T::generate(config, input).await.map_err(|e| {
                        ScoutError::completion(format!(
                            "{}: {} ({:?}/{})",
                            type_label::<T>(),
                            e,
                            config.provider,
                            config.model
                        ))
                    })
                }
                None => {
                    let schema = serde_json::to_value(schemars::schema_for!(T))?;
                    let value = self.client.complete_json(system, &schema, prompt).await?;
                    serde_json::from_value(value)
                        .map_err(|e| ScoutError::decode(type_label::<T>(), e.to_string()))
                }
            }
        };

        let record = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ScoutError::timeout(operation, self.timeout))??;
        tracing::debug!(operation, record = type_label::<T>(), "structured completion received");
        Ok(record)
    }
}

/// Last path segment of a type name, for error messages
fn type_label<T>() -> String {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full).to_string()
}

// ============================================================================
// radkit-backed client
// ============================================================================

const COMPLETION_PROMPT: &str = "You are a careful venture capital research assistant. \
Follow the role and instructions given at the top of each message exactly. \
Put your whole answer in the `text` field.";

const STRUCTURED_PROMPT: &str = "You are a careful venture capital research assistant. \
Follow the role and instructions given at the top of each message exactly and \
fill every field of the requested record.";

/// Wrapper output for free-text calls
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct TextResponse {
    /// The complete response
    pub text: String,
}

/// [`CompletionClient`] backed by radkit providers
///
/// API keys come from the provider's environment variable (see
/// [`crate::models::LlmProvider`]).
#[derive(Debug, Clone)]
pub struct LlmCompletion {
    config: ModelConfig,
}

impl LlmCompletion {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionClient for LlmCompletion {
    async fn complete(&self, system: &str, user: &str) -> ScoutResult<String> {
        let input = format!("{}\n\n---\n\n{}", system.trim(), user);
        let result: anyhow::Result<String> = async {
            let response = run_llm_function!(&self.config, TextResponse, COMPLETION_PROMPT, input)?;
            Ok(response.text)
        }
        .await;

        result.map_err(|e| {
            ScoutError::completion(format!(
                "{} ({:?}/{})",
                e, self.config.provider, self.config.model
            ))
        })
    }

    fn typed_model(&self) -> Option<&ModelConfig> {
        Some(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::records::FounderAnalysis;
    use crate::testing::{FailingCompletion, ScriptedCompletion};
    use serde_json::json;

    #[tokio::test]
    async fn test_structured_decodes_typed_record() {
        let stub = ScriptedCompletion::new().with_json(json!({
            "competency_score": 8,
            "analysis": "Experienced team",
            "strengths": "Payments background",
            "challenges": "No sales lead"
        }));
        let completer = Completer::new(Arc::new(stub), Duration::from_secs(5));

        let founder: FounderAnalysis = completer.structured("founder", "sys", "prompt").await.unwrap();
        assert_eq!(founder.competency_score, 8);
    }

    #[tokio::test]
    async fn test_wrong_shape_is_decode_error() {
        let stub = ScriptedCompletion::new().with_json(json!({"unexpected": true}));
        let completer = Completer::new(Arc::new(stub), Duration::from_secs(5));

        let err = completer
            .structured::<FounderAnalysis>("founder", "sys", "prompt")
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::Decode { ref expected, .. } if expected == "FounderAnalysis"));
    }

    #[test]
    fn test_radkit_client_is_typed() {
        let config = ModelConfig::default();
        let client = LlmCompletion::new(config.clone());
        assert_eq!(client.typed_model(), Some(&config));
        assert!(FailingCompletion.typed_model().is_none());
    }

    #[tokio::test]
    async fn test_blank_text_is_failure() {
        let stub = ScriptedCompletion::new().with_text("   ");
        let completer = Completer::new(Arc::new(stub), Duration::from_secs(5));
        assert!(completer.text("market", "sys", "user").await.is_err());
    }

    #[tokio::test]
    async fn test_slow_client_times_out() {
        let stub = ScriptedCompletion::new()
            .with_text("late")
            .with_delay(Duration::from_millis(200));
        let completer = Completer::new(Arc::new(stub), Duration::from_millis(20));

        let err = completer.text("market", "sys", "user").await.unwrap_err();
        assert!(matches!(err, ScoutError::Timeout { .. }));
    }

    #[test]
    fn test_failing_client_propagates() {
        let completer = Completer::new(Arc::new(FailingCompletion), Duration::from_secs(1));
        let err = tokio_test::block_on(completer.text("market", "sys", "user")).unwrap_err();
        assert!(matches!(err, ScoutError::Completion { .. }));
    }
}
