//! Scripted collaborator stubs shared by the unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{ScoutError, ScoutResult};
use crate::skills::completion::{Completer, CompletionClient};
use crate::skills::records::Prediction;
use crate::tools::classifier::{Classifier, FeatureVector};
use crate::tools::search::SearchProvider;

/// Wrap a stub in a [`Completer`] with a generous timeout
pub fn completer(client: impl CompletionClient + 'static) -> Completer {
    Completer::new(Arc::new(client), Duration::from_secs(5))
}

#[derive(Clone)]
enum Reply {
    Text(String),
    Json(Value),
    Fail,
}

/// Completion stub answering by substring rules.
///
/// Rules are matched in insertion order against the system prompt and the
/// user content. Text rules only answer `complete`, JSON rules only answer
/// `complete_json`. Unmatched calls fall back to the defaults, or fail.
#[derive(Default)]
pub struct ScriptedCompletion {
    rules: Vec<(String, Reply)>,
    default_text: Option<String>,
    default_json: Option<Value>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.default_text = Some(text.into());
        self
    }

    pub fn with_json(mut self, value: Value) -> Self {
        self.default_json = Some(value);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn on_text(mut self, needle: &str, text: impl Into<String>) -> Self {
        self.rules.push((needle.to_string(), Reply::Text(text.into())));
        self
    }

    pub fn on_json(mut self, needle: &str, value: Value) -> Self {
        self.rules.push((needle.to_string(), Reply::Json(value)));
        self
    }

    /// Fail every call whose prompt contains `needle`
    pub fn fail_on(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Reply::Fail));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn lookup(&self, system: &str, user: &str, json: bool) -> Option<Reply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.rules
            .iter()
            .filter(|(needle, _)| system.contains(needle.as_str()) || user.contains(needle.as_str()))
            .map(|(_, reply)| reply)
            .find(|reply| match reply {
                Reply::Text(_) => !json,
                Reply::Json(_) => json,
                Reply::Fail => true,
            })
            .cloned()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, system: &str, user: &str) -> ScoutResult<String> {
        match self.lookup(system, user, false).await {
            Some(Reply::Text(text)) => Ok(text),
            Some(_) => Err(ScoutError::completion("scripted failure")),
            None => self
                .default_text
                .clone()
                .ok_or_else(|| ScoutError::completion("no scripted text reply")),
        }
    }

    async fn complete_json(&self, system: &str, _schema: &Value, prompt: &str) -> ScoutResult<Value> {
        match self.lookup(system, prompt, true).await {
            Some(Reply::Json(value)) => Ok(value),
            Some(_) => Err(ScoutError::completion("scripted failure")),
            None => self
                .default_json
                .clone()
                .ok_or_else(|| ScoutError::completion("no scripted JSON reply")),
        }
    }
}

/// Completion stub that always fails
pub struct FailingCompletion;

#[async_trait]
impl CompletionClient for FailingCompletion {
    async fn complete(&self, _system: &str, _user: &str) -> ScoutResult<String> {
        Err(ScoutError::completion("service unavailable"))
    }

    async fn complete_json(&self, _system: &str, _schema: &Value, _prompt: &str) -> ScoutResult<Value> {
        Err(ScoutError::completion("service unavailable"))
    }
}

/// Search stub returning the same payload for every query
pub struct StaticSearch {
    payload: Option<Value>,
    queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn new(payload: Value) -> Self {
        Self {
            payload: Some(payload),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            payload: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, query: &str, _max_results: usize) -> ScoutResult<Value> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        self.payload
            .clone()
            .ok_or_else(|| ScoutError::search("search backend down"))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Classifier stub with a fixed answer
pub struct FixedClassifier(pub Option<Prediction>);

impl Classifier for FixedClassifier {
    fn predict(&self, _features: &FeatureVector) -> ScoutResult<Prediction> {
        self.0.ok_or_else(|| ScoutError::Classifier {
            message: "model not loaded".to_string(),
        })
    }
}
