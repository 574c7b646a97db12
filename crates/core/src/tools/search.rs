//! # Web Search
//!
//! Search providers used by the research aggregator.
//!
//! Providers return a JSON array of hits shaped as
//! `{ "title", "snippet", "source", "date", "url" }`. Anything that is not an
//! array is treated by callers as zero results.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{ScoutError, ScoutResult};

/// Web search collaborator
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search for `query`, returning at most `max_results` hits
    async fn search(&self, query: &str, max_results: usize) -> ScoutResult<Value>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Host part of a URL, used as the hit's source
fn source_of(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .to_string()
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

fn http_client(user_agent: &str) -> ScoutResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ScoutError::search(format!("Failed to create HTTP client: {}", e)))
}

// ============================================================================
// SearXNG
// ============================================================================

/// Metasearch through SearXNG instances
///
/// Endpoints are tried in order: the configured URL (or `SEARXNG_URL`), a few
/// public instances, then a local instance on port 8888.
pub struct SearxngSearch {
    endpoints: Vec<String>,
    client: reqwest::Client,
}

impl SearxngSearch {
    pub fn new(base_url: Option<&str>) -> ScoutResult<Self> {
        let mut endpoints: Vec<String> = Vec::new();

        let configured = base_url
            .map(str::to_string)
            .or_else(|| std::env::var("SEARXNG_URL").ok());
        if let Some(url) = configured {
            endpoints.push(format!("{}/search", url.trim_end_matches('/')));
        }

        // Full list: https://searx.space/
        endpoints.extend([
            "https://searx.be/search".to_string(),
            "https://search.sapti.me/search".to_string(),
            "https://searx.tiekoetter.com/search".to_string(),
        ]);
        endpoints.push("http://localhost:8888/search".to_string());

        Ok(Self {
            endpoints,
            client: http_client("scout-research/1.0")?,
        })
    }

    /// Map a SearXNG `results` array onto the common hit shape
    fn normalize(results: &[Value], max_results: usize) -> Value {
        let hits: Vec<Value> = results
            .iter()
            .take(max_results)
            .map(|r| {
                let url = str_field(r, "url");
                json!({
                    "title": str_field(r, "title"),
                    "snippet": str_field(r, "content"),
                    "source": source_of(url),
                    "date": str_field(r, "publishedDate"),
                    "url": url,
                })
            })
            .collect();
        Value::Array(hits)
    }
}

#[async_trait]
impl SearchProvider for SearxngSearch {
    async fn search(&self, query: &str, max_results: usize) -> ScoutResult<Value> {
        for endpoint in &self.endpoints {
            let url = format!("{}?q={}&format=json", endpoint, urlencoding::encode(query));

            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!("SearXNG endpoint {} unavailable: {}", endpoint, e);
                    continue;
                }
            };
            if let Ok(payload) = response.json::<Value>().await {
                if let Some(results) = payload.get("results").and_then(|r| r.as_array()) {
                    return Ok(Self::normalize(results, max_results));
                }
            }
        }

        Err(ScoutError::search(
            "No SearXNG endpoint answered. Set SEARXNG_URL to a reachable instance.",
        ))
    }

    fn name(&self) -> &'static str {
        "searxng"
    }
}

// ============================================================================
// Serper (Google results)
// ============================================================================

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";

/// Google search results through serper.dev
pub struct SerperSearch {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl SerperSearch {
    pub fn new(api_key: impl Into<String>) -> ScoutResult<Self> {
        Ok(Self {
            api_key: api_key.into(),
            endpoint: SERPER_ENDPOINT.to_string(),
            client: http_client("scout-research/1.0")?,
        })
    }

    /// Build from `SERPER_API_KEY`
    pub fn from_env() -> ScoutResult<Self> {
        let key = std::env::var("SERPER_API_KEY").map_err(|_| ScoutError::Config {
            message: "SERPER_API_KEY is not set".to_string(),
        })?;
        Self::new(key)
    }

    fn normalize(organic: &[Value], max_results: usize) -> Value {
        let hits: Vec<Value> = organic
            .iter()
            .take(max_results)
            .map(|r| {
                let url = str_field(r, "link");
                json!({
                    "title": str_field(r, "title"),
                    "snippet": str_field(r, "snippet"),
                    "source": source_of(url),
                    "date": str_field(r, "date"),
                    "url": url,
                })
            })
            .collect();
        Value::Array(hits)
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    async fn search(&self, query: &str, max_results: usize) -> ScoutResult<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": max_results }))
            .send()
            .await
            .map_err(|e| ScoutError::search(format!("Failed to query serper.dev: {}", e)))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ScoutError::search(format!("Failed to parse serper.dev response: {}", e)))?;

        // A payload without organic results is passed through as-is
        match payload.get("organic").and_then(|o| o.as_array()) {
            Some(organic) => Ok(Self::normalize(organic, max_results)),
            None => Ok(payload),
        }
    }

    fn name(&self) -> &'static str {
        "serper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_of_url() {
        assert_eq!(source_of("https://www.reuters.com/markets/x"), "reuters.com");
        assert_eq!(source_of("techcrunch.com/2024/01"), "techcrunch.com");
        assert_eq!(source_of(""), "");
    }

    #[test]
    fn test_searxng_normalize_limits_and_maps() {
        let results = vec![
            json!({"title": "A", "content": "alpha", "url": "https://a.com/1", "publishedDate": "2024-01-01"}),
            json!({"title": "B", "content": "beta", "url": "https://b.com/2"}),
        ];
        let hits = SearxngSearch::normalize(&results, 1);
        let hits = hits.as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["snippet"], "alpha");
        assert_eq!(hits[0]["source"], "a.com");
        assert_eq!(hits[0]["date"], "2024-01-01");
    }

    #[test]
    fn test_serper_normalize() {
        let organic = vec![json!({
            "title": "Payments market",
            "link": "https://www.statista.com/payments",
            "snippet": "The market grew 20%",
            "date": "Mar 2, 2024"
        })];
        let hits = SerperSearch::normalize(&organic, 5);
        assert_eq!(hits[0]["source"], "statista.com");
        assert_eq!(hits[0]["snippet"], "The market grew 20%");
    }
}
