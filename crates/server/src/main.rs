//! Scout Server
//!
//! CLI and axum API in front of the evaluation pipeline from crates/core.

use axum::{
    body::Body,
    http::{header, Response, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use scout_core::config::{ScoutConfig, SearchBackend};
use scout_core::models::LlmProvider;
use scout_core::skills::{AnalysisMode, DecodeStrategy};
use scout_core::swarm::{Coordinator, FailurePolicy, PipelineEvent, PipelineResult};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf};
use tokio::{net::TcpListener, sync::mpsc};
use tracing_subscriber::EnvFilter;
use utoipa::{OpenApi, ToSchema};

// === CLI ===

#[derive(Parser, Clone)]
#[command(author, version, about = "Scout - Startup evaluation pipeline")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the API server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Evaluate a startup description and print the result as JSON
    Analyze {
        /// Startup description (free text or a JSON record)
        text: Option<String>,
        /// Read the description from a file instead
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Analysis depth: basic, advanced or natural
        #[arg(short, long)]
        mode: Option<String>,
        /// Decoding strategy: direct or extract
        #[arg(short, long)]
        strategy: Option<String>,
        /// Stop after the first degraded stage
        #[arg(long)]
        abort_on_failure: bool,
    },
    /// Print the resolved configuration
    Config,
}

// === API Types ===

#[derive(Debug, Deserialize, ToSchema)]
struct AnalyzeRequest {
    /// Startup description (free text or a JSON record)
    text: String,
    /// basic, advanced or natural
    mode: Option<String>,
    /// direct or extract
    strategy: Option<String>,
    /// continue or abort
    failure_policy: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct AnalyzeResponse {
    success: bool,
    #[schema(value_type = Object)]
    result: PipelineResult,
}

#[derive(Serialize, ToSchema)]
struct ApiResponse {
    success: bool,
    message: String,
}

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Partial config update. Unset fields keep their persisted value.
#[derive(Debug, Default, Deserialize, ToSchema)]
struct ConfigUpdate {
    provider: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    mode: Option<String>,
    strategy: Option<String>,
    failure_policy: Option<String>,
    call_timeout_secs: Option<u64>,
    results_per_query: Option<usize>,
    search_backend: Option<String>,
    searxng_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
struct ConfigResponse {
    #[schema(value_type = Object)]
    config: ScoutConfig,
    defaults: ConfigDefaults,
}

#[derive(Debug, Serialize, ToSchema)]
struct ConfigDefaults {
    provider: &'static str,
    mode: &'static str,
    strategy: &'static str,
    failure_policy: &'static str,
    call_timeout_secs: u64,
    results_per_query: usize,
    search_backend: &'static str,
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default().id(),
            mode: "basic",
            strategy: "direct",
            failure_policy: "continue",
            call_timeout_secs: scout_core::config::DEFAULT_CALL_TIMEOUT_SECS,
            results_per_query: scout_core::config::DEFAULT_RESULTS_PER_QUERY,
            search_backend: "searxng",
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
struct ProviderInfo {
    id: String,
    name: String,
    default_model: String,
    supports_base_url: bool,
    env_var: String,
}

#[derive(Debug, Serialize, ToSchema)]
struct ProvidersResponse {
    providers: Vec<ProviderInfo>,
}

fn get_provider_info() -> Vec<ProviderInfo> {
    LlmProvider::all()
        .into_iter()
        .map(|p| ProviderInfo {
            id: p.id().to_string(),
            name: p.display_name().to_string(),
            default_model: p.default_model().to_string(),
            supports_base_url: p.supports_base_url(),
            env_var: p.env_var().to_string(),
        })
        .collect()
}

// === Overrides ===

/// Run-level overrides from CLI flags or an API request
fn overrides(
    mode: Option<&str>,
    strategy: Option<&str>,
    failure_policy: Option<&str>,
) -> anyhow::Result<ScoutConfig> {
    let mode = mode
        .map(|m| AnalysisMode::from_name(m).ok_or_else(|| anyhow::anyhow!("Unknown mode '{}'", m)))
        .transpose()?;
    let strategy = strategy
        .map(|s| {
            DecodeStrategy::from_name(s).ok_or_else(|| anyhow::anyhow!("Unknown strategy '{}'", s))
        })
        .transpose()?;
    let failure_policy = failure_policy
        .map(|p| {
            FailurePolicy::from_name(p)
                .ok_or_else(|| anyhow::anyhow!("Unknown failure policy '{}'", p))
        })
        .transpose()?;

    Ok(ScoutConfig {
        mode,
        strategy,
        failure_policy,
        ..ScoutConfig::default()
    })
}

impl ConfigUpdate {
    fn into_config(self) -> anyhow::Result<ScoutConfig> {
        let mut config = overrides(
            self.mode.as_deref(),
            self.strategy.as_deref(),
            self.failure_policy.as_deref(),
        )?;
        config.provider = self
            .provider
            .map(|p| LlmProvider::from_name(&p).ok_or_else(|| anyhow::anyhow!("Unknown provider '{}'", p)))
            .transpose()?;
        config.search_backend = self
            .search_backend
            .map(|b| {
                SearchBackend::from_name(&b).ok_or_else(|| anyhow::anyhow!("Unknown search backend '{}'", b))
            })
            .transpose()?;
        config.model = self.model;
        config.base_url = self.base_url;
        config.call_timeout_secs = self.call_timeout_secs;
        config.results_per_query = self.results_per_query;
        config.searxng_url = self.searxng_url;
        Ok(config)
    }
}

fn bad_request(message: impl ToString) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse {
            success: false,
            message: message.to_string(),
        }),
    )
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Scout API",
        version = "1.0.0",
        description = "API for the Scout startup evaluation pipeline"
    ),
    paths(health, analyze, get_config, update_config, get_providers),
    components(
        schemas(
            AnalyzeRequest,
            AnalyzeResponse,
            ApiResponse,
            HealthResponse,
            ConfigUpdate,
            ConfigResponse,
            ConfigDefaults,
            ProvidersResponse,
            ProviderInfo
        )
    ),
    tags(
        (name = "analysis", description = "Startup evaluation"),
        (name = "config", description = "Configuration management"),
        (name = "providers", description = "LLM provider discovery")
    )
)]
struct ApiDoc;

// === API Handlers ===

/// Liveness check
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "analysis",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Evaluate a startup description
#[utoipa::path(
    post,
    path = "/api/v1/analyze",
    tag = "analysis",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Pipeline result", body = AnalyzeResponse),
        (status = 400, description = "Invalid run settings", body = ApiResponse),
        (status = 422, description = "Input could not be parsed into a startup record", body = ApiResponse),
        (status = 500, description = "Collaborators could not be configured", body = ApiResponse)
    )
)]
async fn analyze(
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, (StatusCode, Json<ApiResponse>)> {
    let mut config = ScoutConfig::load().await;
    let run_overrides = overrides(
        req.mode.as_deref(),
        req.strategy.as_deref(),
        req.failure_policy.as_deref(),
    )
    .map_err(bad_request)?;
    config.merge(run_overrides);

    let coordinator = Coordinator::from_config(&config).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse {
                success: false,
                message: e.to_string(),
            }),
        )
    })?;

    match coordinator.run(&req.text).await {
        Ok(result) => Ok(Json(AnalyzeResponse {
            success: true,
            result,
        })),
        Err(e) => {
            let status = if e.is_fatal() {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            Err((
                status,
                Json(ApiResponse {
                    success: false,
                    message: e.to_string(),
                }),
            ))
        }
    }
}

/// Get current configuration
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Current configuration and defaults", body = ConfigResponse)
    )
)]
async fn get_config() -> Json<ConfigResponse> {
    let config = ScoutConfig::load().await;
    Json(ConfigResponse {
        config,
        defaults: ConfigDefaults::default(),
    })
}

/// Update configuration (partial merge)
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body = ConfigUpdate,
    responses(
        (status = 200, description = "Updated configuration", body = ConfigResponse),
        (status = 400, description = "Unknown setting value", body = ApiResponse)
    )
)]
async fn update_config(
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<ConfigResponse>, (StatusCode, Json<ApiResponse>)> {
    let updates = update.into_config().map_err(bad_request)?;
    let mut config = ScoutConfig::load().await;
    config.merge(updates);

    if let Err(e) = config.save().await {
        tracing::error!("Failed to save config: {}", e);
    }

    Ok(Json(ConfigResponse {
        config,
        defaults: ConfigDefaults::default(),
    }))
}

/// Get available LLM providers
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "providers",
    responses(
        (status = 200, description = "List of supported LLM providers", body = ProvidersResponse)
    )
)]
async fn get_providers() -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: get_provider_info(),
    })
}

// === OpenAPI Handler ===

async fn serve_openapi() -> impl IntoResponse {
    match ApiDoc::openapi().to_json() {
        Ok(json) => Response::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json))
            .unwrap_or_default(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// === Entry Points ===

fn router() -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/analyze", post(analyze))
        .route("/api/v1/config", get(get_config).patch(update_config))
        .route("/api/v1/providers", get(get_providers))
        .route("/api/v1/openapi.json", get(serve_openapi))
}

pub async fn run_server(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("Scout Server running at http://{}", addr);
    tracing::info!("API v1 routes: /api/v1/health, /analyze, /config, /providers, /openapi.json");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;

    Ok(())
}

async fn run_analyze(
    text: Option<String>,
    file: Option<PathBuf>,
    run_overrides: ScoutConfig,
) -> anyhow::Result<()> {
    let input = match (text, file) {
        (_, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?,
        (Some(text), None) => text,
        (None, None) => anyhow::bail!("Provide a description or --file"),
    };

    let mut config = ScoutConfig::load().await;
    config.merge(run_overrides);

    let (event_tx, mut event_rx) = mpsc::channel::<PipelineEvent>(64);
    let coordinator = Coordinator::from_config(&config)?.with_event_channel(event_tx);

    let progress = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            tracing::debug!(kind = ?event.kind, stage = ?event.stage, "pipeline event");
        }
    });

    let result = coordinator.run(&input).await;
    drop(coordinator);
    let _ = progress.await;

    let result = result?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Some(CliCommand::Analyze {
            text,
            file,
            mode,
            strategy,
            abort_on_failure,
        }) => {
            let policy = abort_on_failure.then_some("abort");
            let run_overrides = overrides(mode.as_deref(), strategy.as_deref(), policy)?;
            run_analyze(text, file, run_overrides).await
        }
        Some(CliCommand::Config) => {
            let config = ScoutConfig::load().await;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Some(CliCommand::Serve { port }) => run_server(port).await,
        None => run_server(8080).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_parse_names() {
        let config = overrides(Some("natural"), Some("extract"), Some("abort")).unwrap();
        assert_eq!(config.mode(), AnalysisMode::NaturalLanguageAdvanced);
        assert_eq!(config.strategy(), DecodeStrategy::Extract);
        assert_eq!(config.failure_policy(), FailurePolicy::Abort);

        assert!(overrides(Some("deep"), None, None).is_err());
        assert_eq!(overrides(None, None, None).unwrap(), ScoutConfig::default());
    }

    #[test]
    fn test_config_update_conversion() {
        let update = ConfigUpdate {
            provider: Some("claude".to_string()),
            search_backend: Some("serper".to_string()),
            results_per_query: Some(3),
            ..ConfigUpdate::default()
        };
        let config = update.into_config().unwrap();
        assert_eq!(config.provider, Some(LlmProvider::Anthropic));
        assert_eq!(config.search_backend(), SearchBackend::Serper);
        assert_eq!(config.results_per_query(), 3);

        let invalid = ConfigUpdate {
            provider: Some("watson".to_string()),
            ..ConfigUpdate::default()
        };
        assert!(invalid.into_config().is_err());
    }

    #[test]
    fn test_provider_info_covers_all_providers() {
        let providers = get_provider_info();
        assert_eq!(providers.len(), LlmProvider::all().len());
        let openai = providers.iter().find(|p| p.id == "openai").unwrap();
        assert!(openai.supports_base_url);
        assert_eq!(openai.env_var, "OPENAI_API_KEY");
    }

    #[test]
    fn test_openapi_lists_routes() {
        let json = ApiDoc::openapi().to_json().unwrap();
        assert!(json.contains("/api/v1/analyze"));
        assert!(json.contains("/api/v1/health"));
    }
}
