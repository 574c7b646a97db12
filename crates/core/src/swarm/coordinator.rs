//! # Swarm Coordinator
//!
//! Runs one evaluation from raw input to decision.
//!
//! ```text
//! parse ─► classify ─► ┌ market ──────┐
//!                      ├ product      │
//!                      ├ founder      ├─► integrate + quantify
//!                      ├ segmentation │
//!                      └ idea fit ────┘
//! ```
//!
//! Only a parse failure ends the run with an error. Every other stage
//! returns a value, possibly a degraded one, and its absorbed errors land in
//! [`PipelineResult::errors`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::config::{ScoutConfig, SearchBackend, DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_RESULTS_PER_QUERY};
use crate::error::{ScoutError, ScoutResult};
use crate::skills::records::{
    AnalysisRecord, FounderAnalysis, FounderLevel, IdeaFit, MarketOutput, ProductAnalysis, StartupRecord,
};
use crate::skills::{
    quantify, AnalysisMode, Completer, CompletionClient, DecodeStrategy, FounderSkill,
    IntegrationInputs, IntegrationSkill, LlmCompletion, MarketSkill, ProductSkill, ResearchSkill,
    ScoutSkill, StageOutcome,
};
use crate::tools::classifier::{Classifier, LogisticClassifier};
use crate::tools::search::{SearchProvider, SearxngSearch, SerperSearch};

use super::events::{PipelineEvent, PipelineEventKind, RunContext};
use super::pipeline::{Pipeline, StageKind};
use super::result::PipelineResult;

/// What to do when a stage falls back to a degraded value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep going and integrate whatever the stages produced
    #[default]
    Continue,
    /// Stop after the first degraded stage and return the partial result
    Abort,
}

impl FailurePolicy {
    pub fn from_name(name: &str) -> Option<FailurePolicy> {
        match name.trim().to_lowercase().as_str() {
            "continue" => Some(FailurePolicy::Continue),
            "abort" => Some(FailurePolicy::Abort),
            _ => None,
        }
    }
}

/// Run-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorSettings {
    pub mode: AnalysisMode,
    pub strategy: DecodeStrategy,
    pub failure_policy: FailurePolicy,
    /// Budget for each completion or search call
    pub call_timeout: Duration,
    pub results_per_query: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::default(),
            strategy: DecodeStrategy::default(),
            failure_policy: FailurePolicy::default(),
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            results_per_query: DEFAULT_RESULTS_PER_QUERY,
        }
    }
}

impl From<&ScoutConfig> for CoordinatorSettings {
    fn from(config: &ScoutConfig) -> Self {
        Self {
            mode: config.mode(),
            strategy: config.strategy(),
            failure_policy: config.failure_policy(),
            call_timeout: config.call_timeout(),
            results_per_query: config.results_per_query(),
        }
    }
}

/// The five analyses that run concurrently after classification
struct Analyses {
    market: MarketOutput,
    product: ProductAnalysis,
    founder: FounderAnalysis,
    level: FounderLevel,
    idea_fit: IdeaFit,
}

impl Analyses {
    fn store(self, result: &mut PipelineResult) {
        result.store(AnalysisRecord::Market(self.market));
        result.store(AnalysisRecord::Product(self.product));
        result.store(AnalysisRecord::Founder(self.founder));
        result.segmentation = Some(self.level);
        result.idea_fit = Some(self.idea_fit);
    }
}

const ANALYSIS_STAGES: [StageKind; 5] = [
    StageKind::Market,
    StageKind::Product,
    StageKind::Founder,
    StageKind::Segmentation,
    StageKind::IdeaFit,
];

/// The pipeline coordinator
pub struct Coordinator {
    settings: CoordinatorSettings,
    client: Arc<dyn CompletionClient>,
    /// Per-stage completion clients (stage -> client)
    stage_clients: HashMap<StageKind, Arc<dyn CompletionClient>>,
    search: Arc<dyn SearchProvider>,
    classifier: Arc<dyn Classifier>,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl Coordinator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        search: Arc<dyn SearchProvider>,
        classifier: Arc<dyn Classifier>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            settings,
            client,
            stage_clients: HashMap::new(),
            search,
            classifier,
            event_tx: None,
        }
    }

    /// Build the production collaborators from a config.
    ///
    /// Every stage gets its own radkit client so per-stage model overrides
    /// apply. Research runs on the market stage's model.
    pub fn from_config(config: &ScoutConfig) -> ScoutResult<Self> {
        let search: Arc<dyn SearchProvider> = match config.search_backend() {
            SearchBackend::Searxng => Arc::new(SearxngSearch::new(config.searxng_url.as_deref())?),
            SearchBackend::Serper => Arc::new(SerperSearch::from_env()?),
        };
        tracing::info!(search = search.name(), mode = ?config.mode(), "Configured collaborators");

        let classifier = match &config.classifier_model_path {
            Some(path) => LogisticClassifier::from_path(path).map_err(|e| ScoutError::Config {
                message: format!("Failed to load classifier model {}: {}", path.display(), e),
            })?,
            None => LogisticClassifier::default(),
        };

        let client = Arc::new(LlmCompletion::new(config.model_config(StageKind::Parse)));
        let mut coordinator = Self::new(
            client,
            search,
            Arc::new(classifier),
            CoordinatorSettings::from(config),
        );

        if config.has_stage_overrides() {
            for stage in StageKind::all() {
                let model_config = config.model_config(stage);
                coordinator = coordinator.with_stage_client(stage, Arc::new(LlmCompletion::new(model_config)));
            }
        }

        Ok(coordinator)
    }

    /// Route one stage to a different completion client
    pub fn with_stage_client(mut self, stage: StageKind, client: Arc<dyn CompletionClient>) -> Self {
        self.stage_clients.insert(stage, client);
        self
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    fn completer(&self, stage: StageKind) -> Completer {
        let client = self
            .stage_clients
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| self.client.clone());
        Completer::new(client, self.settings.call_timeout)
    }

    /// Evaluate one startup description (free text or a JSON record)
    #[tracing::instrument(skip(self, input), fields(mode = ?self.settings.mode, input_len = input.len()))]
    pub async fn run(&self, input: &str) -> Result<PipelineResult, ScoutError> {
        let mut ctx = RunContext::new();
        if let Some(tx) = &self.event_tx {
            ctx = ctx.with_event_channel(tx.clone());
        }
        let span = ctx.span();
        self.run_stages(input, &ctx).instrument(span).await
    }

    async fn run_stages(&self, input: &str, ctx: &RunContext) -> Result<PipelineResult, ScoutError> {
        let settings = &self.settings;
        let mut pipeline = Pipeline::new();

        ctx.emit(
            ctx.event(PipelineEventKind::RunStarted)
                .with_data(serde_json::json!({ "mode": settings.mode, "strategy": settings.strategy })),
        )
        .await;

        // Stage 1: Parse (fatal)
        ctx.emit_stage(PipelineEventKind::StageStarted, StageKind::Parse, None).await;
        let scout = ScoutSkill::new(self.completer(StageKind::Parse), self.classifier.clone());
        let startup = match scout.parse_record(input).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("Parse failed: {}", e);
                pipeline.fail();
                ctx.emit(
                    ctx.event(PipelineEventKind::RunFailed)
                        .with_stage(StageKind::Parse)
                        .with_data(serde_json::json!({ "error": e.to_string() })),
                )
                .await;
                return Err(e);
            }
        };
        ctx.emit_stage(PipelineEventKind::StageCompleted, StageKind::Parse, None).await;
        pipeline.advance();

        let mut result = PipelineResult::new(ctx.run_id(), settings.mode, startup.clone());

        // Stage 2: Classification
        ctx.emit_stage(PipelineEventKind::StageStarted, StageKind::Classification, None).await;
        let scout = ScoutSkill::new(self.completer(StageKind::Classification), self.classifier.clone());
        let outcome = scout.classify(&startup).await;
        let classification = self.settle(ctx, &mut result, StageKind::Classification, outcome).await;
        result.classification = Some(classification.clone());

        if let Some(stage) = self.abort_stage(&result, &[StageKind::Classification]) {
            return Ok(self.abort(ctx, &mut pipeline, result, stage).await);
        }
        pipeline.advance();

        // Stage 3: Analyses (concurrent)
        let analyses = self.analyze(&startup, ctx, &mut result).await;
        if let Some(stage) = self.abort_stage(&result, &ANALYSIS_STAGES) {
            analyses.store(&mut result);
            return Ok(self.abort(ctx, &mut pipeline, result, stage).await);
        }
        pipeline.advance();

        // Stage 4: Integration + quantitative decision
        ctx.emit_stage(PipelineEventKind::StageStarted, StageKind::Integration, None).await;
        let integration = IntegrationSkill::new(self.completer(StageKind::Integration), settings.strategy);
        let outcome = integration
            .integrate(IntegrationInputs {
                market: &analyses.market,
                product: &analyses.product,
                founder: &analyses.founder,
                idea_fit: &analyses.idea_fit,
                level: analyses.level,
                classification: &classification,
            })
            .await;
        let decision = self.settle(ctx, &mut result, StageKind::Integration, outcome).await;

        let quantitative = quantify(&classification.prediction, analyses.idea_fit.score, analyses.level);
        tracing::info!(
            outcome = %quantitative.outcome,
            probability = quantitative.probability,
            "Quantitative decision"
        );

        result.final_decision = Some(decision);
        result.quantitative_decision = Some(quantitative);
        analyses.store(&mut result);
        pipeline.advance();

        ctx.emit(ctx.event(PipelineEventKind::RunCompleted).with_data(serde_json::json!({
            "errors": result.error_count(),
            "degraded": result.degraded,
        })))
        .await;
        tracing::info!(
            errors = result.error_count(),
            success = pipeline.is_success(),
            "Run complete"
        );

        Ok(result)
    }

    /// Market, product, founder, segmentation and idea fit, all at once.
    /// In advanced modes the three analyses share one research report.
    async fn analyze(
        &self,
        startup: &StartupRecord,
        ctx: &RunContext,
        result: &mut PipelineResult,
    ) -> Analyses {
        let settings = &self.settings;
        for stage in ANALYSIS_STAGES {
            ctx.emit_stage(PipelineEventKind::StageStarted, stage, None).await;
        }

        let mut market = MarketSkill::new(self.completer(StageKind::Market), settings.strategy);
        let mut product = ProductSkill::new(self.completer(StageKind::Product), settings.strategy);
        let mut founder = FounderSkill::new(self.completer(StageKind::Founder), settings.strategy);

        if settings.mode.uses_research() {
            let research = Arc::new(ResearchSkill::new(
                self.completer(StageKind::Market),
                self.search.clone(),
                settings.results_per_query,
            ));
            market = market.with_research(research.clone());
            product = product.with_research(research.clone());
            founder = founder.with_research(research);
        }

        let (market_out, product_out, founder_out, level_out, fit_out) = tokio::join!(
            market.analyze(startup, settings.mode, ctx),
            product.analyze(startup, settings.mode, ctx),
            founder.analyze(startup, settings.mode, ctx),
            founder.segment(startup),
            founder.idea_fit(startup),
        );

        Analyses {
            market: self.settle(ctx, result, StageKind::Market, market_out).await,
            product: self.settle(ctx, result, StageKind::Product, product_out).await,
            founder: self.settle(ctx, result, StageKind::Founder, founder_out).await,
            level: self.settle(ctx, result, StageKind::Segmentation, level_out).await,
            idea_fit: self.settle(ctx, result, StageKind::IdeaFit, fit_out).await,
        }
    }

    /// Report a finished stage and fold its bookkeeping into the result
    async fn settle<T>(
        &self,
        ctx: &RunContext,
        result: &mut PipelineResult,
        stage: StageKind,
        outcome: StageOutcome<T>,
    ) -> T {
        let kind = if outcome.degraded {
            tracing::warn!(stage = %stage, errors = outcome.errors.len(), "Stage degraded");
            PipelineEventKind::StageDegraded
        } else {
            PipelineEventKind::StageCompleted
        };
        let data = (!outcome.errors.is_empty()).then(|| serde_json::json!({ "errors": outcome.errors }));
        ctx.emit_stage(kind, stage, data).await;
        result.absorb(stage, outcome)
    }

    /// First degraded stage among `stages`, when the abort policy is active
    fn abort_stage(&self, result: &PipelineResult, stages: &[StageKind]) -> Option<StageKind> {
        if self.settings.failure_policy != FailurePolicy::Abort {
            return None;
        }
        stages.iter().copied().find(|stage| result.is_degraded(*stage))
    }

    async fn abort(
        &self,
        ctx: &RunContext,
        pipeline: &mut Pipeline,
        mut result: PipelineResult,
        stage: StageKind,
    ) -> PipelineResult {
        tracing::warn!(stage = %stage, "Aborting run after degraded stage");
        pipeline.abort();
        result.aborted_after = Some(stage);
        ctx.emit(
            ctx.event(PipelineEventKind::RunAborted)
                .with_stage(stage)
                .with_data(serde_json::json!({ "errors": result.error_count() })),
        )
        .await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::records::{DataSource, OutcomeLabel, ERROR_SENTINEL, PLACEHOLDER_COMPETITOR};
    use crate::testing::{FailingCompletion, FixedClassifier, ScriptedCompletion, StaticSearch};

    const BASIC_INPUT: &str = r#"{"description": "X", "market_size": "$1B", "growth_rate": "20%"}"#;

    const NARRATIVE: &str = "\
Growth rate: 20% per year.

Viability score: 7/10

Overall score: 6/10

Outcome: Invest

Recommendation: Take a first meeting.";

    fn coordinator(client: impl CompletionClient + 'static, settings: CoordinatorSettings) -> Coordinator {
        Coordinator::new(
            Arc::new(client),
            Arc::new(StaticSearch::failing()),
            Arc::new(LogisticClassifier::default()),
            settings,
        )
    }

    #[tokio::test]
    async fn test_all_failing_collaborators_still_return_result() {
        let result = coordinator(FailingCompletion, CoordinatorSettings::default())
            .run(BASIC_INPUT)
            .await
            .unwrap();

        let market = result.market.as_ref().and_then(MarketOutput::as_structured).unwrap();
        assert_eq!(market.growth_rate, ERROR_SENTINEL);
        assert_eq!(market.viability_score, 5);
        assert_eq!(market.competitor_source, DataSource::Degraded);

        assert_eq!(result.product.as_ref().unwrap().features_analysis, ERROR_SENTINEL);
        assert_eq!(result.founder.as_ref().unwrap().competency_score, 5);
        assert_eq!(result.segmentation, Some(FounderLevel::L3));
        assert_eq!(result.idea_fit.as_ref().unwrap().score, 0.5);

        let decision = result.final_decision.as_ref().unwrap();
        assert_eq!(decision.overall_score, 5.0);
        assert_eq!(decision.outcome, "Analysis Failed");
        assert!(result.quantitative_decision.is_some());

        for stage in ANALYSIS_STAGES {
            assert!(result.is_degraded(stage), "{} should be degraded", stage);
            assert!(!result.errors[&stage].is_empty());
        }
        assert!(result.is_degraded(StageKind::Integration));
        assert!(!result.is_aborted());
    }

    #[tokio::test]
    async fn test_basic_end_to_end() {
        let client = ScriptedCompletion::new()
            .on_text("Founder Segmentation", "L2\nSome industry experience.")
            .with_text(NARRATIVE);
        let result = coordinator(client, CoordinatorSettings::default())
            .run(BASIC_INPUT)
            .await
            .unwrap();

        assert_eq!(result.startup.market_size, "$1B");

        let market = result.market.as_ref().and_then(MarketOutput::as_structured).unwrap();
        assert_eq!(market.growth_rate, "20% per year.");
        assert_eq!(market.viability_score, 7);
        assert_eq!(market.competitors.len(), 1);
        assert_eq!(market.competitors[0].name, PLACEHOLDER_COMPETITOR);
        assert!(market.has_placeholder_competitors());

        let product = result.product.as_ref().unwrap();
        assert!((1..=10).contains(&product.potential_score));
        assert_eq!(result.segmentation, Some(FounderLevel::L2));

        let decision = result.final_decision.as_ref().unwrap();
        assert_eq!(decision.overall_score, 6.0);
        assert_eq!(decision.outcome, "Invest");

        let quantitative = result.quantitative_decision.as_ref().unwrap();
        assert!((0.0..=1.0).contains(&quantitative.probability));
        let expected = if quantitative.probability >= 0.5 { "Invest" } else { "Hold" };
        assert_eq!(quantitative.outcome, expected);

        let classification = result.classification.as_ref().unwrap();
        assert_ne!(classification.prediction.label, OutcomeLabel::Unknown);
        assert!(result.degraded.is_empty());
    }

    #[tokio::test]
    async fn test_parse_failure_is_fatal() {
        let (tx, mut rx) = mpsc::channel(32);
        let coordinator = coordinator(FailingCompletion, CoordinatorSettings::default()).with_event_channel(tx);

        let err = coordinator.run("   ").await.unwrap_err();
        assert!(err.is_fatal());

        drop(coordinator);
        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.kind);
        }
        assert_eq!(kinds.first(), Some(&PipelineEventKind::RunStarted));
        assert_eq!(kinds.last(), Some(&PipelineEventKind::RunFailed));
        assert!(!kinds.contains(&PipelineEventKind::RunCompleted));
    }

    #[tokio::test]
    async fn test_abort_policy_stops_after_degraded_analyses() {
        let settings = CoordinatorSettings {
            failure_policy: FailurePolicy::Abort,
            ..CoordinatorSettings::default()
        };
        let result = coordinator(FailingCompletion, settings).run(BASIC_INPUT).await.unwrap();

        assert_eq!(result.aborted_after, Some(StageKind::Market));
        assert!(result.market.is_some());
        assert!(result.final_decision.is_none());
        assert!(result.quantitative_decision.is_none());
    }

    #[tokio::test]
    async fn test_abort_policy_stops_after_classifier_failure() {
        let settings = CoordinatorSettings {
            failure_policy: FailurePolicy::Abort,
            ..CoordinatorSettings::default()
        };
        let coordinator = Coordinator::new(
            Arc::new(ScriptedCompletion::new().with_text(NARRATIVE)),
            Arc::new(StaticSearch::failing()),
            Arc::new(FixedClassifier(None)),
            settings,
        );

        let result = coordinator.run(BASIC_INPUT).await.unwrap();

        assert_eq!(result.aborted_after, Some(StageKind::Classification));
        assert!(result.market.is_none());
    }

    #[tokio::test]
    async fn test_timeouts_degrade_instead_of_failing() {
        let settings = CoordinatorSettings {
            call_timeout: Duration::from_millis(20),
            ..CoordinatorSettings::default()
        };
        let client = ScriptedCompletion::new()
            .with_text(NARRATIVE)
            .with_delay(Duration::from_millis(500));

        let result = coordinator(client, settings).run(BASIC_INPUT).await.unwrap();

        assert!(result.is_degraded(StageKind::Market));
        assert!(result.errors[&StageKind::Market]
            .iter()
            .any(|e| e.contains("timed out")));
    }

    #[tokio::test]
    async fn test_advanced_mode_degrades_without_research() {
        let settings = CoordinatorSettings {
            mode: AnalysisMode::Advanced,
            ..CoordinatorSettings::default()
        };
        let client = ScriptedCompletion::new()
            .fail_on("one keyword")
            .with_text(NARRATIVE);

        let result = coordinator(client, settings).run(BASIC_INPUT).await.unwrap();

        let market = result.market.as_ref().and_then(MarketOutput::as_structured).unwrap();
        assert_eq!(market.viability_score, 7);
        assert!(result.errors[&StageKind::Market]
            .iter()
            .any(|e| e.contains("research unavailable")));
        assert!(!result.is_degraded(StageKind::Market));
    }

    #[tokio::test]
    async fn test_stage_client_override() {
        let coordinator = coordinator(FailingCompletion, CoordinatorSettings::default())
            .with_stage_client(StageKind::Segmentation, Arc::new(ScriptedCompletion::new().with_text("L5")));

        let result = coordinator.run(BASIC_INPUT).await.unwrap();

        assert_eq!(result.segmentation, Some(FounderLevel::L5));
        assert!(!result.is_degraded(StageKind::Segmentation));
        assert!(result.is_degraded(StageKind::Market));
    }

    #[test]
    fn test_settings_from_config() {
        let config = ScoutConfig {
            mode: Some(AnalysisMode::Advanced),
            failure_policy: Some(FailurePolicy::Abort),
            results_per_query: Some(3),
            ..ScoutConfig::default()
        };
        let settings = CoordinatorSettings::from(&config);

        assert_eq!(settings.mode, AnalysisMode::Advanced);
        assert_eq!(settings.failure_policy, FailurePolicy::Abort);
        assert_eq!(settings.results_per_query, 3);
        assert_eq!(settings.call_timeout, Duration::from_secs(60));
        assert_eq!(FailurePolicy::from_name("ABORT"), Some(FailurePolicy::Abort));
    }
}
