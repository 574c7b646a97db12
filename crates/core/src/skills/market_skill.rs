//! # Market Skill
//!
//! Market analysis stage: market sizing, growth, competition and viability.
//!
//! Structured records come from direct decoding or from narrative text run
//! through the extractor, per [`DecodeStrategy`]. Advanced modes fold the
//! shared research report into the prompt. Every failure path ends in a
//! usable record; nothing is propagated to the coordinator.

use std::sync::Arc;

use crate::error::ScoutResult;
use crate::skills::completion::Completer;
use crate::skills::prompts;
use crate::skills::records::{
    DataSource, MarketAnalysis, MarketNarrative, MarketOutput, StartupRecord, NEUTRAL_SCORE,
    NO_DATA,
};
use crate::skills::research_skill::{CompositeReport, ResearchCategory, ResearchSkill};
use crate::skills::{AnalysisMode, DecodeStrategy, StageOutcome};
use crate::swarm::events::RunContext;
use crate::tools::extractor::{extract, extract_competitors, extract_score};

const TAM_KEYWORDS: [&str; 3] = ["TAM", "total addressable market", "total market"];
const SAM_KEYWORDS: [&str; 2] = ["SAM", "serviceable addressable market"];
const SOM_KEYWORDS: [&str; 2] = ["SOM", "serviceable obtainable market"];
const GROWTH_KEYWORDS: [&str; 2] = ["growth rate", "CAGR"];
const COMPETITION_KEYWORDS: [&str; 2] = ["competition", "competitive"];
const TREND_KEYWORDS: [&str; 2] = ["trends", "market trends"];

/// Build a market record from narrative text
pub fn extract_market(text: &str) -> MarketAnalysis {
    let competitors = extract_competitors(text);
    let competitor_source = if competitors.is_empty() {
        DataSource::Placeholder
    } else {
        DataSource::Extracted
    };

    MarketAnalysis {
        total_addressable_market: extract(text, &TAM_KEYWORDS, NO_DATA),
        serviceable_addressable_market: extract(text, &SAM_KEYWORDS, NO_DATA),
        serviceable_obtainable_market: extract(text, &SOM_KEYWORDS, NO_DATA),
        growth_rate: extract(text, &GROWTH_KEYWORDS, NO_DATA),
        competition: extract(text, &COMPETITION_KEYWORDS, NO_DATA),
        competitors,
        competitor_source,
        market_trends: extract(text, &TREND_KEYWORDS, NO_DATA),
        viability_score: extract_score(text, NEUTRAL_SCORE),
    }
    .normalize()
}

fn section_or_no_data(report: Option<&CompositeReport>, category: ResearchCategory) -> String {
    report
        .and_then(|r| r.section(category))
        .map(|s| s.body.clone())
        .unwrap_or_else(|| NO_DATA.to_string())
}

/// Market analysis stage
pub struct MarketSkill {
    completer: Completer,
    strategy: DecodeStrategy,
    research: Option<Arc<ResearchSkill>>,
}

impl MarketSkill {
    pub fn new(completer: Completer, strategy: DecodeStrategy) -> Self {
        Self {
            completer,
            strategy,
            research: None,
        }
    }

    /// Research used by the advanced modes
    pub fn with_research(mut self, research: Arc<ResearchSkill>) -> Self {
        self.research = Some(research);
        self
    }

    /// Run the stage. Never fails; see [`StageOutcome::degraded`].
    pub async fn analyze(
        &self,
        record: &StartupRecord,
        mode: AnalysisMode,
        ctx: &RunContext,
    ) -> StageOutcome<MarketOutput> {
        tracing::info!("Starting market analysis in {:?} mode", mode);
        let mut errors = Vec::new();

        let report = if mode.uses_research() {
            self.research_report(record, ctx, &mut errors).await
        } else {
            None
        };

        if mode == AnalysisMode::NaturalLanguageAdvanced {
            match self.narrative(record, report.as_ref()).await {
                Ok(narrative) => {
                    return StageOutcome::ok(MarketOutput::Narrative(narrative)).with_errors(errors)
                }
                Err(e) => {
                    tracing::warn!("Natural language market analysis failed: {}", e);
                    errors.push(format!("narrative analysis: {}", e));
                }
            }
        }

        if let Some(report) = report.as_ref() {
            match self.advanced(record, report, &mut errors).await {
                Ok(analysis) => {
                    return StageOutcome::ok(MarketOutput::Structured(analysis)).with_errors(errors)
                }
                Err(e) => {
                    tracing::warn!("Advanced market analysis failed, using basic analysis: {}", e);
                    errors.push(format!("advanced analysis: {}", e));
                }
            }
        }

        match self.basic(record, &mut errors).await {
            Ok(analysis) => StageOutcome::ok(MarketOutput::Structured(analysis)).with_errors(errors),
            Err(e) => {
                tracing::warn!("Market analysis failed: {}", e);
                errors.push(format!("basic analysis: {}", e));
                StageOutcome::degraded(
                    MarketOutput::Structured(MarketAnalysis::degraded()),
                    errors,
                )
            }
        }
    }

    async fn research_report(
        &self,
        record: &StartupRecord,
        ctx: &RunContext,
        errors: &mut Vec<String>,
    ) -> Option<CompositeReport> {
        let research = self.research.as_ref()?;
        match research.report(record, ctx).await {
            Ok(report) => {
                errors.extend(report.warnings.iter().map(|w| format!("research: {}", w)));
                Some(report)
            }
            Err(e) => {
                tracing::warn!("Market research failed, continuing without it: {}", e);
                errors.push(e.to_string());
                None
            }
        }
    }

    fn basic_prompt(record: &StartupRecord) -> String {
        format!(
            "Startup description:\n{}\n\n{}",
            record.description,
            record.market_info()
        )
    }

    async fn basic(&self, record: &StartupRecord, errors: &mut Vec<String>) -> ScoutResult<MarketAnalysis> {
        let prompt = Self::basic_prompt(record);
        self.decode(prompts::MARKET_ANALYSIS, &prompt, errors).await
    }

    async fn advanced(
        &self,
        record: &StartupRecord,
        report: &CompositeReport,
        errors: &mut Vec<String>,
    ) -> ScoutResult<MarketAnalysis> {
        let prompt = format!(
            "{}\n\nAdditional Information:\n{}",
            Self::basic_prompt(record),
            report.render()
        );
        self.decode(prompts::MARKET_ADVANCED, &prompt, errors).await
    }

    /// Structured decoding first (direct strategy), then narrative + extraction
    async fn decode(
        &self,
        system: &str,
        prompt: &str,
        errors: &mut Vec<String>,
    ) -> ScoutResult<MarketAnalysis> {
        if self.strategy == DecodeStrategy::Direct {
            match self
                .completer
                .structured::<MarketAnalysis>("market.structured", system, prompt)
                .await
            {
                Ok(mut analysis) => {
                    analysis.competitor_source = DataSource::Structured;
                    return Ok(analysis.normalize());
                }
                Err(e) => {
                    tracing::warn!("Structured market decoding failed, extracting from text: {}", e);
                    errors.push(format!("structured decode: {}", e));
                }
            }
        }

        let text = self.completer.text("market.narrative", system, prompt).await?;
        let analysis = extract_market(&text);
        if analysis.has_placeholder_competitors() {
            tracing::debug!("No competitor table found; using placeholder entry");
        }
        Ok(analysis)
    }

    async fn narrative(
        &self,
        record: &StartupRecord,
        report: Option<&CompositeReport>,
    ) -> ScoutResult<MarketNarrative> {
        let keywords = report.map(|r| r.keywords.clone()).unwrap_or_default();
        let external_report = report
            .map(CompositeReport::render)
            .unwrap_or_else(|| NO_DATA.to_string());
        let financial_report = section_or_no_data(report, ResearchCategory::Financial);
        let trend_report = section_or_no_data(report, ResearchCategory::Trend);

        let startup = match record.company() {
            Some(company) => format!("{}: {}", company, record.description),
            None => record.description.clone(),
        };
        let prompt = format!(
            "Company under analysis: {}\n\nInitial market information:\n{}\n\n\
             Targeted research was conducted on: {}\n\n\
             External research findings:\n{}\n\n\
             Financial data summary:\n{}\n\n\
             Market trend analysis:\n{}\n\n\
             Formulate a professional and comprehensive analysis.",
            startup,
            record.market_info(),
            if keywords.is_empty() { NO_DATA.to_string() } else { keywords.join(", ") },
            external_report,
            financial_report,
            trend_report
        );

        let analysis = self
            .completer
            .text("market.natural_language", prompts::MARKET_NARRATIVE, &prompt)
            .await?;
        tracing::info!("Natural language analysis completed");

        Ok(MarketNarrative {
            analysis,
            external_report,
            financial_report,
            trend_report,
            keywords,
        }
        .normalize())
    }
}
