//! # Product Skill
//!
//! Product analysis stage: features, technology, USP and product scores.

use std::sync::Arc;

use crate::error::ScoutResult;
use crate::skills::completion::Completer;
use crate::skills::prompts;
use crate::skills::records::{ProductAnalysis, StartupRecord, NEUTRAL_SCORE, NO_DATA};
use crate::skills::research_skill::ResearchSkill;
use crate::skills::{AnalysisMode, DecodeStrategy, StageOutcome};
use crate::swarm::events::RunContext;
use crate::tools::extractor::{extract, extract_labeled_score};

/// Build a product record from narrative text
pub fn extract_product(text: &str) -> ProductAnalysis {
    ProductAnalysis {
        features_analysis: extract(text, &["features analysis", "features", "feature"], NO_DATA),
        tech_stack_evaluation: extract(
            text,
            &["technology stack", "tech stack", "technology"],
            NO_DATA,
        ),
        usp_assessment: extract(
            text,
            &["unique selling proposition", "USP", "differentiation"],
            NO_DATA,
        ),
        potential_score: extract_labeled_score(
            text,
            &["potential score", "product potential", "potential"],
            NEUTRAL_SCORE,
        ),
        innovation_score: extract_labeled_score(
            text,
            &["innovation score", "innovation"],
            NEUTRAL_SCORE,
        ),
        market_fit_score: extract_labeled_score(
            text,
            &["market fit score", "product-market fit", "market fit"],
            NEUTRAL_SCORE,
        ),
    }
    .normalize()
}

/// Product analysis stage
pub struct ProductSkill {
    completer: Completer,
    strategy: DecodeStrategy,
    research: Option<Arc<ResearchSkill>>,
}

impl ProductSkill {
    pub fn new(completer: Completer, strategy: DecodeStrategy) -> Self {
        Self {
            completer,
            strategy,
            research: None,
        }
    }

    pub fn with_research(mut self, research: Arc<ResearchSkill>) -> Self {
        self.research = Some(research);
        self
    }

    /// Run the stage. The natural-language mode is treated as advanced.
    pub async fn analyze(
        &self,
        record: &StartupRecord,
        mode: AnalysisMode,
        ctx: &RunContext,
    ) -> StageOutcome<ProductAnalysis> {
        tracing::info!("Starting product analysis in {:?} mode", mode);
        let mut errors = Vec::new();

        let report = match (&self.research, mode.uses_research()) {
            (Some(research), true) => match research.report(record, ctx).await {
                Ok(report) => Some(report),
                Err(e) => {
                    errors.push(e.to_string());
                    None
                }
            },
            _ => None,
        };

        if let Some(report) = report.as_ref() {
            let prompt = format!(
                "{}\n\nMarket research:\n{}",
                Self::prompt(record),
                report.render()
            );
            match self.decode(&prompt, &mut errors).await {
                Ok(analysis) => return StageOutcome::ok(analysis).with_errors(errors),
                Err(e) => {
                    tracing::warn!("Advanced product analysis failed, using basic analysis: {}", e);
                    errors.push(format!("advanced analysis: {}", e));
                }
            }
        }

        match self.decode(&Self::prompt(record), &mut errors).await {
            Ok(analysis) => StageOutcome::ok(analysis).with_errors(errors),
            Err(e) => {
                tracing::warn!("Product analysis failed: {}", e);
                errors.push(format!("basic analysis: {}", e));
                StageOutcome::degraded(ProductAnalysis::degraded(), errors)
            }
        }
    }

    fn prompt(record: &StartupRecord) -> String {
        record.product_info()
    }

    async fn decode(&self, prompt: &str, errors: &mut Vec<String>) -> ScoutResult<ProductAnalysis> {
        if self.strategy == DecodeStrategy::Direct {
            match self
                .completer
                .structured::<ProductAnalysis>("product.structured", prompts::PRODUCT_ANALYSIS, prompt)
                .await
            {
                Ok(analysis) => return Ok(analysis.normalize()),
                Err(e) => errors.push(format!("structured decode: {}", e)),
            }
        }

        let text = self
            .completer
            .text("product.narrative", prompts::PRODUCT_ANALYSIS, prompt)
            .await?;
        Ok(extract_product(&text))
    }
}
