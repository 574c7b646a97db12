//! # Integration Skill
//!
//! Fan-in stage: merges every upstream analysis into a [`FinalDecision`],
//! plus the deterministic [`QuantitativeDecision`] computed by [`quantify`].

use crate::error::ScoutResult;
use crate::skills::completion::Completer;
use crate::skills::prompts;
use crate::skills::records::{
    Classification, FinalDecision, FounderAnalysis, FounderLevel, IdeaFit, MarketOutput,
    Prediction, ProductAnalysis, QuantitativeDecision, NEUTRAL_SCORE, NO_DATA,
};
use crate::skills::{DecodeStrategy, StageOutcome};
use crate::tools::extractor::{extract, extract_labeled_rating, extract_leading_rating};

/// Probability at or above which the quantitative outcome is "Invest"
pub const INVEST_THRESHOLD: f64 = 0.5;

// ============================================================================
// Quantitative Decision
// ============================================================================

/// Weighted blend of classifier probability, founder-idea fit and founder level.
///
/// ```text
/// p = clamp(0.5 * success_probability + 0.3 * idea_fit + 0.2 * (level - 1) / 4, 0, 1)
/// ```
///
/// Inputs are clamped to [0, 1] first, so the result is monotonic
/// non-decreasing in each of them.
pub fn quantify(prediction: &Prediction, idea_fit: f64, level: FounderLevel) -> QuantitativeDecision {
    let success = unit(prediction.success_probability);
    let fit = unit(idea_fit);
    let probability = (0.5 * success + 0.3 * fit + 0.2 * level.as_unit()).clamp(0.0, 1.0);

    let outcome = if probability >= INVEST_THRESHOLD {
        "Invest"
    } else {
        "Hold"
    };

    QuantitativeDecision {
        outcome: outcome.to_string(),
        probability,
        rationale: format!(
            "Classifier: {} ({:.2}), founder-idea fit: {:.2}, founder level: {}",
            prediction.label, success, fit, level
        ),
    }
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

// ============================================================================
// Final Decision
// ============================================================================

/// Everything the integration prompt embeds
#[derive(Debug, Clone, Copy)]
pub struct IntegrationInputs<'a> {
    pub market: &'a MarketOutput,
    pub product: &'a ProductAnalysis,
    pub founder: &'a FounderAnalysis,
    pub idea_fit: &'a IdeaFit,
    pub level: FounderLevel,
    pub classification: &'a Classification,
}

impl IntegrationInputs<'_> {
    fn prompt(&self) -> String {
        let market = serde_json::to_string_pretty(self.market).unwrap_or_else(|_| NO_DATA.to_string());
        let product = serde_json::to_string_pretty(self.product).unwrap_or_else(|_| NO_DATA.to_string());
        let founder = serde_json::to_string_pretty(self.founder).unwrap_or_else(|_| NO_DATA.to_string());
        let prediction = &self.classification.prediction;

        format!(
            "## Market Analysis\n{}\n\n## Product Analysis\n{}\n\n## Founder Analysis\n{}\n\n\
             ## Statistical Prediction\nPredicted outcome: {} (success probability {:.2})\n\n\
             ## Founder Level\n{}\n\n\
             ## Founder-Idea Fit\nScore: {:.2}\n{}",
            market,
            product,
            founder,
            prediction.label,
            prediction.success_probability,
            self.level,
            self.idea_fit.score,
            self.idea_fit.rationale
        )
    }
}

/// Recover a decision from narrative text. `None` when no overall score is stated.
pub fn extract_decision(text: &str) -> Option<FinalDecision> {
    let mut score = extract_labeled_rating(text, &["overall score", "final score"], -1.0);
    if score < 0.0 {
        score = extract_leading_rating(text, &["score"], -1.0);
    }
    if score < 0.0 {
        return None;
    }

    Some(
        FinalDecision {
            overall_score: score,
            outcome: extract(text, &["outcome", "decision"], NO_DATA),
            recommendation: extract(text, &["recommendation"], NO_DATA),
            rationale: extract(text, &["rationale", "integrated analysis"], NO_DATA),
        }
        .normalize(),
    )
}

/// Final decision stage
pub struct IntegrationSkill {
    completer: Completer,
    strategy: DecodeStrategy,
}

impl IntegrationSkill {
    pub fn new(completer: Completer, strategy: DecodeStrategy) -> Self {
        Self {
            completer,
            strategy,
        }
    }

    /// Merge all upstream records. Never fails; a failure yields the
    /// "Analysis Failed" decision.
    pub async fn integrate(&self, inputs: IntegrationInputs<'_>) -> StageOutcome<FinalDecision> {
        tracing::info!("Starting integration");
        let prompt = inputs.prompt();
        let mut errors = Vec::new();

        match self.decide(&prompt, &mut errors).await {
            Ok(decision) => {
                tracing::info!(
                    score = decision.overall_score,
                    outcome = %decision.outcome,
                    "Integration complete"
                );
                StageOutcome::ok(decision).with_errors(errors)
            }
            Err(e) => {
                tracing::warn!("Integration failed: {}", e);
                errors.push(e.to_string());
                StageOutcome::degraded(FinalDecision::degraded(&e.to_string()), errors)
            }
        }
    }

    async fn decide(&self, prompt: &str, errors: &mut Vec<String>) -> ScoutResult<FinalDecision> {
        if self.strategy == DecodeStrategy::Direct {
            match self
                .completer
                .structured::<FinalDecision>("integration.structured", prompts::INTEGRATION, prompt)
                .await
            {
                Ok(decision) => return Ok(decision.normalize()),
                Err(e) => errors.push(format!("structured decode: {}", e)),
            }
        }

        let text = self
            .completer
            .text("integration.narrative", prompts::INTEGRATION, prompt)
            .await?;

        Ok(extract_decision(&text).unwrap_or_else(|| {
            errors.push("no overall score in integration narrative".to_string());
            FinalDecision {
                overall_score: f64::from(NEUTRAL_SCORE),
                outcome: extract(&text, &["outcome", "decision"], NO_DATA),
                recommendation: extract(&text, &["recommendation"], NO_DATA),
                rationale: text.trim().to_string(),
            }
            .normalize()
        }))
    }
}
