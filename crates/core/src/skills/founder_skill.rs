//! # Founder Skill
//!
//! Founder-team stages: competency analysis, L1-L5 segmentation and
//! founder-idea fit.

use regex::Regex;
use std::sync::{Arc, OnceLock};

use crate::error::{ScoutError, ScoutResult};
use crate::skills::completion::Completer;
use crate::skills::prompts;
use crate::skills::records::{FounderAnalysis, FounderLevel, IdeaFit, StartupRecord, NEUTRAL_SCORE, NO_DATA};
use crate::skills::research_skill::ResearchSkill;
use crate::skills::{AnalysisMode, DecodeStrategy, StageOutcome};
use crate::swarm::events::RunContext;
use crate::tools::extractor::{
    extract, extract_labeled_rating, extract_labeled_score, extract_leading_rating,
};

/// Build a founder record from narrative text
pub fn extract_founder(text: &str) -> FounderAnalysis {
    FounderAnalysis {
        competency_score: extract_labeled_score(
            text,
            &["competency score", "founder score", "competency"],
            NEUTRAL_SCORE,
        ),
        analysis: extract(text, &["analysis", "assessment", "overall"], NO_DATA),
        strengths: extract(text, &["strengths", "strength"], NO_DATA),
        challenges: extract(text, &["challenges", "gaps", "weaknesses"], NO_DATA),
    }
    .normalize()
}

/// Find the segmentation level in a reply.
///
/// An explicit `L<n>` token wins; otherwise a first line that opens with a
/// lone digit 1-5 (`"4"`, `"5 - exceptional"`).
pub fn parse_level(text: &str) -> Option<FounderLevel> {
    static TOKEN: OnceLock<Option<Regex>> = OnceLock::new();
    static BARE: OnceLock<Option<Regex>> = OnceLock::new();

    let token = TOKEN.get_or_init(|| Regex::new(r"(?i)\b(?:L|level\s*)([1-5])\b").ok());
    if let Some(caps) = token.as_ref().and_then(|re| re.captures(text)) {
        return caps.get(1).and_then(|m| FounderLevel::from_label(m.as_str()));
    }

    let bare = BARE.get_or_init(|| Regex::new(r"^[\s*]*([1-5])(?:[^\d.,]|$)").ok());
    let line = text.lines().find(|l| !l.trim().is_empty())?;
    bare.as_ref()
        .and_then(|re| re.captures(line))
        .and_then(|caps| caps.get(1))
        .and_then(|m| FounderLevel::from_label(m.as_str()))
}

/// Founder analysis stage
pub struct FounderSkill {
    completer: Completer,
    strategy: DecodeStrategy,
    research: Option<Arc<ResearchSkill>>,
}

impl FounderSkill {
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

    /// Team competency analysis. Advanced modes add the research report as market context.
    pub async fn analyze(
        &self,
        record: &StartupRecord,
        mode: AnalysisMode,
        ctx: &RunContext,
    ) -> StageOutcome<FounderAnalysis> {
        tracing::info!("Starting founder analysis in {:?} mode", mode);
        let mut errors = Vec::new();
        let base = format!("Description: {}\n{}", record.description, record.founder_info());

        if let (Some(research), true) = (&self.research, mode.uses_research()) {
            match research.report(record, ctx).await {
                Ok(report) => {
                    let prompt = format!("{}\n\nMarket context:\n{}", base, report.render());
                    match self.decode(&prompt, &mut errors).await {
                        Ok(analysis) => return StageOutcome::ok(analysis).with_errors(errors),
                        Err(e) => {
                            tracing::warn!("Advanced founder analysis failed, using basic analysis: {}", e);
                            errors.push(format!("advanced analysis: {}", e));
                        }
                    }
                }
                Err(e) => errors.push(e.to_string()),
            }
        }

        match self.decode(&base, &mut errors).await {
            Ok(analysis) => StageOutcome::ok(analysis).with_errors(errors),
            Err(e) => {
                tracing::warn!("Founder analysis failed: {}", e);
                errors.push(format!("basic analysis: {}", e));
                StageOutcome::degraded(FounderAnalysis::degraded(), errors)
            }
        }
    }

    async fn decode(&self, prompt: &str, errors: &mut Vec<String>) -> ScoutResult<FounderAnalysis> {
        if self.strategy == DecodeStrategy::Direct {
            match self
                .completer
                .structured::<FounderAnalysis>("founder.structured", prompts::FOUNDER_ANALYSIS, prompt)
                .await
            {
                Ok(analysis) => return Ok(analysis.normalize()),
                Err(e) => errors.push(format!("structured decode: {}", e)),
            }
        }

        let text = self
            .completer
            .text("founder.narrative", prompts::FOUNDER_ANALYSIS, prompt)
            .await?;
        Ok(extract_founder(&text))
    }

    /// Place the team on the L1-L5 scale. Falls back to L3.
    pub async fn segment(&self, record: &StartupRecord) -> StageOutcome<FounderLevel> {
        let result = self
            .completer
            .text(
                "founder.segmentation",
                prompts::FOUNDER_SEGMENTATION,
                &record.founder_info(),
            )
            .await
            .and_then(|reply| {
                parse_level(&reply).ok_or_else(|| {
                    ScoutError::completion(format!("no founder level in reply: {}", first_line(&reply)))
                })
            });

        match result {
            Ok(level) => {
                tracing::info!("Founder segmentation: {}", level);
                StageOutcome::ok(level)
            }
            Err(e) => {
                tracing::warn!("Founder segmentation failed: {}", e);
                StageOutcome::degraded(FounderLevel::default(), vec![e.to_string()])
            }
        }
    }

    /// Score how well the founders fit the idea, in [0, 1]. Falls back to 0.5.
    pub async fn idea_fit(&self, record: &StartupRecord) -> StageOutcome<IdeaFit> {
        let prompt = format!("Startup: {}\n\n{}", record.description, record.founder_info());
        let mut errors = Vec::new();

        if self.strategy == DecodeStrategy::Direct {
            match self
                .completer
                .structured::<IdeaFit>("founder.idea_fit", prompts::IDEA_FIT, &prompt)
                .await
            {
                Ok(fit) => return StageOutcome::ok(fit.normalize()),
                Err(e) => errors.push(format!("structured decode: {}", e)),
            }
        }

        let text = match self
            .completer
            .text("founder.idea_fit", prompts::IDEA_FIT, &prompt)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Founder-idea fit failed: {}", e);
                errors.push(e.to_string());
                return StageOutcome::degraded(IdeaFit::neutral(NO_DATA), errors);
            }
        };

        match fit_from_text(&text) {
            Some(score) => StageOutcome::ok(IdeaFit {
                score,
                rationale: text.trim().to_string(),
            }
            .normalize())
            .with_errors(errors),
            None => {
                errors.push("no fit score in reply".to_string());
                StageOutcome::degraded(IdeaFit::neutral(text.trim()), errors)
            }
        }
    }
}

/// Fit score from prose: `N/10` ratings are rescaled, bare decimals taken as-is
fn fit_from_text(text: &str) -> Option<f64> {
    static UNIT: OnceLock<Option<Regex>> = OnceLock::new();

    let mut rating = extract_labeled_rating(text, &["fit score", "fit"], -1.0);
    if rating < 0.0 {
        rating = extract_leading_rating(text, &["score"], -1.0);
    }
    if rating >= 0.0 {
        return Some(rating / 10.0);
    }

    let unit = UNIT.get_or_init(|| Regex::new(r"(?is)\bscore\D{0,20}?\b(0(?:\.\d+)?|1(?:\.0+)?)\b").ok());
    unit.as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}
