//! # Scout Skills
//!
//! Analysis skills for the evaluation pipeline.
//!
//! ## Architecture
//!
//! ```text
//! Coordinator
//!   └── Skills (one per stage, each owns a Completer)
//!         └── Tools (extractor, search, classifier)
//! ```
//!
//! ## Skill Categories
//!
//! **Intake:**
//! - `ScoutSkill` - Parse the startup record, categorize, classify
//!
//! **Analysis** (run concurrently):
//! - `MarketSkill` - TAM/SAM/SOM, competition, viability
//! - `ProductSkill` - Features, technology, USP
//! - `FounderSkill` - Team competency, segmentation, founder-idea fit
//!
//! **Support:**
//! - `ResearchSkill` - Multi-query web research shared by the analysis skills
//!
//! **Decision:**
//! - `IntegrationSkill` - Final decision + deterministic quantitative decision

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod completion;
pub mod llm_helpers;
pub mod prompts;
pub mod records;

pub mod founder_skill;
pub mod integration_skill;
pub mod market_skill;
pub mod product_skill;
pub mod research_skill;
pub mod scout_skill;

pub use completion::{Completer, CompletionClient, LlmCompletion};
pub use founder_skill::FounderSkill;
pub use integration_skill::{quantify, IntegrationInputs, IntegrationSkill};
pub use market_skill::MarketSkill;
pub use product_skill::ProductSkill;
pub use research_skill::{CompositeReport, ResearchCategory, ResearchResult, ResearchSkill};
pub use scout_skill::ScoutSkill;

/// How deep an analysis stage goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Prompt + completion only
    #[default]
    Basic,
    /// Folds web research into the prompt
    Advanced,
    /// Market narrative with raw research reports (other stages run as advanced)
    #[serde(alias = "natural")]
    NaturalLanguageAdvanced,
}

impl AnalysisMode {
    pub fn uses_research(&self) -> bool {
        !matches!(self, AnalysisMode::Basic)
    }

    pub fn from_name(name: &str) -> Option<AnalysisMode> {
        match name.trim().to_lowercase().as_str() {
            "basic" => Some(AnalysisMode::Basic),
            "advanced" => Some(AnalysisMode::Advanced),
            "natural" | "natural_language_advanced" | "nl" => {
                Some(AnalysisMode::NaturalLanguageAdvanced)
            }
            _ => None,
        }
    }
}

/// How structured records are obtained from the completion service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStrategy {
    /// Structured decoding first, narrative extraction if it fails
    #[default]
    Direct,
    /// Narrative completion, fields recovered by the extractor
    Extract,
}

impl DecodeStrategy {
    pub fn from_name(name: &str) -> Option<DecodeStrategy> {
        match name.trim().to_lowercase().as_str() {
            "direct" => Some(DecodeStrategy::Direct),
            "extract" => Some(DecodeStrategy::Extract),
            _ => None,
        }
    }
}

/// A stage's value plus the errors it absorbed producing it
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome<T> {
    pub value: T,
    pub errors: Vec<String>,
    /// The value is a fallback default rather than an analysis
    pub degraded: bool,
}

impl<T> StageOutcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            errors: Vec::new(),
            degraded: false,
        }
    }

    pub fn degraded(value: T, errors: Vec<String>) -> Self {
        Self {
            value,
            errors,
            degraded: true,
        }
    }

    pub fn with_errors(mut self, mut errors: Vec<String>) -> Self {
        errors.append(&mut self.errors);
        self.errors = errors;
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutcome<U> {
        StageOutcome {
            value: f(self.value),
            errors: self.errors,
            degraded: self.degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names() {
        assert_eq!(AnalysisMode::from_name("Natural"), Some(AnalysisMode::NaturalLanguageAdvanced));
        assert_eq!(AnalysisMode::from_name("basic"), Some(AnalysisMode::Basic));
        assert_eq!(AnalysisMode::from_name("deep"), None);
        assert!(!AnalysisMode::Basic.uses_research());
        assert!(AnalysisMode::Advanced.uses_research());
    }

    #[test]
    fn test_mode_serde_name() {
        let json = serde_json::to_string(&AnalysisMode::NaturalLanguageAdvanced).unwrap();
        assert_eq!(json, "\"natural_language_advanced\"");
    }

    #[test]
    fn test_outcome_error_order() {
        let outcome = StageOutcome::degraded(1, vec!["late".to_string()])
            .with_errors(vec!["early".to_string()])
            .map(|v| v + 1);

        assert_eq!(outcome.value, 2);
        assert_eq!(outcome.errors, vec!["early", "late"]);
        assert!(outcome.degraded);
    }
}
