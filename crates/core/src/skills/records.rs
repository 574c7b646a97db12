//! # Analysis Records
//!
//! Typed records exchanged between pipeline stages.
//!
//! Each analysis domain has its own struct and every struct is normalized at
//! the stage boundary: textual fields are never empty (they carry either a
//! value, the [`NO_DATA`] sentinel, or the [`ERROR_SENTINEL`] for degraded
//! records) and scores are clamped into their documented ranges.

use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marks a field the analysis could not fill
pub const NO_DATA: &str = "No data available";

/// Marks every textual field of a degraded record
pub const ERROR_SENTINEL: &str = "Error occurred";

/// Neutral midpoint used for scores of degraded records
pub const NEUTRAL_SCORE: u8 = 5;

/// Name used for placeholder competitor entries
pub const PLACEHOLDER_COMPETITOR: &str = "Data unavailable";

fn fill(field: &mut String) {
    if field.trim().is_empty() {
        *field = NO_DATA.to_string();
    }
}

fn clamp_score(score: u8) -> u8 {
    score.clamp(1, 10)
}

// ============================================================================
// Startup Record
// ============================================================================

/// Normalized startup facts, parsed once per run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct StartupRecord {
    /// What the startup does
    pub description: String,
    #[serde(default, alias = "name")]
    pub company_name: Option<String>,
    /// Market size hint (e.g. "$1B")
    #[serde(default)]
    pub market_size: String,
    #[serde(default)]
    pub competition: String,
    #[serde(default)]
    pub growth_rate: String,
    #[serde(default)]
    pub market_trends: String,
    #[serde(default)]
    pub founder_backgrounds: String,
    #[serde(default)]
    pub track_records: String,
    #[serde(default)]
    pub leadership: String,
    #[serde(default)]
    pub vision_alignment: String,
    #[serde(default)]
    pub team_dynamics: String,
    #[serde(default)]
    pub product_details: String,
    #[serde(default)]
    pub technology_stack: String,
    #[serde(default)]
    pub scalability: String,
    #[serde(default)]
    pub user_feedback: String,
    #[serde(default)]
    pub traction: String,
}

impl StartupRecord {
    /// Company name when one is known and non-blank
    pub fn company(&self) -> Option<&str> {
        self.company_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Market facts block shared by the market prompts
    pub fn market_info(&self) -> String {
        format!(
            "Market size: {}\nCompetition: {}\nMarket Growth Rate: {}\nMarket Trends: {}",
            self.market_size, self.competition, self.growth_rate, self.market_trends
        )
    }

    pub fn product_info(&self) -> String {
        format!(
            "Description: {}\nProduct Details: {}\nTechnology Stack: {}\nScalability: {}\nUser Feedback: {}\nTraction: {}",
            self.description,
            self.product_details,
            self.technology_stack,
            self.scalability,
            self.user_feedback,
            self.traction
        )
    }

    pub fn founder_info(&self) -> String {
        format!(
            "Founder Backgrounds: {}\nTrack Records: {}\nLeadership: {}\nVision Alignment: {}\nTeam Dynamics: {}",
            self.founder_backgrounds,
            self.track_records,
            self.leadership,
            self.vision_alignment,
            self.team_dynamics
        )
    }
}

// ============================================================================
// Market
// ============================================================================

/// A competitor named in a market analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct CompetitorEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub strengths: String,
    #[serde(default)]
    pub weaknesses: String,
}

impl CompetitorEntry {
    /// Entry standing in for missing competitor data. Never a real company.
    pub fn placeholder() -> Self {
        Self {
            name: PLACEHOLDER_COMPETITOR.to_string(),
            description: NO_DATA.to_string(),
            strengths: NO_DATA.to_string(),
            weaknesses: NO_DATA.to_string(),
        }
    }

    fn normalize(&mut self) {
        fill(&mut self.name);
        fill(&mut self.description);
        fill(&mut self.strengths);
        fill(&mut self.weaknesses);
    }
}

/// Where a record's competitor list came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, LLMOutput)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Emitted by the completion service as structured output
    #[default]
    Structured,
    /// Recovered from narrative text
    Extracted,
    /// Nothing usable was found; entries are "data unavailable" markers
    Placeholder,
    /// The stage failed; entries are markers
    Degraded,
}

/// Structured market analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct MarketAnalysis {
    /// Total Addressable Market (TAM) size
    pub total_addressable_market: String,
    /// Serviceable Addressable Market (SAM) size
    pub serviceable_addressable_market: String,
    /// Serviceable Obtainable Market (SOM) size
    pub serviceable_obtainable_market: String,
    /// Market growth rate, CAGR where available
    pub growth_rate: String,
    /// Overview of the competitive landscape
    pub competition: String,
    /// Key competitors
    #[serde(default)]
    pub competitors: Vec<CompetitorEntry>,
    #[serde(default)]
    #[schemars(skip)]
    pub competitor_source: DataSource,
    /// Key market trends
    pub market_trends: String,
    /// Market viability score on a scale of 1 to 10
    pub viability_score: u8,
}

impl MarketAnalysis {
    /// Record for a failed market stage
    pub fn degraded() -> Self {
        Self {
            total_addressable_market: ERROR_SENTINEL.to_string(),
            serviceable_addressable_market: ERROR_SENTINEL.to_string(),
            serviceable_obtainable_market: ERROR_SENTINEL.to_string(),
            growth_rate: ERROR_SENTINEL.to_string(),
            competition: ERROR_SENTINEL.to_string(),
            competitors: vec![CompetitorEntry::placeholder()],
            competitor_source: DataSource::Degraded,
            market_trends: ERROR_SENTINEL.to_string(),
            viability_score: NEUTRAL_SCORE,
        }
    }

    /// Enforce the non-empty invariant and score range
    pub fn normalize(mut self) -> Self {
        fill(&mut self.total_addressable_market);
        fill(&mut self.serviceable_addressable_market);
        fill(&mut self.serviceable_obtainable_market);
        fill(&mut self.growth_rate);
        fill(&mut self.competition);
        fill(&mut self.market_trends);
        self.competitors.retain(|c| !c.name.trim().is_empty());
        if self.competitors.is_empty() {
            self.competitors.push(CompetitorEntry::placeholder());
            if self.competitor_source != DataSource::Degraded {
                self.competitor_source = DataSource::Placeholder;
            }
        }
        self.competitors.iter_mut().for_each(CompetitorEntry::normalize);
        self.viability_score = clamp_score(self.viability_score);
        self
    }

    /// Whether the competitor list holds only markers
    pub fn has_placeholder_competitors(&self) -> bool {
        matches!(
            self.competitor_source,
            DataSource::Placeholder | DataSource::Degraded
        )
    }
}

/// Discursive market analysis produced in natural-language mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MarketNarrative {
    /// The analyst narrative
    pub analysis: String,
    /// Full composite research report
    pub external_report: String,
    /// Financial section of the research report
    pub financial_report: String,
    /// Trend section of the research report
    pub trend_report: String,
    /// Search keywords the research was built from
    pub keywords: Vec<String>,
}

impl MarketNarrative {
    pub fn normalize(mut self) -> Self {
        fill(&mut self.analysis);
        fill(&mut self.external_report);
        fill(&mut self.financial_report);
        fill(&mut self.trend_report);
        self
    }
}

/// Output of the market stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "analysis", rename_all = "snake_case")]
pub enum MarketOutput {
    Structured(MarketAnalysis),
    Narrative(MarketNarrative),
}

impl MarketOutput {
    pub fn normalize(self) -> Self {
        match self {
            MarketOutput::Structured(analysis) => MarketOutput::Structured(analysis.normalize()),
            MarketOutput::Narrative(narrative) => MarketOutput::Narrative(narrative.normalize()),
        }
    }

    pub fn as_structured(&self) -> Option<&MarketAnalysis> {
        match self {
            MarketOutput::Structured(analysis) => Some(analysis),
            MarketOutput::Narrative(_) => None,
        }
    }
}

// ============================================================================
// Product
// ============================================================================

/// Structured product analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct ProductAnalysis {
    /// Analysis of the product's features
    pub features_analysis: String,
    /// Evaluation of the technology stack
    pub tech_stack_evaluation: String,
    /// Assessment of the unique selling proposition
    pub usp_assessment: String,
    /// Product potential score (1-10)
    pub potential_score: u8,
    /// Innovation score (1-10)
    pub innovation_score: u8,
    /// Product-market fit score (1-10)
    pub market_fit_score: u8,
}

impl ProductAnalysis {
    pub fn degraded() -> Self {
        Self {
            features_analysis: ERROR_SENTINEL.to_string(),
            tech_stack_evaluation: ERROR_SENTINEL.to_string(),
            usp_assessment: ERROR_SENTINEL.to_string(),
            potential_score: NEUTRAL_SCORE,
            innovation_score: NEUTRAL_SCORE,
            market_fit_score: NEUTRAL_SCORE,
        }
    }

    pub fn normalize(mut self) -> Self {
        fill(&mut self.features_analysis);
        fill(&mut self.tech_stack_evaluation);
        fill(&mut self.usp_assessment);
        self.potential_score = clamp_score(self.potential_score);
        self.innovation_score = clamp_score(self.innovation_score);
        self.market_fit_score = clamp_score(self.market_fit_score);
        self
    }
}

// ============================================================================
// Founder
// ============================================================================

/// Structured founder analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct FounderAnalysis {
    /// Founder team competency score (1-10)
    pub competency_score: u8,
    /// Overall assessment of the founding team
    pub analysis: String,
    /// Key strengths of the team
    pub strengths: String,
    /// Key challenges or gaps
    pub challenges: String,
}

impl FounderAnalysis {
    pub fn degraded() -> Self {
        Self {
            competency_score: NEUTRAL_SCORE,
            analysis: ERROR_SENTINEL.to_string(),
            strengths: ERROR_SENTINEL.to_string(),
            challenges: ERROR_SENTINEL.to_string(),
        }
    }

    pub fn normalize(mut self) -> Self {
        fill(&mut self.analysis);
        fill(&mut self.strengths);
        fill(&mut self.challenges);
        self.competency_score = clamp_score(self.competency_score);
        self
    }
}

/// Discrete experience tier of a founding team, L1 (first-time) to L5 (serial, proven exits)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum FounderLevel {
    L1,
    L2,
    #[default]
    L3,
    L4,
    L5,
}

impl FounderLevel {
    pub fn all() -> [FounderLevel; 5] {
        [
            FounderLevel::L1,
            FounderLevel::L2,
            FounderLevel::L3,
            FounderLevel::L4,
            FounderLevel::L5,
        ]
    }

    /// Numeric tier, 1..=5
    pub fn rank(&self) -> u8 {
        match self {
            FounderLevel::L1 => 1,
            FounderLevel::L2 => 2,
            FounderLevel::L3 => 3,
            FounderLevel::L4 => 4,
            FounderLevel::L5 => 5,
        }
    }

    /// Tier mapped onto [0, 1]
    pub fn as_unit(&self) -> f64 {
        f64::from(self.rank() - 1) / 4.0
    }

    /// Parse "L3", "l3", "Level 3" or "3"
    pub fn from_label(label: &str) -> Option<FounderLevel> {
        let digit = label.chars().find(|c| c.is_ascii_digit())?;
        match digit {
            '1' => Some(FounderLevel::L1),
            '2' => Some(FounderLevel::L2),
            '3' => Some(FounderLevel::L3),
            '4' => Some(FounderLevel::L4),
            '5' => Some(FounderLevel::L5),
            _ => None,
        }
    }
}

impl fmt::Display for FounderLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.rank())
    }
}

/// Alignment between founder background and startup concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct IdeaFit {
    /// Fit score in [0, 1]
    pub score: f64,
    pub rationale: String,
}

impl IdeaFit {
    pub fn neutral(rationale: impl Into<String>) -> Self {
        Self {
            score: 0.5,
            rationale: rationale.into(),
        }
    }

    pub fn normalize(mut self) -> Self {
        self.score = if self.score.is_finite() {
            self.score.clamp(0.0, 1.0)
        } else {
            0.5
        };
        fill(&mut self.rationale);
        self
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Categorical outcome predicted by the classifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum OutcomeLabel {
    Successful,
    Unsuccessful,
    #[default]
    Unknown,
}

impl fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutcomeLabel::Successful => "Successful",
            OutcomeLabel::Unsuccessful => "Unsuccessful",
            OutcomeLabel::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Classifier output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Prediction {
    pub label: OutcomeLabel,
    /// Probability that the startup succeeds, in [0, 1]
    pub success_probability: f64,
}

impl Prediction {
    pub fn unknown() -> Self {
        Self {
            label: OutcomeLabel::Unknown,
            success_probability: 0.5,
        }
    }
}

/// Yes/No/Unknown signal used by the categorization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, LLMOutput)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Yes,
    No,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, LLMOutput)]
#[serde(rename_all = "snake_case")]
pub enum SizeBand {
    Small,
    Medium,
    Large,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, LLMOutput)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Fintech,
    Healthcare,
    Consumer,
    Enterprise,
    Marketplace,
    Deeptech,
    Climate,
    Education,
    Travel,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, LLMOutput)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStage {
    Idea,
    PreSeed,
    Seed,
    SeriesA,
    Growth,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, LLMOutput)]
#[serde(rename_all = "snake_case")]
pub enum BusinessModel {
    Saas,
    Marketplace,
    Transactional,
    Subscription,
    Hardware,
    Advertising,
    #[default]
    #[serde(other)]
    Other,
}

/// Closed-vocabulary categorization of a startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct CategoryBreakdown {
    #[serde(default)]
    pub sector: Sector,
    #[serde(default)]
    pub stage: CompanyStage,
    #[serde(default)]
    pub business_model: BusinessModel,
    /// Size of the addressable market
    #[serde(default)]
    pub market_size: SizeBand,
    /// Is the industry growing?
    #[serde(default)]
    pub industry_growth: Signal,
    /// Is there evidence of product-market fit?
    #[serde(default)]
    pub product_market_fit: Signal,
    /// Is the company backed by reputable investors?
    #[serde(default)]
    pub investor_backing: Signal,
    /// Does it use cutting-edge technology?
    #[serde(default)]
    pub cutting_edge_technology: Signal,
    /// Is the market timing favorable?
    #[serde(default)]
    pub timing: Signal,
}

/// Classification stage output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Classification {
    pub prediction: Prediction,
    pub breakdown: CategoryBreakdown,
}

// ============================================================================
// Decisions
// ============================================================================

/// Narrative-integrated investment decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct FinalDecision {
    /// Overall score in [0, 10]
    pub overall_score: f64,
    /// Short outcome label (e.g. "Invest", "Hold")
    pub outcome: String,
    pub recommendation: String,
    /// Integrated rationale across all analyses
    #[serde(alias = "IntegratedAnalysis")]
    pub rationale: String,
}

impl FinalDecision {
    pub fn degraded(reason: &str) -> Self {
        Self {
            overall_score: f64::from(NEUTRAL_SCORE),
            outcome: "Analysis Failed".to_string(),
            recommendation: "Try again with more complete information".to_string(),
            rationale: format!("The analysis failed to complete successfully. Error: {}", reason),
        }
    }

    pub fn normalize(mut self) -> Self {
        self.overall_score = if self.overall_score.is_finite() {
            self.overall_score.clamp(0.0, 10.0)
        } else {
            f64::from(NEUTRAL_SCORE)
        };
        fill(&mut self.outcome);
        fill(&mut self.recommendation);
        fill(&mut self.rationale);
        self
    }
}

/// Deterministic decision derived from the classifier and founder scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuantitativeDecision {
    pub outcome: String,
    /// Probability of success in [0, 1]
    pub probability: f64,
    pub rationale: String,
}

/// Any analysis stage output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", content = "record", rename_all = "snake_case")]
pub enum AnalysisRecord {
    Market(MarketOutput),
    Product(ProductAnalysis),
    Founder(FounderAnalysis),
}

impl AnalysisRecord {
    pub fn normalize(self) -> Self {
        match self {
            AnalysisRecord::Market(output) => AnalysisRecord::Market(output.normalize()),
            AnalysisRecord::Product(analysis) => AnalysisRecord::Product(analysis.normalize()),
            AnalysisRecord::Founder(analysis) => AnalysisRecord::Founder(analysis.normalize()),
        }
    }
}
