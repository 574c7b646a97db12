//! # Pipeline Result
//!
//! The aggregate output of one run, handed to the presentation layer as JSON.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::skills::records::{
    AnalysisRecord, Classification, FinalDecision, FounderAnalysis, FounderLevel, IdeaFit, MarketOutput,
    ProductAnalysis, QuantitativeDecision, StartupRecord,
};
use crate::skills::{AnalysisMode, StageOutcome};

use super::pipeline::StageKind;

/// One slot per stage. A slot is `None` only when the run stopped before
/// that stage ran.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: String,
    pub mode: AnalysisMode,
    pub startup: StartupRecord,
    pub classification: Option<Classification>,
    pub market: Option<MarketOutput>,
    pub product: Option<ProductAnalysis>,
    pub founder: Option<FounderAnalysis>,
    pub segmentation: Option<FounderLevel>,
    pub idea_fit: Option<IdeaFit>,
    pub final_decision: Option<FinalDecision>,
    pub quantitative_decision: Option<QuantitativeDecision>,
    /// Errors absorbed by stages that fell back, keyed by stage
    pub errors: BTreeMap<StageKind, Vec<String>>,
    /// Stages that returned a degraded fallback value
    pub degraded: Vec<StageKind>,
    /// Last stage that ran when the abort policy stopped the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted_after: Option<StageKind>,
}

impl PipelineResult {
    pub fn new(run_id: impl Into<String>, mode: AnalysisMode, startup: StartupRecord) -> Self {
        Self {
            run_id: run_id.into(),
            mode,
            startup,
            classification: None,
            market: None,
            product: None,
            founder: None,
            segmentation: None,
            idea_fit: None,
            final_decision: None,
            quantitative_decision: None,
            errors: BTreeMap::new(),
            degraded: Vec::new(),
            aborted_after: None,
        }
    }

    /// Record a stage's bookkeeping and hand back its value
    pub fn absorb<T>(&mut self, stage: StageKind, outcome: StageOutcome<T>) -> T {
        if !outcome.errors.is_empty() {
            self.errors.entry(stage).or_default().extend(outcome.errors);
        }
        if outcome.degraded {
            self.degraded.push(stage);
        }
        outcome.value
    }

    /// Fill the slot an analysis record belongs to, normalized
    pub fn store(&mut self, record: AnalysisRecord) {
        match record.normalize() {
            AnalysisRecord::Market(output) => self.market = Some(output),
            AnalysisRecord::Product(analysis) => self.product = Some(analysis),
            AnalysisRecord::Founder(analysis) => self.founder = Some(analysis),
        }
    }

    pub fn is_degraded(&self, stage: StageKind) -> bool {
        self.degraded.contains(&stage)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted_after.is_some()
    }

    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }
}
