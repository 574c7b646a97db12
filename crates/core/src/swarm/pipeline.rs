//! # Pipeline Stages
//!
//! Stage identifiers and the run state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unit of work inside a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Parse,
    Classification,
    Market,
    Product,
    Founder,
    Segmentation,
    IdeaFit,
    Integration,
}

impl StageKind {
    pub fn all() -> [StageKind; 8] {
        [
            StageKind::Parse,
            StageKind::Classification,
            StageKind::Market,
            StageKind::Product,
            StageKind::Founder,
            StageKind::Segmentation,
            StageKind::IdeaFit,
            StageKind::Integration,
        ]
    }

    /// Key used in config files for per-stage model overrides
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Parse => "parse",
            StageKind::Classification => "classification",
            StageKind::Market => "market",
            StageKind::Product => "product",
            StageKind::Founder => "founder",
            StageKind::Segmentation => "segmentation",
            StageKind::IdeaFit => "idea_fit",
            StageKind::Integration => "integration",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    /// Normalizing the input into a startup record
    Parsing,
    /// Categorization + statistical prediction
    Classifying,
    /// Market / product / founder analyses in parallel
    Analyzing,
    /// Final and quantitative decisions
    Integrating,
    Complete,
    /// Stopped early by the abort failure policy
    Aborted,
    Failed,
}

/// The pipeline state machine
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub phase: PipelinePhase,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            phase: PipelinePhase::Parsing,
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next phase
    pub fn advance(&mut self) {
        self.phase = match self.phase {
            PipelinePhase::Parsing => PipelinePhase::Classifying,
            PipelinePhase::Classifying => PipelinePhase::Analyzing,
            PipelinePhase::Analyzing => PipelinePhase::Integrating,
            PipelinePhase::Integrating => PipelinePhase::Complete,
            PipelinePhase::Complete => PipelinePhase::Complete,
            PipelinePhase::Aborted => PipelinePhase::Aborted,
            PipelinePhase::Failed => PipelinePhase::Failed,
        };
    }

    pub fn abort(&mut self) {
        self.phase = PipelinePhase::Aborted;
    }

    pub fn fail(&mut self) {
        self.phase = PipelinePhase::Failed;
    }

    pub fn is_success(&self) -> bool {
        self.phase == PipelinePhase::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_advance() {
        let mut pipeline = Pipeline::new();
        assert_eq!(pipeline.phase, PipelinePhase::Parsing);

        pipeline.advance();
        assert_eq!(pipeline.phase, PipelinePhase::Classifying);

        pipeline.advance();
        pipeline.advance();
        pipeline.advance();
        assert!(pipeline.is_success());

        pipeline.advance();
        assert_eq!(pipeline.phase, PipelinePhase::Complete);
    }

    #[test]
    fn test_abort_is_terminal() {
        let mut pipeline = Pipeline::new();
        pipeline.advance();
        pipeline.abort();
        pipeline.advance();

        assert_eq!(pipeline.phase, PipelinePhase::Aborted);
        assert!(!pipeline.is_success());
    }

    #[test]
    fn test_stage_keys_round_trip_through_serde() {
        for stage in StageKind::all() {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage.as_str()));
        }
    }
}
