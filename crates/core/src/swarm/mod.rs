//! # Swarm Orchestration
//!
//! Coordinates the evaluation pipeline.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Input → Parse → Classification → Market ∥ Product ∥ Founder ∥ Segmentation ∥ Idea Fit → Integration
//! ```

pub mod coordinator;
pub mod events;
pub mod pipeline;
pub mod result;

pub use coordinator::{Coordinator, CoordinatorSettings, FailurePolicy};
pub use events::{PipelineEvent, PipelineEventKind, RunContext};
pub use pipeline::{Pipeline, PipelinePhase, StageKind};
pub use result::PipelineResult;
