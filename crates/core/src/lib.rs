//! # Scout Core
//!
//! Startup evaluation pipeline: record parsing, concurrent market / product /
//! founder analyses, web research aggregation, and the fallback text parser
//! that recovers structured fields from narrative completions.
//!
//! ## Architecture
//!
//! - `skills/` - One skill per pipeline stage, plus the research aggregator
//! - `tools/` - Text field extractor, search providers, outcome classifier
//! - `models` - LLM provider configuration
//! - `config` - Persisted settings (`.scout/config.json`)
//! - `swarm/` - Stage orchestration, events and the run result
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scout_core::config::ScoutConfig;
//! use scout_core::swarm::Coordinator;
//!
//! let config = ScoutConfig::load().await;
//! let coordinator = Coordinator::from_config(&config)?;
//! let result = coordinator.run("Stripe builds payment APIs for developers").await?;
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod skills;
pub mod swarm;
pub mod tools;

#[cfg(test)]
mod testing;

pub use error::{ScoutError, ScoutResult};
