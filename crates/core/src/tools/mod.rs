//! # Scout Tools
//!
//! Deterministic machinery and external collaborators used by the skills.
//!
//! ## Modules
//!
//! - `extractor` - Recovers structured fields from narrative text
//! - `search` - Web search providers (SearXNG, serper.dev)
//! - `classifier` - Feature vector + logistic success classifier

pub mod classifier;
pub mod extractor;
pub mod search;

pub use classifier::{Classifier, FeatureVector, LogisticClassifier};
pub use search::{SearchProvider, SearxngSearch, SerperSearch};
