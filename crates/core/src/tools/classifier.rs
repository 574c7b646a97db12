//! # Outcome Classifier
//!
//! Statistical success classifier over a fixed feature vector.
//!
//! The feature vector is derived deterministically from a [`StartupRecord`]
//! and its [`CategoryBreakdown`], so identical inputs always produce identical
//! predictions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ScoutError, ScoutResult};
use crate::skills::records::{
    CategoryBreakdown, CompanyStage, OutcomeLabel, Prediction, Signal, SizeBand, StartupRecord,
};

/// Named numeric features, each in [0, 1]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: BTreeMap<String, f64>,
}

fn signal_value(signal: Signal) -> f64 {
    match signal {
        Signal::Yes => 1.0,
        Signal::No => 0.0,
        Signal::Unknown => 0.5,
    }
}

fn present(field: &str) -> f64 {
    if field.trim().is_empty() {
        0.0
    } else {
        1.0
    }
}

impl FeatureVector {
    pub fn from_record(record: &StartupRecord, breakdown: &CategoryBreakdown) -> Self {
        let market_size = match breakdown.market_size {
            SizeBand::Small => 0.0,
            SizeBand::Medium => 0.5,
            SizeBand::Large => 1.0,
            SizeBand::Unknown => 0.5,
        };
        let stage = match breakdown.stage {
            CompanyStage::Idea => 0.0,
            CompanyStage::PreSeed => 0.2,
            CompanyStage::Seed => 0.4,
            CompanyStage::SeriesA => 0.7,
            CompanyStage::Growth => 1.0,
            CompanyStage::Unknown => 0.3,
        };
        let detail = (record.description.split_whitespace().count() as f64 / 100.0).min(1.0);

        let values = BTreeMap::from([
            ("industry_growth".to_string(), signal_value(breakdown.industry_growth)),
            ("product_market_fit".to_string(), signal_value(breakdown.product_market_fit)),
            ("investor_backing".to_string(), signal_value(breakdown.investor_backing)),
            (
                "cutting_edge_technology".to_string(),
                signal_value(breakdown.cutting_edge_technology),
            ),
            ("timing".to_string(), signal_value(breakdown.timing)),
            ("market_size".to_string(), market_size),
            ("stage".to_string(), stage),
            ("has_traction".to_string(), present(&record.traction)),
            ("has_founder_background".to_string(), present(&record.founder_backgrounds)),
            ("description_detail".to_string(), detail),
        ]);

        Self { values }
    }

    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }
}

/// Statistical classifier collaborator
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> ScoutResult<Prediction>;
}

/// Logistic model loaded from JSON
///
/// ```json
/// { "bias": -2.0, "threshold": 0.5, "weights": { "timing": 0.8 } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticClassifier {
    pub bias: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    pub weights: BTreeMap<String, f64>,
}

fn default_threshold() -> f64 {
    0.5
}

impl Default for LogisticClassifier {
    fn default() -> Self {
        let weights = BTreeMap::from([
            ("industry_growth".to_string(), 0.9),
            ("product_market_fit".to_string(), 1.4),
            ("investor_backing".to_string(), 1.1),
            ("cutting_edge_technology".to_string(), 0.5),
            ("timing".to_string(), 0.8),
            ("market_size".to_string(), 0.7),
            ("stage".to_string(), 0.6),
            ("has_traction".to_string(), 0.9),
            ("has_founder_background".to_string(), 0.4),
            ("description_detail".to_string(), 0.2),
        ]);
        Self {
            bias: -3.7,
            threshold: default_threshold(),
            weights,
        }
    }
}

impl LogisticClassifier {
    pub fn from_json(json: &str) -> ScoutResult<Self> {
        serde_json::from_str(json).map_err(|e| ScoutError::Classifier {
            message: format!("Invalid classifier model: {}", e),
        })
    }

    pub fn from_path(path: &Path) -> ScoutResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    fn score(&self, features: &FeatureVector) -> f64 {
        let z = self.bias
            + self
                .weights
                .iter()
                .map(|(name, weight)| weight * features.get(name))
                .sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }
}

impl Classifier for LogisticClassifier {
    fn predict(&self, features: &FeatureVector) -> ScoutResult<Prediction> {
        let probability = self.score(features);
        if !probability.is_finite() {
            return Err(ScoutError::Classifier {
                message: "Model produced a non-finite probability".to_string(),
            });
        }

        let label = if probability >= self.threshold {
            OutcomeLabel::Successful
        } else {
            OutcomeLabel::Unsuccessful
        };
        Ok(Prediction {
            label,
            success_probability: probability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strong_breakdown() -> CategoryBreakdown {
        CategoryBreakdown {
            market_size: SizeBand::Large,
            stage: CompanyStage::SeriesA,
            industry_growth: Signal::Yes,
            product_market_fit: Signal::Yes,
            investor_backing: Signal::Yes,
            cutting_edge_technology: Signal::Yes,
            timing: Signal::Yes,
            ..CategoryBreakdown::default()
        }
    }

    #[test]
    fn test_features_are_deterministic() {
        let record = StartupRecord {
            description: "Payments API for developers".to_string(),
            traction: "10k merchants".to_string(),
            ..StartupRecord::default()
        };
        let a = FeatureVector::from_record(&record, &strong_breakdown());
        let b = FeatureVector::from_record(&record, &strong_breakdown());
        assert_eq!(a, b);
        assert_eq!(a.get("has_traction"), 1.0);
        assert_eq!(a.get("has_founder_background"), 0.0);
    }

    #[test]
    fn test_strong_profile_scores_higher() {
        let record = StartupRecord {
            description: "Payments API".to_string(),
            traction: "10k merchants".to_string(),
            founder_backgrounds: "Ex-PayPal engineers".to_string(),
            ..StartupRecord::default()
        };
        let model = LogisticClassifier::default();
        let strong = model
            .predict(&FeatureVector::from_record(&record, &strong_breakdown()))
            .unwrap();
        let unknown = model
            .predict(&FeatureVector::from_record(&record, &CategoryBreakdown::default()))
            .unwrap();

        assert!(strong.success_probability > unknown.success_probability);
        assert_eq!(strong.label, OutcomeLabel::Successful);
    }

    #[test]
    fn test_model_from_json() {
        let model = LogisticClassifier::from_json(r#"{"bias": 0.0, "weights": {}}"#).unwrap();
        let prediction = model.predict(&FeatureVector::default()).unwrap();
        assert_eq!(prediction.success_probability, 0.5);
        assert_eq!(prediction.label, OutcomeLabel::Successful);

        assert!(LogisticClassifier::from_json("not json").is_err());
    }
}
