//! # Scout Skill
//!
//! Intake stage: normalizes the raw input into a [`StartupRecord`], then
//! categorizes it and runs the statistical classifier.

use std::sync::Arc;

use crate::error::{ScoutError, ScoutResult};
use crate::skills::completion::Completer;
use crate::skills::prompts;
use crate::skills::records::{CategoryBreakdown, Classification, Prediction, StartupRecord};
use crate::skills::StageOutcome;
use crate::tools::classifier::{Classifier, FeatureVector};

pub struct ScoutSkill {
    completer: Completer,
    classifier: Arc<dyn Classifier>,
}

impl ScoutSkill {
    pub fn new(completer: Completer, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            completer,
            classifier,
        }
    }

    /// Normalize raw input into a startup record.
    ///
    /// A JSON object is decoded as-is; free text goes through the record
    /// parser prompt. Any failure here is fatal for the run.
    pub async fn parse_record(&self, input: &str) -> ScoutResult<StartupRecord> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ScoutError::parse("input is empty"));
        }

        let record = if input.starts_with('{') {
            serde_json::from_str::<StartupRecord>(input)
                .map_err(|e| ScoutError::parse(format!("invalid startup record: {}", e)))?
        } else {
            self.completer
                .structured::<StartupRecord>("scout.parse", prompts::RECORD_PARSER, input)
                .await
                .map_err(|e| ScoutError::parse(format!("could not structure input: {}", e)))?
        };

        if record.description.trim().is_empty() {
            return Err(ScoutError::parse("startup description is empty"));
        }

        tracing::info!(
            company = record.company().unwrap_or("unnamed"),
            "Parsed startup record"
        );
        Ok(record)
    }

    /// Categorize the record and run the classifier.
    ///
    /// The outcome is degraded when the classifier itself fails; a failed
    /// categorization only falls back to an all-unknown breakdown.
    pub async fn classify(&self, record: &StartupRecord) -> StageOutcome<Classification> {
        let prompt = format!(
            "Description: {}\n{}\n{}\n{}",
            record.description,
            record.market_info(),
            record.product_info(),
            record.founder_info()
        );
        let mut errors = Vec::new();

        let breakdown = match self
            .completer
            .structured::<CategoryBreakdown>("scout.categorize", prompts::CATEGORIZATION, &prompt)
            .await
        {
            Ok(breakdown) => breakdown,
            Err(e) => {
                tracing::warn!("Categorization failed, using unknown categories: {}", e);
                errors.push(format!("categorization: {}", e));
                CategoryBreakdown::default()
            }
        };

        let features = FeatureVector::from_record(record, &breakdown);
        match self.classifier.predict(&features) {
            Ok(prediction) => {
                tracing::info!(
                    label = %prediction.label,
                    probability = prediction.success_probability,
                    "Classification complete"
                );
                StageOutcome::ok(Classification {
                    prediction,
                    breakdown,
                })
                .with_errors(errors)
            }
            Err(e) => {
                tracing::warn!("Classifier failed: {}", e);
                errors.push(e.to_string());
                StageOutcome::degraded(
                    Classification {
                        prediction: Prediction::unknown(),
                        breakdown,
                    },
                    errors,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::records::{OutcomeLabel, Sector, Signal};
    use crate::testing::{completer, FailingCompletion, FixedClassifier, ScriptedCompletion};
    use crate::tools::classifier::LogisticClassifier;
    use serde_json::json;

    fn skill(client: ScriptedCompletion) -> ScoutSkill {
        ScoutSkill::new(completer(client), Arc::new(LogisticClassifier::default()))
    }

    #[tokio::test]
    async fn test_parse_json_record_without_collaborator() {
        let skill = ScoutSkill::new(completer(FailingCompletion), Arc::new(LogisticClassifier::default()));
        let record = skill
            .parse_record(r#"{"description": "X", "market_size": "$1B", "growth_rate": "20%"}"#)
            .await
            .unwrap();

        assert_eq!(record.description, "X");
        assert_eq!(record.market_size, "$1B");
        assert_eq!(record.competition, "");
    }

    #[tokio::test]
    async fn test_parse_free_text() {
        let client = ScriptedCompletion::new().on_json(
            "Startup Record Parser",
            json!({ "description": "Payments API for developers", "company_name": "Stripe" }),
        );
        let record = skill(client).parse_record("Stripe builds payments APIs.").await.unwrap();
        assert_eq!(record.company(), Some("Stripe"));
    }

    #[tokio::test]
    async fn test_parse_errors_are_fatal() {
        let skill = ScoutSkill::new(completer(FailingCompletion), Arc::new(LogisticClassifier::default()));

        let empty = skill.parse_record("   ").await.unwrap_err();
        assert!(empty.is_fatal());

        let blank = skill.parse_record(r#"{"description": ""}"#).await.unwrap_err();
        assert!(matches!(blank, ScoutError::Parse { .. }));

        let unstructured = skill.parse_record("some startup").await.unwrap_err();
        assert!(unstructured.is_fatal());
    }

    #[tokio::test]
    async fn test_classification_is_idempotent() {
        let client = ScriptedCompletion::new().with_json(json!({
            "sector": "fintech",
            "stage": "series_a",
            "market_size": "large",
            "industry_growth": "yes",
            "product_market_fit": "yes",
            "timing": "maybe"
        }));
        let skill = skill(client);
        let record = StartupRecord {
            description: "Payments API".to_string(),
            traction: "10k merchants".to_string(),
            ..StartupRecord::default()
        };

        let first = skill.classify(&record).await;
        let second = skill.classify(&record).await;

        assert_eq!(first, second);
        assert_eq!(first.value.breakdown.sector, Sector::Fintech);
        assert_eq!(first.value.breakdown.timing, Signal::Unknown);
        assert!(first.errors.is_empty());
    }

    #[tokio::test]
    async fn test_classifier_failure_yields_unknown() {
        let skill = ScoutSkill::new(completer(FailingCompletion), Arc::new(FixedClassifier(None)));
        let record = StartupRecord {
            description: "X".to_string(),
            ..StartupRecord::default()
        };

        let outcome = skill.classify(&record).await;

        assert!(outcome.degraded);
        assert_eq!(outcome.value.prediction.label, OutcomeLabel::Unknown);
        assert_eq!(outcome.value.prediction.success_probability, 0.5);
        assert_eq!(outcome.value.breakdown, CategoryBreakdown::default());
        assert_eq!(outcome.errors.len(), 2);
    }
}
