//! # Pipeline Events
//!
//! Progress events for a run, plus the [`RunContext`] handle every stage
//! receives. The context carries the run id and the optional event channel,
//! so stages report progress without any process-wide logger state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::pipeline::StageKind;

/// Kind of pipeline event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEventKind {
    RunStarted,
    StageStarted,
    StageCompleted,
    /// Stage fell back to a degraded or partial result
    StageDegraded,
    ResearchStarted,
    /// Research progress (keywords, searches, synthesis)
    ResearchProgress,
    ResearchCompleted,
    RunCompleted,
    /// Stopped early under the abort failure policy
    RunAborted,
    RunFailed,
}

/// An event in a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub id: String,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: PipelineEventKind,
    #[serde(default)]
    pub stage: Option<StageKind>,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl PipelineEvent {
    pub fn new(kind: PipelineEventKind, run_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            timestamp: Utc::now(),
            kind,
            stage: None,
            data: None,
        }
    }

    pub fn with_stage(mut self, stage: StageKind) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Observability handle for one run
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: String,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            event_tx: None,
        }
    }

    /// Stream events to `tx` as the run progresses
    pub fn with_event_channel(mut self, tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn event(&self, kind: PipelineEventKind) -> PipelineEvent {
        PipelineEvent::new(kind, &self.run_id)
    }

    /// Send an event. A closed or missing channel is ignored.
    pub async fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Convenience for stage-scoped events
    pub async fn emit_stage(
        &self,
        kind: PipelineEventKind,
        stage: StageKind,
        data: Option<serde_json::Value>,
    ) {
        let mut event = self.event(kind).with_stage(stage);
        event.data = data;
        self.emit(event).await;
    }

    /// Tracing span tagged with the run id
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("scout_run", run_id = %self.run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let ctx = RunContext::new();
        let event = ctx
            .event(PipelineEventKind::StageStarted)
            .with_stage(StageKind::Market);

        assert_eq!(event.run_id, ctx.run_id());
        assert_eq!(event.stage, Some(StageKind::Market));
    }

    #[tokio::test]
    async fn test_events_reach_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let ctx = RunContext::new().with_event_channel(tx);

        ctx.emit_stage(
            PipelineEventKind::StageDegraded,
            StageKind::Product,
            Some(serde_json::json!({"error": "timeout"})),
        )
        .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, PipelineEventKind::StageDegraded);
        assert_eq!(event.data.unwrap()["error"], "timeout");
    }

    #[tokio::test]
    async fn test_emit_without_channel_is_noop() {
        RunContext::new()
            .emit(PipelineEvent::new(PipelineEventKind::RunStarted, "r"))
            .await;
    }
}
