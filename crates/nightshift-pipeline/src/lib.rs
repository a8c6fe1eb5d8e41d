//! Submission pipeline: normalize, prompt, generate, deliver.
//!
//! Each submission is one sequential run through the stage machine
//! `Received → Normalized → Generated → Delivered`. The first failure is
//! terminal and is reported as [`PipelineError`], whose
//! [`failed_stage`](PipelineError::failed_stage) names the stage that was not
//! reached.

mod error;
pub use error::{DeliveryError, PipelineError};

pub mod orchestrator;
pub use orchestrator::{DeliveryOrchestrator, DeliveryOutcome, Sink, SinkKind};

pub mod render;
pub use render::render_plan_html;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nightshift_ai::{GenerationError, PlanGenerator};
use nightshift_core::{
    CanonicalIntake, GenerationRequest, IntakeNormalizer, NormalizationWarning, RawPayload,
};
use serde::Serialize;
use tracing::{info, warn};

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Received,
    Normalized,
    Generated,
    Delivered,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Normalized => "normalized",
            Self::Generated => "generated",
            Self::Delivered => "delivered",
        };
        f.write_str(s)
    }
}

/// A stage reached by one submission, stamped by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageEvent {
    pub stage: Stage,
    pub at: DateTime<Utc>,
}

/// Stage history of one run.
#[derive(Debug, Default)]
struct Trail {
    submission_id: Option<String>,
    events: Vec<StageEvent>,
}

impl Trail {
    fn enter(&mut self, stage: Stage) {
        let event = StageEvent {
            stage,
            at: Utc::now(),
        };
        info!(
            stage = %event.stage,
            submission_id = self.submission_id.as_deref().unwrap_or("-"),
            "stage reached"
        );
        self.events.push(event);
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub intake: CanonicalIntake,
    pub warnings: Vec<NormalizationWarning>,
    pub outcome: DeliveryOutcome,
    pub transitions: Vec<StageEvent>,
}

/// One configured pipeline, shared by all submissions.
pub struct Pipeline {
    normalizer: IntakeNormalizer,
    generator: Arc<dyn PlanGenerator>,
    orchestrator: DeliveryOrchestrator,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(
        normalizer: IntakeNormalizer,
        generator: Arc<dyn PlanGenerator>,
        orchestrator: DeliveryOrchestrator,
    ) -> Self {
        Self {
            normalizer,
            generator,
            orchestrator,
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    /// Cancel generation that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn normalizer(&self) -> &IntakeNormalizer {
        &self.normalizer
    }

    pub fn orchestrator(&self) -> &DeliveryOrchestrator {
        &self.orchestrator
    }

    /// Run a raw webhook body.
    pub async fn run(&self, body: &[u8]) -> Result<Receipt, PipelineError> {
        let mut trail = Trail::default();
        trail.enter(Stage::Received);
        let payload = RawPayload::from_slice(body).inspect_err(|e| {
            warn!(stage = %Stage::Normalized, error = %e, "submission failed");
        })?;
        self.advance(payload, trail).await
    }

    /// Run an already parsed payload.
    pub async fn run_payload(&self, payload: RawPayload) -> Result<Receipt, PipelineError> {
        let mut trail = Trail::default();
        trail.enter(Stage::Received);
        self.advance(payload, trail).await
    }

    async fn advance(&self, payload: RawPayload, mut trail: Trail) -> Result<Receipt, PipelineError> {
        trail.submission_id = Some(payload.submission_id().to_string());
        let result = self.stages(&payload, &mut trail).await;
        if let Err(e) = &result {
            warn!(
                submission_id = %payload.submission_id(),
                stage = %e.failed_stage(),
                error = %e,
                "submission failed"
            );
        }
        result
    }

    async fn stages(&self, payload: &RawPayload, trail: &mut Trail) -> Result<Receipt, PipelineError> {
        let normalized = self.normalizer.normalize(payload)?;
        trail.enter(Stage::Normalized);

        let request = GenerationRequest::from_intake(&normalized.intake);
        let text = tokio::time::timeout(self.timeout, self.generator.generate(&request))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))
            .and_then(|r| r)
            .map_err(PipelineError::DownstreamFailure)?;
        trail.enter(Stage::Generated);

        let outcome = self
            .orchestrator
            .deliver(&normalized.intake, text)
            .await
            .map_err(PipelineError::DeliveryFailure)?;
        trail.enter(Stage::Delivered);

        Ok(Receipt {
            intake: normalized.intake,
            warnings: normalized.warnings,
            outcome,
            transitions: std::mem::take(&mut trail.events),
        })
    }
}
