//! The run orchestrator.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

use super::failure::{FailureRecord, StageRecord, StageStatus};
use super::outcome::{RunOutcome, RunReport};
use super::state::PipelineStateMachine;
use crate::config::{DatasetSchema, Settings, ValidationPolicy};
use crate::connectors::Connectors;
use crate::core::{PipelineState, RunIdentity, StageKind};
use crate::entities::{DataValidationArtifact, StageConfigs};
use crate::errors::{FailureCause, PipelineError, StageError};
use crate::events::{self, EventSink, LoggingEventSink};
use crate::observability::SpanTimer;
use crate::stages::{
    DataIngestion, DataTransformation, DataValidation, ModelEvaluation, ModelPusher, ModelTrainer,
    Stage,
};

/// Runs validation and turns a failed report into an error under [`ValidationPolicy::Halt`].
struct ValidationGate<'a> {
    inner: DataValidation<'a>,
    policy: ValidationPolicy,
}

#[async_trait]
impl Stage for ValidationGate<'_> {
    type Artifact = DataValidationArtifact;

    fn kind(&self) -> StageKind {
        self.inner.kind()
    }

    async fn execute(&self) -> Result<DataValidationArtifact, StageError> {
        let artifact = self.inner.execute().await?;
        if !artifact.validation_status && self.policy == ValidationPolicy::Halt {
            return Err(StageError::Validation(FailureCause::ValidationFailed {
                message: artifact.message,
                report: artifact.validation_report_file_path,
            }));
        }
        Ok(artifact)
    }
}

/// Mutable bookkeeping for one run, kept apart from the stage inputs so stages
/// can borrow configs while the tracker is updated.
struct RunTracker {
    pipeline: String,
    run_id: String,
    events: Arc<dyn EventSink>,
    machine: PipelineStateMachine,
    records: Vec<StageRecord>,
    failure: Option<FailureRecord>,
}

impl RunTracker {
    async fn run_stage<S: Stage>(&mut self, stage: S) -> Result<S::Artifact, PipelineError> {
        let kind = stage.kind();
        self.machine.advance(kind.state())?;

        self.events
            .emit(
                events::STAGE_STARTED,
                Some(json!({ "stage": kind, "run_id": self.run_id })),
            )
            .await;
        let timer = SpanTimer::start(kind.to_string());
        let result = stage
            .execute()
            .instrument(info_span!("stage", stage = %kind))
            .await;
        let duration_ms = timer.finish();

        match result {
            Ok(artifact) => {
                info!(stage = %kind, duration_ms, "Stage completed");
                self.events
                    .emit(
                        events::STAGE_COMPLETED,
                        Some(json!({ "stage": kind, "duration_ms": duration_ms })),
                    )
                    .await;
                self.records.push(StageRecord {
                    stage: kind,
                    status: StageStatus::Completed,
                    duration_ms,
                    artifact: serde_json::to_value(&artifact).ok(),
                });
                Ok(artifact)
            }
            Err(err) => {
                let state = self.machine.current();
                let record = FailureRecord::from_stage_error(&err, state, duration_ms);
                error!(
                    stage = %kind,
                    category = ?record.category,
                    error = %record.chain.join(": "),
                    "Stage failed"
                );
                self.events
                    .emit(events::STAGE_FAILED, serde_json::to_value(&record).ok())
                    .await;
                self.records.push(StageRecord {
                    stage: kind,
                    status: StageStatus::Failed,
                    duration_ms,
                    artifact: None,
                });
                self.failure = Some(record);
                Err(PipelineError::Halted {
                    pipeline: self.pipeline.clone(),
                    run_id: self.run_id.clone(),
                    state,
                    source: err,
                })
            }
        }
    }
}

/// Runs the six training stages in order for one run identity.
///
/// A pipeline value is single-use: a second [`TrainPipeline::run`] fails with
/// an illegal transition.
pub struct TrainPipeline {
    settings: Settings,
    schema: DatasetSchema,
    connectors: Connectors,
    identity: RunIdentity,
    configs: StageConfigs,
    tracker: RunTracker,
}

impl TrainPipeline {
    /// Creates a pipeline for a fresh run identity.
    #[must_use]
    pub fn new(settings: Settings, schema: DatasetSchema, connectors: Connectors) -> Self {
        let identity = RunIdentity::new();
        let configs = StageConfigs::new(&settings, &identity);
        let tracker = RunTracker {
            pipeline: settings.pipeline.name.clone(),
            run_id: identity.timestamp.clone(),
            events: Arc::new(LoggingEventSink::default()),
            machine: PipelineStateMachine::new(),
            records: Vec::new(),
            failure: None,
        };
        Self {
            settings,
            schema,
            connectors,
            identity,
            configs,
            tracker,
        }
    }

    /// Replaces the run identity, which also moves the artifact directory.
    #[must_use]
    pub fn with_identity(mut self, identity: RunIdentity) -> Self {
        self.configs = StageConfigs::new(&self.settings, &identity);
        self.tracker.run_id.clone_from(&identity.timestamp);
        self.identity = identity;
        self
    }

    /// Sends lifecycle events to `sink` instead of the log.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.tracker.events = sink;
        self
    }

    /// The run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Stage configurations derived for this run.
    #[must_use]
    pub fn configs(&self) -> &StageConfigs {
        &self.configs
    }

    /// Current state of the run.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.tracker.machine.current()
    }

    /// Stages executed so far.
    #[must_use]
    pub fn stage_records(&self) -> &[StageRecord] {
        &self.tracker.records
    }

    /// Why the run halted, if it did.
    #[must_use]
    pub fn failure(&self) -> Option<&FailureRecord> {
        self.tracker.failure.as_ref()
    }

    /// Executes the run. Connectors are closed whether or not it succeeds.
    pub async fn run(&mut self) -> Result<RunReport, PipelineError> {
        let span = info_span!(
            "pipeline",
            pipeline = %self.tracker.pipeline,
            run_id = %self.identity.pipeline_run_id,
            timestamp = %self.identity.timestamp,
        );
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&mut self) -> Result<RunReport, PipelineError> {
        info!(artifact_dir = %self.configs.run_dir().display(), "Starting training pipeline");
        self.tracker
            .events
            .emit(events::PIPELINE_STARTED, Some(json!(self.identity.to_dict())))
            .await;

        let result = self.run_stages().await;
        self.connectors.close().await;

        match &result {
            Ok(outcome) => {
                info!(pushed = outcome.is_pushed(), "Training pipeline finished");
                self.tracker
                    .events
                    .emit(
                        events::PIPELINE_COMPLETED,
                        Some(json!({ "pushed": outcome.is_pushed() })),
                    )
                    .await;
            }
            Err(err) => {
                self.tracker
                    .events
                    .emit(events::PIPELINE_FAILED, Some(json!(err.to_dict())))
                    .await;
            }
        }

        let outcome = result?;
        Ok(RunReport {
            pipeline: self.tracker.pipeline.clone(),
            identity: self.identity.clone(),
            artifact_dir: self.configs.run_dir().to_path_buf(),
            final_state: self.tracker.machine.current(),
            outcome,
            stages: self.tracker.records.clone(),
        })
    }

    async fn run_stages(&mut self) -> Result<RunOutcome, PipelineError> {
        let Self {
            settings,
            schema,
            connectors,
            configs,
            tracker,
            ..
        } = self;
        let documents = connectors.documents.as_ref();
        let objects = connectors.objects.as_ref();

        let ingestion = tracker
            .run_stage(DataIngestion::new(&configs.ingestion, documents))
            .await?;

        let validation = tracker
            .run_stage(ValidationGate {
                inner: DataValidation::new(&configs.validation, &ingestion, schema),
                policy: settings.pipeline.validation_policy,
            })
            .await?;

        let transformation = tracker
            .run_stage(DataTransformation::new(
                &configs.transformation,
                &ingestion,
                &validation,
                schema,
            ))
            .await?;

        let trainer = tracker
            .run_stage(ModelTrainer::new(&configs.trainer, &transformation))
            .await?;

        let evaluation = tracker
            .run_stage(ModelEvaluation::new(
                &configs.evaluation,
                &ingestion,
                &trainer,
                objects,
            ))
            .await?;

        let outcome = if evaluation.is_model_accepted {
            let pushed = tracker
                .run_stage(ModelPusher::new(&configs.pusher, &evaluation, objects))
                .await?;
            RunOutcome::Pushed { evaluation, pushed }
        } else {
            tracker.machine.advance(PipelineState::Skip)?;
            info!(
                trained_model_score = evaluation.trained_model_score,
                production_model_score = ?evaluation.production_model_score,
                "Model not accepted; skipping publish"
            );
            tracker
                .events
                .emit(
                    events::MODEL_REJECTED,
                    Some(json!({
                        "trained_model_score": evaluation.trained_model_score,
                        "production_model_score": evaluation.production_model_score,
                        "changed_accuracy": evaluation.changed_accuracy,
                    })),
                )
                .await;
            RunOutcome::SkippedNotAccepted { evaluation }
        };

        tracker.machine.advance(PipelineState::Done)?;
        Ok(outcome)
    }
}

impl std::fmt::Debug for TrainPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainPipeline")
            .field("pipeline", &self.tracker.pipeline)
            .field("identity", &self.identity)
            .field("state", &self.tracker.machine.current())
            .field("connectors", &self.connectors)
            .finish_non_exhaustive()
    }
}
