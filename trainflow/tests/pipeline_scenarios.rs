//! End-to-end runs against in-memory connectors.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use ndarray::Array1;
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;

use trainflow::config::Settings;
use trainflow::connectors::{Connectors, MongoDocumentStore, ObjectStorage};
use trainflow::core::{PipelineState, RunIdentity, StageKind};
use trainflow::data::Table;
use trainflow::errors::ErrorCategory;
use trainflow::events::{self, CollectingEventSink};
use trainflow::ml::{ForestParams, Preprocessor, RandomForestClassifier, SplitCriterion, TrainedModel};
use trainflow::pipeline::{RunOutcome, StageStatus, TrainPipeline};
use trainflow::stages::is_model_accepted;
use trainflow::testing::fixtures::{
    insurance_records, insurance_schema, insurance_table, test_settings, BUCKET, COLLECTION,
};
use trainflow::testing::{InMemoryConnectors, InMemoryObjectStorage};

fn pipeline(settings: Settings, connectors: Connectors, timestamp: &str) -> TrainPipeline {
    TrainPipeline::new(settings, insurance_schema(), connectors)
        .with_identity(RunIdentity::with_timestamp(timestamp))
}

#[tokio::test]
async fn first_run_splits_trains_and_publishes() {
    let dir = tempfile::tempdir().unwrap();
    let fakes = InMemoryConnectors::new(COLLECTION, insurance_records(100, 11));
    let sink = Arc::new(CollectingEventSink::new());
    let mut pipeline = pipeline(
        test_settings(dir.path(), &[]),
        fakes.connectors.clone(),
        "05_06_2026_07_08_09",
    )
    .with_event_sink(sink.clone());

    let report = pipeline.run().await.unwrap();

    let configs = pipeline.configs();
    let train = Table::read_csv(&configs.ingestion.training_file_path).unwrap();
    let test = Table::read_csv(&configs.ingestion.testing_file_path).unwrap();
    assert_eq!((train.len(), test.len()), (75, 25));

    for path in [
        &configs.ingestion.feature_store_file_path,
        &configs.validation.validation_report_file_path,
        &configs.transformation.transformed_train_file_path,
        &configs.transformation.transformed_test_file_path,
        &configs.transformation.transformed_object_file_path,
        &configs.trainer.trained_model_file_path,
    ] {
        assert!(path.starts_with(dir.path().join("05_06_2026_07_08_09")));
        assert!(path.exists(), "missing {}", path.display());
    }

    let RunOutcome::Pushed { evaluation, pushed } = &report.outcome else {
        panic!("expected a pushed outcome, got {:?}", report.outcome);
    };
    assert!(evaluation.is_model_accepted);
    assert_eq!(evaluation.production_model_score, None);
    assert_eq!(pushed.bucket_name, BUCKET);

    let uploaded = fakes.objects.object(BUCKET, &pushed.s3_model_path).unwrap();
    assert_eq!(uploaded, std::fs::read(&configs.trainer.trained_model_file_path).unwrap());

    let kinds: Vec<StageKind> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(kinds, StageKind::ALL.to_vec());
    assert!(report.stages.iter().all(|s| s.status == StageStatus::Completed));
    assert_eq!(report.final_state, PipelineState::Done);
    assert_eq!(sink.events_of_type(events::STAGE_STARTED).len(), 6);
}

#[test]
fn acceptance_threshold_boundaries() {
    assert!(!is_model_accepted(0.81, Some(0.80), 0.02));
    assert!(is_model_accepted(0.83, Some(0.80), 0.02));
    assert!(is_model_accepted(0.10, None, 0.02));
}

/// A stump trained on all-negative labels, so it never predicts a response.
fn never_responding_model() -> Vec<u8> {
    let table = insurance_table(120, 14);
    let preprocessor = Preprocessor::fit(&insurance_schema(), &table).unwrap();
    let features = preprocessor.transform_features(&table).unwrap();
    let labels = Array1::<usize>::zeros(table.len());
    let params = ForestParams {
        n_estimators: 1,
        max_depth: 1,
        min_samples_split: 2,
        min_samples_leaf: 1,
        criterion: SplitCriterion::Gini,
        random_state: 0,
    };
    let forest = RandomForestClassifier::fit(features.view(), labels.view(), params).unwrap();
    TrainedModel::new(preprocessor, forest).to_bytes().unwrap()
}

#[tokio::test]
async fn better_candidate_overwrites_production_model() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path(), &[]);
    let key = settings.object_store.model_key.clone();

    let objects = Arc::new(InMemoryObjectStorage::new());
    let weak = never_responding_model();
    objects.put_object(BUCKET, &key, weak.clone()).await.unwrap();

    let fakes = InMemoryConnectors::with_objects(COLLECTION, insurance_records(160, 15), objects.clone());
    let mut pipeline = pipeline(settings, fakes.connectors, "04_04_2026_04_04_04");
    let report = pipeline.run().await.unwrap();

    let RunOutcome::Pushed { evaluation, pushed } = &report.outcome else {
        panic!("expected the candidate to replace production, got {:?}", report.outcome);
    };
    assert_eq!(evaluation.production_model_score, Some(0.0));
    assert!(evaluation.trained_model_score > 0.02);
    assert!(evaluation.changed_accuracy > 0.02);
    assert_eq!(pushed.s3_model_path, key);

    assert_eq!(objects.put_count(), 2);
    let stored = objects.object(BUCKET, &key).unwrap();
    assert_ne!(stored, weak);
    assert_eq!(stored, std::fs::read(&pipeline.configs().trainer.trained_model_file_path).unwrap());
    assert_eq!(report.stages.len(), 6);
    assert_eq!(report.final_state, PipelineState::Done);
}

#[tokio::test]
async fn retraining_an_identical_model_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let objects = Arc::new(InMemoryObjectStorage::new());
    let records = insurance_records(160, 12);

    let first = InMemoryConnectors::with_objects(COLLECTION, records.clone(), objects.clone());
    let report = pipeline(test_settings(dir.path(), &[]), first.connectors, "01_01_2026_00_00_00")
        .run()
        .await
        .unwrap();
    assert!(report.outcome.is_pushed());

    let second = InMemoryConnectors::with_objects(COLLECTION, records, objects.clone());
    let sink = Arc::new(CollectingEventSink::new());
    let mut rerun = pipeline(test_settings(dir.path(), &[]), second.connectors, "01_01_2026_00_00_01")
        .with_event_sink(sink.clone());
    let report = rerun.run().await.unwrap();

    let RunOutcome::SkippedNotAccepted { evaluation } = &report.outcome else {
        panic!("expected the identical model to be rejected");
    };
    assert_eq!(evaluation.production_model_score, Some(evaluation.trained_model_score));
    assert_eq!(objects.put_count(), 1);
    assert_eq!(report.stages.len(), 5);
    assert_eq!(report.final_state, PipelineState::Done);
    assert_eq!(sink.events_of_type(events::MODEL_REJECTED).len(), 1);
}

fn assert_nothing_written(root: &Path) {
    let entries: Vec<_> = std::fs::read_dir(root).unwrap().collect();
    assert!(entries.is_empty(), "unexpected artifacts: {entries:?}");
}

#[tokio::test]
async fn missing_database_url_halts_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path(), &[("DATABASE_URL", "")]);
    assert!(settings.database_url().is_err());

    let objects = Arc::new(InMemoryObjectStorage::new());
    let connectors = Connectors::new(
        Arc::new(MongoDocumentStore::new(settings.database.clone())),
        objects.clone(),
    );
    let mut pipeline = pipeline(settings, connectors, "02_02_2026_02_02_02");

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(err.stage_error().map(|e| e.kind()), Some(StageKind::Ingestion));
    assert_eq!(pipeline.state(), PipelineState::Ingest);

    let failure = pipeline.failure().unwrap();
    assert_eq!(failure.category, ErrorCategory::Configuration);
    assert!(failure.root_cause().contains("DATABASE_URL"));
    assert_nothing_written(dir.path());
    assert!(objects.is_closed());
}

#[tokio::test]
async fn unmet_accuracy_halts_in_training() {
    let dir = tempfile::tempdir().unwrap();
    let fakes = InMemoryConnectors::new(COLLECTION, insurance_records(120, 13));
    let settings = test_settings(dir.path(), &[("MODEL_TRAINER_EXPECTED_SCORE", "1.01")]);
    let mut pipeline = pipeline(settings, fakes.connectors.clone(), "03_03_2026_03_03_03");

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(err.stage_error().map(|e| e.kind()), Some(StageKind::Training));
    assert_eq!(pipeline.failure().unwrap().category, ErrorCategory::Quality);
    assert!(!pipeline.configs().trainer.trained_model_file_path.exists());
    assert_eq!(fakes.objects.put_count(), 0);
}
