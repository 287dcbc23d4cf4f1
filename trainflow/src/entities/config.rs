//! Per-run stage configuration derived from [`Settings`] and the run timestamp.
//!
//! Nothing here touches the file system; paths are computed, not created.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::core::RunIdentity;
use crate::ml::ForestParams;

/// Directory of the ingestion stage inside a run.
pub const DATA_INGESTION_DIR_NAME: &str = "data_ingestion";
/// Subdirectory holding the full exported table.
pub const FEATURE_STORE_DIR: &str = "feature_store";
/// Subdirectory holding the train/test partitions.
pub const INGESTED_DIR: &str = "ingested";
/// Full table file name.
pub const FILE_NAME: &str = "data.csv";
/// Train partition file name.
pub const TRAIN_FILE_NAME: &str = "train.csv";
/// Test partition file name.
pub const TEST_FILE_NAME: &str = "test.csv";

/// Directory of the validation stage inside a run.
pub const DATA_VALIDATION_DIR_NAME: &str = "data_validation";
/// Validation report file name.
pub const VALIDATION_REPORT_FILE_NAME: &str = "report.json";

/// Directory of the transformation stage inside a run.
pub const DATA_TRANSFORMATION_DIR_NAME: &str = "data_transformation";
/// Subdirectory holding encoded partitions.
pub const TRANSFORMED_DATA_DIR: &str = "transformed";
/// Subdirectory holding the fitted preprocessor.
pub const TRANSFORMED_OBJECT_DIR: &str = "transformed_object";
/// Encoded train partition file name.
pub const TRANSFORMED_TRAIN_FILE_NAME: &str = "train.json";
/// Encoded test partition file name.
pub const TRANSFORMED_TEST_FILE_NAME: &str = "test.json";
/// Fitted preprocessor file name.
pub const PREPROCESSING_OBJECT_FILE_NAME: &str = "preprocessing.json";

/// Directory of the trainer stage inside a run.
pub const MODEL_TRAINER_DIR_NAME: &str = "model_trainer";
/// Subdirectory holding the trained model.
pub const TRAINED_MODEL_DIR: &str = "trained_model";
/// Trained model file name.
pub const MODEL_FILE_NAME: &str = "model.json";

/// Run-level paths and names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingPipelineConfig {
    /// Pipeline name.
    pub pipeline_name: String,
    /// `<artifact root>/<timestamp>`.
    pub artifact_dir: PathBuf,
    /// Run timestamp.
    pub timestamp: String,
}

impl TrainingPipelineConfig {
    /// Namespaces the settings' artifact root with the run timestamp.
    #[must_use]
    pub fn new(settings: &Settings, identity: &RunIdentity) -> Self {
        Self {
            pipeline_name: settings.pipeline.name.clone(),
            artifact_dir: settings.pipeline.artifact_dir.join(&identity.timestamp),
            timestamp: identity.timestamp.clone(),
        }
    }
}

/// Ingestion stage configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataIngestionConfig {
    /// Stage directory.
    pub data_ingestion_dir: PathBuf,
    /// Full table CSV.
    pub feature_store_file_path: PathBuf,
    /// Train partition CSV.
    pub training_file_path: PathBuf,
    /// Test partition CSV.
    pub testing_file_path: PathBuf,
    /// Fraction of rows in the test partition.
    pub train_test_split_ratio: f64,
    /// Shuffle seed.
    pub split_seed: u64,
    /// Collection to fetch.
    pub collection_name: String,
}

impl DataIngestionConfig {
    /// Derives the stage config.
    #[must_use]
    pub fn new(settings: &Settings, run: &TrainingPipelineConfig) -> Self {
        let dir = run.artifact_dir.join(DATA_INGESTION_DIR_NAME);
        Self {
            feature_store_file_path: dir.join(FEATURE_STORE_DIR).join(FILE_NAME),
            training_file_path: dir.join(INGESTED_DIR).join(TRAIN_FILE_NAME),
            testing_file_path: dir.join(INGESTED_DIR).join(TEST_FILE_NAME),
            data_ingestion_dir: dir,
            train_test_split_ratio: settings.ingestion.split_ratio,
            split_seed: settings.ingestion.split_seed,
            collection_name: settings.database.collection.clone(),
        }
    }
}

/// Validation stage configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataValidationConfig {
    /// Stage directory.
    pub data_validation_dir: PathBuf,
    /// JSON report.
    pub validation_report_file_path: PathBuf,
}

impl DataValidationConfig {
    /// Derives the stage config.
    #[must_use]
    pub fn new(run: &TrainingPipelineConfig) -> Self {
        let dir = run.artifact_dir.join(DATA_VALIDATION_DIR_NAME);
        Self {
            validation_report_file_path: dir.join(VALIDATION_REPORT_FILE_NAME),
            data_validation_dir: dir,
        }
    }
}

/// Transformation stage configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataTransformationConfig {
    /// Stage directory.
    pub data_transformation_dir: PathBuf,
    /// Encoded train partition.
    pub transformed_train_file_path: PathBuf,
    /// Encoded test partition.
    pub transformed_test_file_path: PathBuf,
    /// Fitted preprocessor.
    pub transformed_object_file_path: PathBuf,
}

impl DataTransformationConfig {
    /// Derives the stage config.
    #[must_use]
    pub fn new(run: &TrainingPipelineConfig) -> Self {
        let dir = run.artifact_dir.join(DATA_TRANSFORMATION_DIR_NAME);
        Self {
            transformed_train_file_path: dir
                .join(TRANSFORMED_DATA_DIR)
                .join(TRANSFORMED_TRAIN_FILE_NAME),
            transformed_test_file_path: dir
                .join(TRANSFORMED_DATA_DIR)
                .join(TRANSFORMED_TEST_FILE_NAME),
            transformed_object_file_path: dir
                .join(TRANSFORMED_OBJECT_DIR)
                .join(PREPROCESSING_OBJECT_FILE_NAME),
            data_transformation_dir: dir,
        }
    }
}

/// Trainer stage configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelTrainerConfig {
    /// Stage directory.
    pub model_trainer_dir: PathBuf,
    /// Serialized [`crate::ml::TrainedModel`].
    pub trained_model_file_path: PathBuf,
    /// Minimum test accuracy.
    pub expected_accuracy: f64,
    /// Classifier hyperparameters.
    pub params: ForestParams,
}

impl ModelTrainerConfig {
    /// Derives the stage config.
    #[must_use]
    pub fn new(settings: &Settings, run: &TrainingPipelineConfig) -> Self {
        let dir = run.artifact_dir.join(MODEL_TRAINER_DIR_NAME);
        let t = &settings.trainer;
        Self {
            trained_model_file_path: dir.join(TRAINED_MODEL_DIR).join(MODEL_FILE_NAME),
            model_trainer_dir: dir,
            expected_accuracy: t.expected_accuracy,
            params: ForestParams {
                n_estimators: t.n_estimators,
                max_depth: t.max_depth,
                min_samples_split: t.min_samples_split,
                min_samples_leaf: t.min_samples_leaf,
                criterion: t.criterion,
                random_state: t.random_state,
            },
        }
    }
}

/// Evaluation stage configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelEvaluationConfig {
    /// Minimum F1 improvement over production.
    pub changed_threshold_score: f64,
    /// Model registry bucket.
    pub bucket_name: String,
    /// Key of the production model.
    pub s3_model_key_path: String,
}

impl ModelEvaluationConfig {
    /// Derives the stage config.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            changed_threshold_score: settings.evaluation.changed_threshold,
            bucket_name: settings.object_store.model_bucket.clone(),
            s3_model_key_path: settings.object_store.model_key.clone(),
        }
    }
}

/// Pusher stage configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelPusherConfig {
    /// Model registry bucket.
    pub bucket_name: String,
    /// Key the accepted model is written to.
    pub s3_model_key_path: String,
}

impl ModelPusherConfig {
    /// Derives the stage config.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            bucket_name: settings.object_store.model_bucket.clone(),
            s3_model_key_path: settings.object_store.model_key.clone(),
        }
    }
}

/// Every stage config of one run, built together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageConfigs {
    /// Run-level paths.
    pub pipeline: TrainingPipelineConfig,
    /// Ingestion.
    pub ingestion: DataIngestionConfig,
    /// Validation.
    pub validation: DataValidationConfig,
    /// Transformation.
    pub transformation: DataTransformationConfig,
    /// Trainer.
    pub trainer: ModelTrainerConfig,
    /// Evaluation.
    pub evaluation: ModelEvaluationConfig,
    /// Pusher.
    pub pusher: ModelPusherConfig,
}

impl StageConfigs {
    /// Derives all configs for one run.
    #[must_use]
    pub fn new(settings: &Settings, identity: &RunIdentity) -> Self {
        let pipeline = TrainingPipelineConfig::new(settings, identity);
        Self {
            ingestion: DataIngestionConfig::new(settings, &pipeline),
            validation: DataValidationConfig::new(&pipeline),
            transformation: DataTransformationConfig::new(&pipeline),
            trainer: ModelTrainerConfig::new(settings, &pipeline),
            evaluation: ModelEvaluationConfig::new(settings),
            pusher: ModelPusherConfig::new(settings),
            pipeline,
        }
    }

    /// The run directory.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.pipeline.artifact_dir
    }
}
