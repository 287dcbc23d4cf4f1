//! Stage configurations and stage artifacts.

pub mod artifact;
pub mod config;

pub use artifact::{
    DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact,
    ModelEvaluationArtifact, ModelPusherArtifact, ModelTrainerArtifact,
};
pub use config::{
    DataIngestionConfig, DataTransformationConfig, DataValidationConfig, ModelEvaluationConfig,
    ModelPusherConfig, ModelTrainerConfig, StageConfigs, TrainingPipelineConfig,
};
