//! Process settings and the dataset schema.

pub mod schema;
pub mod settings;

pub use schema::{ColumnSpec, ColumnType, DatasetSchema};
pub use settings::{
    AwsCredentials, DatabaseSettings, EvaluationSettings, IngestionSettings, LogSettings,
    ObjectStoreSettings, PipelineSettings, Secret, Settings, TrainerSettings, ValidationPolicy,
};
