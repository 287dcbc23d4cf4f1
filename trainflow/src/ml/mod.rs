//! Feature preprocessing, the random-forest classifier and its metrics.

pub mod forest;
pub mod metrics;
pub mod model;
pub mod preprocess;

pub use forest::{DecisionTree, ForestParams, RandomForestClassifier, SplitCriterion};
pub use metrics::{f1_score, ClassificationMetrics};
pub use model::TrainedModel;
pub use preprocess::{ColumnEncoder, EncodedPartition, LabelEncoder, Preprocessor};
